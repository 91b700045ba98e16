//! Markup parser producing an arena [`Document`] with source spans.
//!
//! Reads the input in XML mode: tag and attribute names keep their case,
//! `<name/>` is recognised as a complete element, and whitespace is never
//! trimmed. Every node records the byte range of its literal source, so the
//! offsets can be used to splice the original string.

#![allow(clippy::unused_self)] // Unit struct methods have &self for API consistency

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ParseError;
use crate::tree::{Attribute, Document, ElementData, NodeId, NodeKind};

/// Namespace bound to the reserved `xml` prefix.
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Element whose closing tag has not been read yet.
struct OpenElement {
    id: NodeId,
    name: String,
    start: usize,
    /// Namespace scope depth to restore when the element closes.
    scope: usize,
}

/// Namespace binding introduced by an `xmlns` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Binding {
    prefix: String,
    uri: String,
}

impl Binding {
    /// Binding declared by `attr`, if it is an `xmlns` or `xmlns:p` attribute.
    fn from_attr(attr: &Attribute) -> Option<Self> {
        let prefix = if attr.name == "xmlns" {
            ""
        } else {
            attr.name.strip_prefix("xmlns:")?
        };
        Some(Self {
            prefix: prefix.to_owned(),
            uri: attr.value.clone(),
        })
    }
}

/// Parse markup into a [`Document`].
pub struct MarkupParser;

impl MarkupParser {
    /// Create a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse a document or fragment.
    ///
    /// Multiple top-level nodes are accepted, so serialized inner content
    /// parses the same way as a full document.
    ///
    /// # Errors
    ///
    /// Returns an error for ill-formed markup, mismatched or stray closing
    /// tags, and elements left open at the end of input.
    pub fn parse(&self, input: &str) -> Result<Document, ParseError> {
        self.parse_in_scope(input, &[])
    }

    /// Parse a fragment whose enclosing elements declared `scope`.
    ///
    /// Prefixes inside the fragment resolve against `scope` the same way
    /// they would inside the full document.
    pub(crate) fn parse_in_scope(
        &self,
        input: &str,
        scope: &[Binding],
    ) -> Result<Document, ParseError> {
        let mut reader = Reader::from_str(input);
        let config = reader.config_mut();
        config.trim_text(false);
        // Inline scripts commonly contain `&&`; keep a bare `&` as text.
        config.allow_dangling_amp = true;

        let mut doc = Document::new(input.len());
        let mut open: Vec<OpenElement> = Vec::new();
        let mut bindings: Vec<Binding> = scope.to_vec();

        loop {
            let start = offset(reader.buffer_position());
            let event = reader.read_event().map_err(|source| ParseError::Xml {
                position: offset(reader.error_position()),
                source,
            })?;
            let end = offset(reader.buffer_position());
            if end <= start && !matches!(event, Event::Eof) {
                continue;
            }
            let last = end.saturating_sub(1);
            let raw = input.get(start..end).unwrap_or_default();
            let parent = open.last().map_or(Document::ROOT, |element| element.id);

            match event {
                Event::Start(e) => {
                    let scope = bindings.len();
                    let data = self.element_data(&e, &mut bindings)?;
                    let name = data.name.clone();
                    let id = doc.append(parent, NodeKind::Element(data), start, last);
                    open.push(OpenElement {
                        id,
                        name,
                        start,
                        scope,
                    });
                }
                Event::Empty(e) => {
                    let scope = bindings.len();
                    let mut data = self.element_data(&e, &mut bindings)?;
                    data.self_closing = true;
                    doc.append(parent, NodeKind::Element(data), start, last);
                    bindings.truncate(scope);
                }
                Event::End(e) => {
                    let qname = e.name();
                    let name = std::str::from_utf8(qname.as_ref())?;
                    let Some(element) = open.pop() else {
                        return Err(ParseError::UnexpectedEnd {
                            tag: name.to_owned(),
                            position: start,
                        });
                    };
                    if element.name != name {
                        return Err(ParseError::UnexpectedEnd {
                            tag: name.to_owned(),
                            position: start,
                        });
                    }
                    doc.close(element.id, last);
                    bindings.truncate(element.scope);
                }
                Event::Text(_) | Event::GeneralRef(_) => {
                    doc.append_text(parent, raw, start, last);
                }
                Event::CData(_) => {
                    doc.append(parent, NodeKind::CData(raw.to_owned()), start, last);
                }
                Event::Comment(_) => {
                    doc.append(parent, NodeKind::Comment(raw.to_owned()), start, last);
                }
                Event::Decl(_) => {
                    doc.append(parent, NodeKind::Declaration(raw.to_owned()), start, last);
                }
                Event::PI(_) => {
                    doc.append(
                        parent,
                        NodeKind::ProcessingInstruction(raw.to_owned()),
                        start,
                        last,
                    );
                }
                Event::DocType(_) => {
                    doc.append(parent, NodeKind::Doctype(raw.to_owned()), start, last);
                }
                Event::Eof => break,
            }
        }

        if let Some(element) = open.pop() {
            return Err(ParseError::Unclosed {
                tag: element.name,
                position: element.start,
            });
        }

        Ok(doc)
    }

    /// Decode name and attributes of an opening tag, pushing any namespace
    /// declarations it makes onto `bindings`.
    fn element_data(
        &self,
        e: &BytesStart,
        bindings: &mut Vec<Binding>,
    ) -> Result<ElementData, ParseError> {
        let name = std::str::from_utf8(e.name().as_ref())?.to_owned();

        let mut attrs = Vec::new();
        for attr in e.html_attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_owned();
            let raw = std::str::from_utf8(&attr.value)?.to_owned();
            let value = unescape(&raw).map_or_else(|_| raw.clone(), std::borrow::Cow::into_owned);

            let attr = Attribute {
                name: key,
                value,
                raw,
            };
            bindings.extend(Binding::from_attr(&attr));
            attrs.push(attr);
        }

        let prefix = name.split_once(':').map_or("", |(prefix, _)| prefix);
        let namespace = resolve_namespace(bindings, prefix);

        Ok(ElementData {
            name,
            namespace,
            attrs,
            self_closing: false,
        })
    }
}

impl Default for MarkupParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespace bindings in scope for the children of `id`, outermost first.
pub(crate) fn bindings_in_scope(doc: &Document, id: NodeId) -> Vec<Binding> {
    let mut chain = Vec::new();
    let mut current = Some(id);
    while let Some(node) = current {
        chain.extend(doc.node(node).element());
        current = doc.node(node).parent();
    }
    chain
        .iter()
        .rev()
        .flat_map(|data| data.attrs.iter().filter_map(Binding::from_attr))
        .collect()
}

/// Look up the innermost binding for `prefix` (`""` is the default namespace).
fn resolve_namespace(bindings: &[Binding], prefix: &str) -> Option<String> {
    if prefix == "xml" {
        return Some(XML_NAMESPACE.to_owned());
    }
    bindings
        .iter()
        .rev()
        .find(|binding| binding.prefix == prefix)
        .filter(|binding| !binding.uri.is_empty())
        .map(|binding| binding.uri.clone())
}

/// Convert a reader position to a byte offset.
fn offset<T: TryInto<usize>>(position: T) -> usize {
    position.try_into().unwrap_or(usize::MAX)
}
