//! Serialize a [`Document`] or fragment back to markup.

#![allow(clippy::unused_self)] // Unit struct methods have &self for API consistency

use crate::tree::{Attribute, Document, NodeId, NodeKind};

/// Serialize trees back to markup text.
///
/// Elements are rebuilt from their name and attributes (always quoted);
/// every other node is written from its stored source text. Elements that
/// were self-closing in the source stay self-closing while they have no
/// live children. Removed nodes are skipped.
pub struct MarkupSerializer;

impl MarkupSerializer {
    /// Create a new serializer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Serialize the whole document.
    pub fn serialize(&self, doc: &Document) -> String {
        self.serialize_children(doc, Document::ROOT)
    }

    /// Serialize the live children of a node as a fragment.
    pub fn serialize_children(&self, doc: &Document, id: NodeId) -> String {
        let mut out = String::new();
        for child in doc.children(id) {
            write_node(doc, child, &mut out);
        }
        out
    }

    /// Serialize a single node including its own tags.
    pub fn serialize_node(&self, doc: &Document, id: NodeId) -> String {
        let mut out = String::new();
        if doc.is_live(id) {
            write_node(doc, id, &mut out);
        }
        out
    }
}

impl Default for MarkupSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a single node recursively.
fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match &doc.node(id).kind {
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(doc, child, out);
            }
        }
        NodeKind::Element(data) => {
            out.push('<');
            out.push_str(&data.name);
            for attr in &data.attrs {
                write_attr(attr, out);
            }

            if data.self_closing && !doc.has_children(id) {
                out.push_str("/>");
                return;
            }

            out.push('>');
            for child in doc.children(id) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&data.name);
            out.push('>');
        }
        NodeKind::Text(text)
        | NodeKind::Comment(text)
        | NodeKind::CData(text)
        | NodeKind::ProcessingInstruction(text)
        | NodeKind::Declaration(text)
        | NodeKind::Doctype(text)
        | NodeKind::Raw(text) => out.push_str(text),
    }
}

/// Write ` name="value"`, keeping the value's source escaping.
fn write_attr(attr: &Attribute, out: &mut String) {
    out.push(' ');
    out.push_str(&attr.name);
    out.push('=');
    if attr.raw.contains('"') {
        out.push('\'');
        out.push_str(&attr.raw);
        out.push('\'');
    } else {
        out.push('"');
        out.push_str(&attr.raw);
        out.push('"');
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::MarkupParser;
    use crate::rule::Replacement;

    fn round_trip(input: &str) -> String {
        let doc = MarkupParser::new().parse(input).unwrap();
        MarkupSerializer::new().serialize(&doc)
    }

    #[test]
    fn test_serialize_well_formed_round_trip() {
        let input = "<!DOCTYPE html>\n<html lang=\"en\"><body><p class=\"x\">a &amp; b</p><br/></body></html>\n";
        assert_eq!(round_trip(input), input);
    }

    #[test]
    fn test_serialize_normalizes_attribute_quotes() {
        assert_eq!(round_trip("<a href='x' disabled=\"\"/>"), r#"<a href="x" disabled=""/>"#);
        assert_eq!(round_trip(r#"<a title='say "hi"'/>"#), r#"<a title='say "hi"'/>"#);
    }

    #[test]
    fn test_serialize_keeps_explicit_empty_elements() {
        assert_eq!(round_trip("<script></script>"), "<script></script>");
    }

    #[test]
    fn test_serialize_children_fragment() {
        let doc = MarkupParser::new().parse("<a><b>x</b> y<!--c--></a>").unwrap();
        let a = doc.elements()[0];
        assert_eq!(
            MarkupSerializer::new().serialize_children(&doc, a),
            "<b>x</b> y<!--c-->"
        );
    }

    #[test]
    fn test_serialize_skips_removed_and_writes_raw() {
        let mut doc = MarkupParser::new()
            .parse("<a>1</a><drop>x</drop><item/>")
            .unwrap();
        let ids = doc.elements();
        doc.replace(ids[1], &Replacement::Remove);
        doc.replace(ids[2], &Replacement::Text("<li>&nbsp;</li>".to_owned()));

        assert_eq!(
            MarkupSerializer::new().serialize(&doc),
            "<a>1</a><li>&nbsp;</li>"
        );
    }

    #[test]
    fn test_serialize_self_closing_with_removed_children_stays_open() {
        let mut doc = MarkupParser::new().parse("<a><b/></a>").unwrap();
        let ids = doc.elements();
        doc.excise(ids[1]);
        assert_eq!(MarkupSerializer::new().serialize(&doc), "<a></a>");
        assert_eq!(MarkupSerializer::new().serialize_node(&doc, ids[1]), "");
    }
}
