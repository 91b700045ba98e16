//! Rewrite rules and the element views they receive.

use std::fmt;
use std::str::FromStr;

use crate::error::RenderError;
use crate::tree::{Document, ElementData, Node, NodeId, NodeType};

/// Pass in which a rule runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// First pass, over the original document.
    #[default]
    Pre,
    /// Second pass, over the output of the pre phase.
    Post,
}

impl Phase {
    /// Both phases in execution order.
    pub const ALL: [Phase; 2] = [Phase::Pre, Phase::Post];

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a phase name.
#[derive(Debug, thiserror::Error)]
#[error("unknown phase `{0}` (expected `pre` or `post`)")]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            other => Err(UnknownPhase(other.to_owned())),
        }
    }
}

/// What to put in place of a matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Drop the element and its content.
    Remove,
    /// Substitute this text for the element's whole source span.
    Text(String),
}

impl From<String> for Replacement {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Replacement {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl<T: Into<String>> From<Option<T>> for Replacement {
    fn from(text: Option<T>) -> Self {
        text.map_or(Self::Remove, |text| Self::Text(text.into()))
    }
}

/// Borrowed, read-only view of an element used for matching.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    node: &'a Node,
    data: &'a ElementData,
}

impl<'a> ElementRef<'a> {
    /// View of `id`, or `None` if it is not an element.
    #[must_use]
    pub fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        let node = doc.node(id);
        node.element().map(|data| Self { node, data })
    }

    /// Qualified tag name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data.name
    }

    /// Tag name without namespace prefix.
    #[must_use]
    pub fn local_name(&self) -> &'a str {
        self.data.local_name()
    }

    /// Namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> Option<&'a str> {
        self.data.prefix()
    }

    /// Resolved namespace URI.
    #[must_use]
    pub fn namespace(&self) -> Option<&'a str> {
        self.data.namespace.as_deref()
    }

    /// Decoded attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.data.attr(name)
    }

    /// Whether the attribute is present.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Attributes as `(name, value)` pairs in source order.
    pub fn attributes(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.data
            .attrs
            .iter()
            .map(|attr| (attr.name.as_str(), attr.value.as_str()))
    }

    /// Always [`NodeType::Element`].
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node.node_type()
    }

    /// Byte offset of the opening `<`.
    #[must_use]
    pub fn start(&self) -> usize {
        self.node.start
    }

    /// Byte offset of the final `>` (inclusive).
    #[must_use]
    pub fn end(&self) -> usize {
        self.node.end
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("name", &self.data.name)
            .field("start", &self.node.start)
            .field("end", &self.node.end)
            .finish_non_exhaustive()
    }
}

/// Owned copy of a matched element handed to [`Rewrite::render`].
///
/// Offsets refer to the string passed to the current pass. `end` already
/// accounts for the length change of the rewritten inner content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSnapshot {
    /// Qualified tag name.
    pub name: String,
    /// Tag name without prefix.
    pub local_name: String,
    /// Namespace prefix.
    pub prefix: Option<String>,
    /// Resolved namespace URI.
    pub namespace: Option<String>,
    /// Attributes as `(name, value)` in source order.
    pub attributes: Vec<(String, String)>,
    /// DOM node type.
    pub node_type: NodeType,
    /// Byte offset of the opening `<`.
    pub start: usize,
    /// Inclusive end offset, shifted by the inner content length delta.
    pub end: usize,
    /// Inner content after nested rules were applied.
    pub inner_html: String,
}

impl ElementSnapshot {
    pub(crate) fn capture(element: &ElementRef<'_>, end: usize, inner_html: String) -> Self {
        Self {
            name: element.name().to_owned(),
            local_name: element.local_name().to_owned(),
            prefix: element.prefix().map(str::to_owned),
            namespace: element.namespace().map(str::to_owned),
            attributes: element
                .attributes()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
            node_type: element.node_type(),
            start: element.start(),
            end,
            inner_html,
        }
    }

    /// Decoded attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A declarative rewrite: which elements to match and what to put in their place.
///
/// Implementations must be free of shared mutable state (or synchronize it),
/// since one engine can transform several documents concurrently.
pub trait Rewrite: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Phase the rule runs in.
    fn phase(&self) -> Phase {
        Phase::Pre
    }

    /// Whether the element should be rewritten by this rule.
    fn matches(&self, element: &ElementRef<'_>) -> bool;

    /// Produce the replacement for a matched element.
    ///
    /// `index` counts this rule's matches within the current pass, from 0.
    fn render(&self, element: &ElementSnapshot, index: usize) -> Result<Replacement, RenderError>;
}

type MatchFn = Box<dyn Fn(&ElementRef<'_>) -> bool + Send + Sync>;
type RenderFn = Box<dyn Fn(&ElementSnapshot, usize) -> Result<Replacement, RenderError> + Send + Sync>;

/// Closure-backed [`Rewrite`].
///
/// # Example
///
/// ```
/// use rewrite_engine::{Engine, Phase, Rule};
///
/// let engine = Engine::new(vec![
///     Rule::new(|e| e.name() == "item", |_, index| format!("#{index}")).boxed(),
///     Rule::new(|e| e.name() == "drop", |_, _| None::<String>)
///         .with_phase(Phase::Post)
///         .boxed(),
/// ]);
///
/// let html = engine.transform("<item/><drop/><item/>").unwrap();
/// assert_eq!(html, "#0#1");
/// ```
pub struct Rule {
    name: String,
    phase: Phase,
    matcher: MatchFn,
    renderer: RenderFn,
}

impl Rule {
    /// Create a rule with an infallible render function.
    pub fn new<M, R, T>(matcher: M, renderer: R) -> Self
    where
        M: Fn(&ElementRef<'_>) -> bool + Send + Sync + 'static,
        R: Fn(&ElementSnapshot, usize) -> T + Send + Sync + 'static,
        T: Into<Replacement>,
    {
        Self::try_new(matcher, move |element, index| Ok(renderer(element, index)))
    }

    /// Create a rule whose render function can fail.
    pub fn try_new<M, R, T>(matcher: M, renderer: R) -> Self
    where
        M: Fn(&ElementRef<'_>) -> bool + Send + Sync + 'static,
        R: Fn(&ElementSnapshot, usize) -> Result<T, RenderError> + Send + Sync + 'static,
        T: Into<Replacement>,
    {
        Self {
            name: "rule".to_owned(),
            phase: Phase::Pre,
            matcher: Box::new(matcher),
            renderer: Box::new(move |element: &ElementSnapshot, index: usize| {
                renderer(element, index).map(Into::<Replacement>::into)
            }),
        }
    }

    /// Set the rule name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the phase.
    #[must_use]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Box the rule for [`Engine::new`](crate::Engine::new).
    #[must_use]
    pub fn boxed(self) -> Box<dyn Rewrite> {
        Box::new(self)
    }
}

impl Rewrite for Rule {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn matches(&self, element: &ElementRef<'_>) -> bool {
        (self.matcher)(element)
    }

    fn render(&self, element: &ElementSnapshot, index: usize) -> Result<Replacement, RenderError> {
        (self.renderer)(element, index)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
