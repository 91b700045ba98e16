//! Arena tree for parsed markup.
//!
//! Nodes live in a flat `Vec` and are addressed by [`NodeId`]. Removing a node
//! only flips a tombstone flag, so ids and source spans captured before a
//! removal stay valid for the rest of the pass.

use crate::rule::Replacement;

/// Index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// DOM-style node type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NodeType {
    /// Element node.
    Element = 1,
    /// Text node.
    Text = 3,
    /// CDATA section.
    CData = 4,
    /// Processing instruction or XML declaration.
    ProcessingInstruction = 7,
    /// Comment.
    Comment = 8,
    /// Document root.
    Document = 9,
    /// Doctype declaration.
    Doctype = 10,
}

impl NodeType {
    /// Numeric DOM code.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified attribute name.
    pub name: String,
    /// Value with entity references decoded.
    pub value: String,
    /// Value exactly as written in the source, used for serialization.
    pub(crate) raw: String,
}

impl Attribute {
    /// Create an attribute whose source form is the given value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            raw: value.clone(),
            value,
        }
    }
}

/// Element payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    /// Qualified name as written (`svg:rect`, `div`).
    pub name: String,
    /// Resolved namespace URI, if the prefix is bound.
    pub namespace: Option<String>,
    /// Attributes in source order.
    pub attrs: Vec<Attribute>,
    /// Whether the source used `<name/>`.
    pub self_closing: bool,
}

impl ElementData {
    /// Namespace prefix of the qualified name.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Name without prefix.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Decoded value of the named attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

/// Node payload. Everything except elements keeps its literal source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root.
    Document,
    /// Element with children.
    Element(ElementData),
    /// Character data, entity references left as written.
    Text(String),
    /// `<!-- ... -->`
    Comment(String),
    /// `<![CDATA[ ... ]]>`
    CData(String),
    /// `<?target ... ?>`
    ProcessingInstruction(String),
    /// `<?xml ... ?>`
    Declaration(String),
    /// `<!DOCTYPE ...>`
    Doctype(String),
    /// Replacement text inserted by the engine, written unescaped.
    Raw(String),
}

/// Node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node payload.
    pub kind: NodeKind,
    /// Byte offset of the first source byte.
    pub start: usize,
    /// Byte offset of the last source byte (inclusive).
    pub end: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    detached: bool,
}

impl Node {
    /// DOM node type of this node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) | NodeKind::Raw(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::CData(_) => NodeType::CData,
            NodeKind::ProcessingInstruction(_) | NodeKind::Declaration(_) => {
                NodeType::ProcessingInstruction
            }
            NodeKind::Doctype(_) => NodeType::Doctype,
        }
    }

    /// Element payload, if this is an element.
    #[must_use]
    pub fn element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Parent node, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Parsed markup document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Id of the document root.
    pub const ROOT: NodeId = NodeId(0);

    /// Create an empty document for a source of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                start: 0,
                end: len.saturating_sub(1),
                parent: None,
                children: Vec::new(),
                detached: false,
            }],
        }
    }

    /// Append a node under `parent`.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind, start: usize, end: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            start,
            end,
            parent: Some(parent),
            children: Vec::new(),
            detached: false,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append source text under `parent`, merging with a directly preceding text node.
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str, start: usize, end: usize) {
        if let Some(&last) = self.nodes[parent.0].children.last() {
            let node = &mut self.nodes[last.0];
            if let NodeKind::Text(existing) = &mut node.kind
                && node.end + 1 == start
            {
                existing.push_str(text);
                node.end = end;
                return;
            }
        }
        self.append(parent, NodeKind::Text(text.to_owned()), start, end);
    }

    /// Set the inclusive end offset of an element once its closing tag is read.
    pub(crate) fn close(&mut self, id: NodeId, end: usize) {
        self.nodes[id.0].end = end;
    }

    /// Node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Live children of a node in document order.
    pub fn children(&self, id: NodeId) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|child| !self.nodes[child.0].detached)
    }

    /// Whether the node has any live children.
    #[must_use]
    pub fn has_children(&self, id: NodeId) -> bool {
        self.children(id).next().is_some()
    }

    /// Whether the node is still part of the tree.
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        !self.nodes[id.0].detached
    }

    /// Remove a node (and with it, its subtree) from the live tree.
    pub fn excise(&mut self, id: NodeId) {
        self.nodes[id.0].detached = true;
    }

    /// Apply a rewrite decision to a node in place.
    ///
    /// Text replaces the node with a raw node carrying the text verbatim;
    /// removal tombstones it. A previously excised node is revived when it
    /// receives replacement text.
    pub fn replace(&mut self, id: NodeId, replacement: &Replacement) {
        let node = &mut self.nodes[id.0];
        match replacement {
            Replacement::Remove => node.detached = true,
            Replacement::Text(text) => {
                node.kind = NodeKind::Raw(text.clone());
                node.children.clear();
                node.detached = false;
            }
        }
    }

    /// Live element ids in pre-order.
    #[must_use]
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(Self::ROOT).rev().collect();
        while let Some(id) = stack.pop() {
            if matches!(self.nodes[id.0].kind, NodeKind::Element(_)) {
                out.push(id);
            }
            stack.extend(self.children(id).rev());
        }
        out
    }
}
