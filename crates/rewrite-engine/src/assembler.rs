//! Output reconstruction from per-element rewrite decisions.
//!
//! Two strategies share the same matching pipeline and differ only in how the
//! unmatched parts of the document come out:
//! - [`SpliceAssembler`] edits the original string, so everything outside the
//!   matched spans is preserved byte for byte.
//! - [`ReserializeAssembler`] applies the decisions to the tree and serializes
//!   it, so the whole document comes out in the serializer's normal form.

use std::fmt;
use std::str::FromStr;

use crate::rule::Replacement;
use crate::serializer::MarkupSerializer;
use crate::splice::splice;
use crate::tree::{Document, NodeId};

/// Rewrite decision for one matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    /// Matched element in the pass's tree.
    pub node: NodeId,
    /// Position of the matching rule in the phase's rule list.
    pub rule: usize,
    /// Byte offset of the element's first byte in the pass input.
    pub start: usize,
    /// Byte offset of the element's last byte (inclusive) in the pass input.
    pub end: usize,
    /// What replaces the element.
    pub replacement: Replacement,
}

impl MatchRecord {
    fn text(&self) -> &str {
        match &self.replacement {
            Replacement::Remove => "",
            Replacement::Text(text) => text,
        }
    }
}

/// Builds the output of a pass.
pub trait Assembler: Send + Sync {
    /// Produce the output document.
    ///
    /// `records` are pairwise disjoint and sorted by `start`; their spans
    /// refer to `input`, which is the text `doc` was parsed from.
    fn assemble(&self, input: &str, doc: &mut Document, records: &[MatchRecord]) -> String;
}

/// Replace each matched span in the original text, right to left.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpliceAssembler;

impl Assembler for SpliceAssembler {
    fn assemble(&self, input: &str, _doc: &mut Document, records: &[MatchRecord]) -> String {
        let mut output = input.to_owned();
        // Splicing a range never moves anything to its left, so going from the
        // highest start down keeps every remaining span valid.
        for record in records.iter().rev() {
            splice(&mut output, record.start..record.end + 1, record.text());
        }
        output
    }
}

/// Apply decisions to the tree and serialize the whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReserializeAssembler;

impl Assembler for ReserializeAssembler {
    fn assemble(&self, _input: &str, doc: &mut Document, records: &[MatchRecord]) -> String {
        for record in records {
            doc.replace(record.node, &record.replacement);
        }
        MarkupSerializer::new().serialize(doc)
    }
}

/// Reconstruction strategy chosen when the engine is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Splice replacements into the original text.
    #[default]
    Splice,
    /// Mutate the tree and serialize it.
    Reserialize,
}

impl Strategy {
    /// Assembler implementing this strategy.
    #[must_use]
    pub fn assembler(self) -> &'static dyn Assembler {
        match self {
            Self::Splice => &SpliceAssembler,
            Self::Reserialize => &ReserializeAssembler,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Splice => "splice",
            Self::Reserialize => "reserialize",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "splice" => Ok(Self::Splice),
            "reserialize" => Ok(Self::Reserialize),
            other => Err(format!(
                "unknown strategy `{other}` (expected `splice` or `reserialize`)"
            )),
        }
    }
}
