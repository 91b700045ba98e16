//! Error types for the rewrite engine.

use std::str::Utf8Error;

/// Error produced by a rule's render function.
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// Error while building a tree from markup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// XML syntax error reported by the reader.
    #[error("markup parse error at byte {position}")]
    Xml {
        /// Byte offset where reading failed.
        position: usize,
        /// Reader error.
        #[source]
        source: quick_xml::Error,
    },

    /// Malformed attribute list.
    #[error("attribute error")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Tag or attribute name is not valid UTF-8.
    #[error("UTF-8 error")]
    Utf8(#[from] Utf8Error),

    /// Closing tag without a matching open element.
    #[error("unexpected closing tag </{tag}> at byte {position}")]
    UnexpectedEnd {
        /// Name in the closing tag.
        tag: String,
        /// Byte offset of the closing tag.
        position: usize,
    },

    /// Element still open at end of input.
    #[error("unclosed element <{tag}> opened at byte {position}")]
    Unclosed {
        /// Name of the unclosed element.
        tag: String,
        /// Byte offset of the opening tag.
        position: usize,
    },
}

/// Error during a transform.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RewriteError {
    /// Input (or a serialized inner fragment) could not be parsed.
    #[error("failed to parse markup")]
    Parse(#[from] ParseError),

    /// A rule's render function failed.
    #[error("rule `{rule}` failed to render match #{index}")]
    Render {
        /// Name of the failing rule.
        rule: String,
        /// Per-rule match index passed to render.
        index: usize,
        /// Error returned by the rule.
        #[source]
        source: RenderError,
    },

    /// Two matches in the same pass cover overlapping byte ranges.
    #[error(
        "rules `{first}` and `{second}` matched overlapping spans \
         {first_start}..={first_end} and {second_start}..={second_end}"
    )]
    OverlappingMatches {
        /// Rule owning the earlier span.
        first: String,
        /// Start of the earlier span.
        first_start: usize,
        /// End of the earlier span (inclusive).
        first_end: usize,
        /// Rule owning the later span.
        second: String,
        /// Start of the later span.
        second_start: usize,
        /// End of the later span (inclusive).
        second_end: usize,
    },

    /// Inner-content recursion went deeper than the configured limit.
    #[error("maximum rewrite depth of {limit} exceeded")]
    DepthExceeded {
        /// Configured depth limit.
        limit: usize,
    },
}
