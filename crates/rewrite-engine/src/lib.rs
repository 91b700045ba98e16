//! Rule-based markup rewrite engine.
//!
//! Given a document and a list of [`Rewrite`] rules, the [`Engine`] produces a
//! new document in which every matched element is replaced by its rendered
//! text or removed, while unmatched content stays intact.
//!
//! # Architecture
//!
//! - [`MarkupParser`] builds an arena [`Document`] whose nodes carry byte spans
//!   of their source.
//! - A [`MatchPolicy`] selects matched elements.
//! - For each match the element's children are serialized and rewritten with
//!   the same rules first, so nested matches resolve innermost-first.
//! - The rule's render result becomes a [`MatchRecord`].
//! - An [`Assembler`] (picked by [`Strategy`]) builds the output from the
//!   records.
//! - Rules are split into a pre and a post [`Phase`]; the post phase runs on
//!   the pre phase's output text.
//!
//! # Example
//!
//! ```
//! use rewrite_engine::{Engine, Rule};
//!
//! let engine = Engine::new(vec![
//!     Rule::new(|e| e.name() == "a", |e, _| format!("A({})", e.inner_html)).boxed(),
//!     Rule::new(|e| e.name() == "b", |e, _| format!("B({})", e.inner_html)).boxed(),
//! ]);
//!
//! assert_eq!(engine.transform("<a><b>x</b></a>").unwrap(), "A(B(x))");
//! ```

mod assembler;
mod engine;
mod error;
mod host;
mod matcher;
mod parser;
mod rule;
mod serializer;
mod splice;
mod tree;

pub use assembler::{Assembler, MatchRecord, ReserializeAssembler, SpliceAssembler, Strategy};
pub use engine::{DEFAULT_MAX_DEPTH, Engine};
pub use error::{ParseError, RenderError, RewriteError};
pub use host::{EntryContext, PhaseHook};
pub use matcher::MatchPolicy;
pub use parser::MarkupParser;
pub use rule::{ElementRef, ElementSnapshot, Phase, Replacement, Rewrite, Rule, UnknownPhase};
pub use serializer::MarkupSerializer;
pub use splice::{shift_end, splice};
pub use tree::{Attribute, Document, ElementData, Node, NodeId, NodeKind, NodeType};
