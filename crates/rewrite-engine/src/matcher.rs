//! Element selection policies.

use std::fmt;
use std::str::FromStr;

use crate::rule::{ElementRef, Rewrite};
use crate::tree::{Document, NodeId};

/// How matches are selected within one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// One pre-order traversal of the unmodified tree. The first rule (in
    /// list order) matching an element claims it, and the traversal does not
    /// descend into claimed elements. Matches are disjoint by construction.
    #[default]
    AllAtOnce,
    /// For each rule in list order, repeatedly take the first live element it
    /// matches and excise it from the tree before searching again. Later
    /// rules see earlier matches as removed.
    IterativeFirst,
}

impl MatchPolicy {
    /// Kebab-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllAtOnce => "all-at-once",
            Self::IterativeFirst => "iterative-first",
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all-at-once" => Ok(Self::AllAtOnce),
            "iterative-first" => Ok(Self::IterativeFirst),
            other => Err(format!(
                "unknown match policy `{other}` (expected `all-at-once` or `iterative-first`)"
            )),
        }
    }
}

/// A matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hit {
    /// Matched element.
    pub node: NodeId,
    /// Position of the matching rule in the phase's rule list.
    pub rule: usize,
    /// Per-rule match counter.
    pub index: usize,
}

/// Runs a [`MatchPolicy`] over a document.
pub(crate) struct Matcher<'r> {
    rules: &'r [Box<dyn Rewrite>],
    policy: MatchPolicy,
}

impl<'r> Matcher<'r> {
    pub(crate) fn new(rules: &'r [Box<dyn Rewrite>], policy: MatchPolicy) -> Self {
        Self { rules, policy }
    }

    /// Call `visit` for every match in selection order.
    ///
    /// Under [`MatchPolicy::IterativeFirst`] each visited element is excised
    /// right after `visit` returns. Stops at the first error.
    pub(crate) fn run<E>(
        &self,
        doc: &mut Document,
        mut visit: impl FnMut(&Document, Hit) -> Result<(), E>,
    ) -> Result<(), E> {
        match self.policy {
            MatchPolicy::AllAtOnce => {
                for hit in self.collect(doc) {
                    visit(doc, hit)?;
                }
            }
            MatchPolicy::IterativeFirst => {
                for (rule, rewrite) in self.rules.iter().enumerate() {
                    let mut index = 0;
                    while let Some(node) = find_first(doc, rewrite.as_ref()) {
                        visit(doc, Hit { node, rule, index })?;
                        doc.excise(node);
                        index += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Single traversal collecting every claimed element in document order.
    fn collect(&self, doc: &Document) -> Vec<Hit> {
        let mut hits = Vec::new();
        let mut counters = vec![0usize; self.rules.len()];
        let mut stack: Vec<NodeId> = doc.children(Document::ROOT).rev().collect();

        while let Some(id) = stack.pop() {
            let Some(element) = ElementRef::new(doc, id) else {
                continue;
            };
            let claimed = self
                .rules
                .iter()
                .position(|rewrite| rewrite.matches(&element));
            if let Some(rule) = claimed {
                hits.push(Hit {
                    node: id,
                    rule,
                    index: counters[rule],
                });
                counters[rule] += 1;
            } else {
                stack.extend(doc.children(id).rev());
            }
        }

        hits
    }
}

/// First live element in pre-order that `rewrite` matches.
fn find_first(doc: &Document, rewrite: &dyn Rewrite) -> Option<NodeId> {
    let mut stack: Vec<NodeId> = doc.children(Document::ROOT).rev().collect();
    while let Some(id) = stack.pop() {
        if let Some(element) = ElementRef::new(doc, id) {
            if rewrite.matches(&element) {
                return Some(id);
            }
            stack.extend(doc.children(id).rev());
        }
    }
    None
}
