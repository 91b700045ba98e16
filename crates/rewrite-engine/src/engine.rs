//! Phase orchestration and the per-pass rewrite pipeline.

use crate::assembler::{MatchRecord, Strategy};
use crate::error::RewriteError;
use crate::matcher::{Hit, MatchPolicy, Matcher};
use crate::parser::{Binding, MarkupParser, bindings_in_scope};
use crate::rule::{ElementRef, ElementSnapshot, Phase, Rewrite};
use crate::serializer::MarkupSerializer;
use crate::splice::shift_end;
use crate::tree::Document;

/// Default limit on inner-content recursion.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Rewrite engine holding an immutable rule list split by phase.
///
/// Each call parses its own tree, so one engine can serve several documents
/// from different threads.
pub struct Engine {
    pre: Vec<Box<dyn Rewrite>>,
    post: Vec<Box<dyn Rewrite>>,
    strategy: Strategy,
    policy: MatchPolicy,
    max_depth: usize,
    parser: MarkupParser,
    serializer: MarkupSerializer,
}

impl Engine {
    /// Create an engine, partitioning `rules` by phase (order preserved).
    pub fn new(rules: impl IntoIterator<Item = Box<dyn Rewrite>>) -> Self {
        let (pre, post): (Vec<_>, Vec<_>) = rules
            .into_iter()
            .partition(|rule| rule.phase() == Phase::Pre);
        Self {
            pre,
            post,
            strategy: Strategy::default(),
            policy: MatchPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            parser: MarkupParser::new(),
            serializer: MarkupSerializer::new(),
        }
    }

    /// Set the reconstruction strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the match policy.
    #[must_use]
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the maximum inner-content nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Reconstruction strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Match policy.
    #[must_use]
    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Maximum inner-content nesting depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Rules of one phase in list order.
    #[must_use]
    pub fn rules(&self, phase: Phase) -> &[Box<dyn Rewrite>] {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        }
    }

    /// Whether the phase has any rules.
    #[must_use]
    pub fn has_rules(&self, phase: Phase) -> bool {
        !self.rules(phase).is_empty()
    }

    /// Run the pre phase and then the post phase.
    ///
    /// Only text crosses the phase boundary: the post phase parses the pre
    /// phase's output afresh.
    ///
    /// # Errors
    ///
    /// Returns the first parse, render, overlap or depth error.
    pub fn transform(&self, input: &str) -> Result<String, RewriteError> {
        let intermediate = self.transform_phase(input, Phase::Pre)?;
        self.transform_phase(&intermediate, Phase::Post)
    }

    /// Run the rules of a single phase.
    ///
    /// A phase without rules returns the input unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first parse, render, overlap or depth error.
    pub fn transform_phase(&self, input: &str, phase: Phase) -> Result<String, RewriteError> {
        let rules = self.rules(phase);
        if rules.is_empty() {
            tracing::trace!("No {phase} rules, passing document through");
            return Ok(input.to_owned());
        }

        tracing::debug!(
            "Running {phase} phase: {} rules, {} strategy, {} policy",
            rules.len(),
            self.strategy,
            self.policy
        );
        let output = self.rewrite(input, rules, 0, &[])?;
        tracing::debug!(
            "Finished {phase} phase: {} -> {} bytes",
            input.len(),
            output.len()
        );
        Ok(output)
    }

    /// One full pass: parse, match, resolve inner content, render, assemble.
    ///
    /// `scope` holds the namespace bindings declared around `input` when it
    /// is the inner content of a match.
    fn rewrite(
        &self,
        input: &str,
        rules: &[Box<dyn Rewrite>],
        depth: usize,
        scope: &[Binding],
    ) -> Result<String, RewriteError> {
        if depth > self.max_depth {
            return Err(RewriteError::DepthExceeded {
                limit: self.max_depth,
            });
        }

        let mut doc = self.parser.parse_in_scope(input, scope)?;
        let mut records = Vec::new();
        Matcher::new(rules, self.policy).run(&mut doc, |doc, hit| {
            records.push(self.apply(doc, hit, rules, depth, scope)?);
            Ok::<(), RewriteError>(())
        })?;

        if records.is_empty() {
            return Ok(input.to_owned());
        }

        records.sort_by_key(|record| record.start);
        check_disjoint(&records, rules)?;
        tracing::trace!("Assembling {} matches at depth {depth}", records.len());

        Ok(self.strategy.assembler().assemble(input, &mut doc, &records))
    }

    /// Resolve a hit's inner content and render it.
    fn apply(
        &self,
        doc: &Document,
        hit: Hit,
        rules: &[Box<dyn Rewrite>],
        depth: usize,
        scope: &[Binding],
    ) -> Result<MatchRecord, RewriteError> {
        let rule = &rules[hit.rule];
        let element = ElementRef::new(doc, hit.node).expect("matcher only yields elements");

        let inner_html = self.serializer.serialize_children(doc, hit.node);
        let rewritten = if inner_html.is_empty() {
            String::new()
        } else {
            let inner_scope = [scope, bindings_in_scope(doc, hit.node).as_slice()].concat();
            self.rewrite(&inner_html, rules, depth + 1, &inner_scope)?
        };

        let end = shift_end(element.end(), inner_html.len(), rewritten.len());
        let snapshot = ElementSnapshot::capture(&element, end, rewritten);

        tracing::trace!(
            "Rule `{}` matched <{}> #{} at {}..={}",
            rule.name(),
            element.name(),
            hit.index,
            element.start(),
            element.end()
        );

        let replacement =
            rule.render(&snapshot, hit.index)
                .map_err(|source| RewriteError::Render {
                    rule: rule.name().to_owned(),
                    index: hit.index,
                    source,
                })?;

        Ok(MatchRecord {
            node: hit.node,
            rule: hit.rule,
            start: element.start(),
            end: element.end(),
            replacement,
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |rules: &[Box<dyn Rewrite>]| -> Vec<String> {
            rules.iter().map(|rule| rule.name().to_owned()).collect()
        };
        f.debug_struct("Engine")
            .field("pre", &names(&self.pre))
            .field("post", &names(&self.post))
            .field("strategy", &self.strategy)
            .field("policy", &self.policy)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// Fail if any two sorted records overlap.
fn check_disjoint(records: &[MatchRecord], rules: &[Box<dyn Rewrite>]) -> Result<(), RewriteError> {
    for pair in records.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);
        if second.start <= first.end {
            let first_rule = rules[first.rule].name();
            let second_rule = rules[second.rule].name();
            tracing::warn!(
                "Rules `{first_rule}` and `{second_rule}` matched overlapping elements"
            );
            return Err(RewriteError::OverlappingMatches {
                first: first_rule.to_owned(),
                first_start: first.start,
                first_end: first.end,
                second: second_rule.to_owned(),
                second_start: second.start,
                second_end: second.end,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rule::{Replacement, Rule};

    static_assertions::assert_impl_all!(super::Engine: Send, Sync);

    fn wrap(tag: &'static str, label: &'static str) -> Box<dyn Rewrite> {
        Rule::new(move |e| e.name() == tag, move |e, _| {
            format!("{label}({})", e.inner_html)
        })
        .with_name(tag)
        .boxed()
    }

    #[test]
    fn test_new_partitions_rules_by_phase() {
        let engine = Engine::new(vec![
            wrap("a", "A"),
            wrap("b", "B"),
            Rule::new(|e| e.name() == "c", |_, _| "C")
                .with_phase(Phase::Post)
                .boxed(),
        ]);

        assert_eq!(engine.rules(Phase::Pre).len(), 2);
        assert_eq!(engine.rules(Phase::Pre)[1].name(), "b");
        assert_eq!(engine.rules(Phase::Post).len(), 1);
        assert!(engine.has_rules(Phase::Post));
        assert_eq!(engine.strategy(), Strategy::Splice);
        assert_eq!(engine.policy(), MatchPolicy::AllAtOnce);
        assert_eq!(engine.max_depth(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_text_outside_matches_untouched() {
        let engine = Engine::new(vec![wrap("b", "B")]);
        let output = engine.transform("head <p>keep <b>x</b> tail</p>\n").unwrap();
        assert_eq!(output, "head <p>keep B(x) tail</p>\n");
    }

    #[test]
    fn test_render_error_aborts_pass() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let engine = Engine::new(vec![
            Rule::try_new(
                move |e| e.name() == "x",
                move |_, index| {
                    *counter.lock().unwrap() += 1;
                    if index == 1 {
                        return Err("boom".into());
                    }
                    Ok("ok")
                },
            )
            .with_name("failing")
            .boxed(),
        ]);

        let err = engine.transform("<x/><x/><x/>").unwrap_err();
        assert!(matches!(
            err,
            RewriteError::Render { ref rule, index: 1, .. } if rule == "failing"
        ));
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_parse_error_propagates() {
        let engine = Engine::new(vec![wrap("b", "B")]);
        assert!(matches!(
            engine.transform("<b>x</i>"),
            Err(RewriteError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_phase_does_not_parse() {
        let engine = Engine::new(Vec::new());
        assert_eq!(engine.transform("<<not markup").unwrap(), "<<not markup");
    }

    #[test]
    fn test_overlap_detected_under_iterative_policy() {
        let engine = Engine::new(vec![wrap("b", "B"), wrap("a", "A")])
            .with_policy(MatchPolicy::IterativeFirst);

        let err = engine.transform("<a><b>x</b></a>").unwrap_err();
        assert!(matches!(
            err,
            RewriteError::OverlappingMatches {
                ref first,
                first_start: 0,
                first_end: 14,
                ref second,
                second_start: 3,
                second_end: 10,
            } if first == "a" && second == "b"
        ));
    }

    #[test]
    fn test_iterative_policy_with_outer_rule_first() {
        let engine = Engine::new(vec![wrap("a", "A"), wrap("b", "B")])
            .with_policy(MatchPolicy::IterativeFirst);
        assert_eq!(engine.transform("<a><b>x</b></a><b>y</b>").unwrap(), "A(B(x))B(y)");
    }

    #[test]
    fn test_depth_limit() {
        let nested = format!("{}x{}", "<b>".repeat(10), "</b>".repeat(10));
        let engine = Engine::new(vec![wrap("b", "B")]).with_max_depth(3);
        assert!(matches!(
            engine.transform(&nested),
            Err(RewriteError::DepthExceeded { limit: 3 })
        ));

        let engine = Engine::new(vec![wrap("b", "B")]);
        assert_eq!(
            engine.transform(&nested).unwrap(),
            format!("{}x{}", "B(".repeat(10), ")".repeat(10))
        );
    }

    #[test]
    fn test_removal_with_empty_text() {
        let engine = Engine::new(vec![
            Rule::new(|e| e.name() == "drop", |_, _| Replacement::Text(String::new())).boxed(),
        ]);
        assert_eq!(engine.transform("a<drop/>b").unwrap(), "ab");
    }
}
