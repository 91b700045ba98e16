//! Hooks for a host build pipeline.
//!
//! A host registers one [`PhaseHook`] per phase that has rules and decides
//! where each runs in its own pipeline (e.g. the post hook after its asset
//! injection step). Only `.html` modules are rewritten by [`PhaseHook::transform`].

use crate::engine::Engine;
use crate::error::RewriteError;
use crate::rule::Phase;

/// Base name of the registered hooks.
const HOOK_NAME: &str = "rewrite-html";

/// Metadata passed by the host with an entry document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryContext {
    /// Path of the entry document, for logging.
    pub path: String,
    /// Pipeline stage the host is calling from.
    pub stage: Phase,
}

impl EntryContext {
    /// Create a context for `path` at `stage`.
    pub fn new(path: impl Into<String>, stage: Phase) -> Self {
        Self {
            path: path.into(),
            stage,
        }
    }
}

/// Engine bound to a single phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseHook<'e> {
    engine: &'e Engine,
    phase: Phase,
}

impl<'e> PhaseHook<'e> {
    /// Hook name, e.g. `rewrite-html-pre`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{HOOK_NAME}-{}", self.phase)
    }

    /// Phase this hook runs.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Rewrite a module's contents if its id names an HTML file.
    ///
    /// Returns `Ok(None)` for anything else so the host leaves it alone.
    ///
    /// # Errors
    ///
    /// Returns the engine error for HTML modules that fail to transform.
    pub fn transform(&self, code: &str, id: &str) -> Result<Option<String>, RewriteError> {
        if !is_html_module(id) {
            return Ok(None);
        }
        tracing::debug!("{}: transforming module {id}", self.name());
        self.engine.transform_phase(code, self.phase).map(Some)
    }

    /// Rewrite the entry document with this hook's phase.
    ///
    /// `ctx` is only used for logging; the hook's own phase always decides
    /// which rules run. Use [`Engine::transform_entry`] to pick the phase
    /// from the context instead.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the document fails to transform.
    pub fn transform_index_html(
        &self,
        html: &str,
        ctx: &EntryContext,
    ) -> Result<String, RewriteError> {
        if ctx.stage != self.phase {
            tracing::warn!(
                "{}: entry {} arrived with {} stage context, running {} rules",
                self.name(),
                ctx.path,
                ctx.stage,
                self.phase
            );
        }
        tracing::debug!("{}: transforming entry {}", self.name(), ctx.path);
        self.engine.transform_phase(html, self.phase)
    }
}

impl Engine {
    /// Hooks for the phases that have rules, in execution order.
    ///
    /// Phases without rules register nothing.
    #[must_use]
    pub fn plugins(&self) -> Vec<PhaseHook<'_>> {
        Phase::ALL
            .into_iter()
            .filter(|phase| self.has_rules(*phase))
            .map(|phase| PhaseHook {
                engine: self,
                phase,
            })
            .collect()
    }

    /// Rewrite an entry document with the rules of the context's stage.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the document fails to transform.
    pub fn transform_entry(&self, html: &str, ctx: &EntryContext) -> Result<String, RewriteError> {
        tracing::debug!("Transforming entry {} at {} stage", ctx.path, ctx.stage);
        self.transform_phase(html, ctx.stage)
    }
}

/// Whether a module id refers to an `.html` file, ignoring query and fragment.
fn is_html_module(id: &str) -> bool {
    let path = id.split(['?', '#']).next().unwrap_or(id);
    path.ends_with(".html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;

    fn engine() -> Engine {
        Engine::new(vec![
            Rule::new(|e| e.name() == "x", |_, _| "<y/>").boxed(),
            Rule::new(|e| e.name() == "y", |_, _| "z")
                .with_phase(Phase::Post)
                .boxed(),
        ])
    }

    #[test]
    fn test_plugins_skip_empty_phases() {
        let engine = Engine::new(vec![Rule::new(|_| true, |_, _| "").boxed()]);
        let hooks = engine.plugins();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].name(), "rewrite-html-pre");

        assert!(Engine::new(Vec::new()).plugins().is_empty());
    }

    #[test]
    fn test_plugins_run_in_phase_order() {
        let engine = engine();
        let names: Vec<String> = engine.plugins().iter().map(PhaseHook::name).collect();
        assert_eq!(names, vec!["rewrite-html-pre", "rewrite-html-post"]);

        let mut html = "<x/>".to_owned();
        for hook in engine.plugins() {
            html = hook.transform(&html, "/src/page.html").unwrap().unwrap();
        }
        assert_eq!(html, "z");
    }

    #[test]
    fn test_transform_ignores_non_html_modules() {
        let engine = engine();
        let hook = engine.plugins()[0];
        assert_eq!(hook.transform("<x/>", "/src/main.ts").unwrap(), None);
        assert_eq!(
            hook.transform("<x/>", "/src/page.html?raw").unwrap(),
            Some("<y/>".to_owned())
        );
    }

    #[test]
    fn test_transform_entry_uses_stage() {
        let engine = engine();
        let pre = EntryContext::new("index.html", Phase::Pre);
        let post = EntryContext::new("index.html", Phase::Post);

        assert_eq!(engine.transform_entry("<x/>", &pre).unwrap(), "<y/>");
        assert_eq!(engine.transform_entry("<x/>", &post).unwrap(), "<x/>");
        assert_eq!(engine.transform_entry("<y/>", &post).unwrap(), "z");

        let hook = engine.plugins()[1];
        assert_eq!(hook.transform_index_html("<y/>", &post).unwrap(), "z");
    }

    #[test]
    fn test_transform_index_html_uses_hook_phase() {
        let engine = engine();
        let pre_hook = engine.plugins()[0];
        let post = EntryContext::new("index.html", Phase::Post);

        assert_eq!(pre_hook.transform_index_html("<x/>", &post).unwrap(), "<y/>");
        assert_eq!(pre_hook.transform_index_html("<y/>", &post).unwrap(), "<y/>");
    }

    #[test]
    fn test_is_html_module() {
        assert!(is_html_module("index.html"));
        assert!(is_html_module("/a/b.html#top"));
        assert!(!is_html_module("style.css"));
        assert!(!is_html_module("page.html.js"));
    }
}
