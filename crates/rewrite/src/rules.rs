//! Rules built from `[[rules]]` entries of the configuration.

use std::sync::LazyLock;

use regex::Regex;
use rewrite_config::{Config, RuleConfig};
use rewrite_engine::{
    ElementRef, ElementSnapshot, Engine, Phase, RenderError, Replacement, Rewrite,
};

/// Template placeholders: `{inner}`, `{index}`, `{tag}`, `{start}`, `{end}`
/// and `{attr:NAME}`.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(inner|index|tag|start|end|attr:([^{}\s]+))\}")
        .expect("invalid placeholder regex")
});

/// Build an engine from the configured rules and engine settings.
pub(crate) fn build_engine(config: &Config) -> Engine {
    Engine::new(
        config
            .rules
            .iter()
            .map(|rule| Box::new(ConfiguredRule::from(rule)) as Box<dyn Rewrite>),
    )
    .with_strategy(config.engine.strategy)
    .with_policy(config.engine.policy)
    .with_max_depth(config.engine.max_depth)
}

/// What a configured rule puts in place of a matched element.
#[derive(Debug)]
enum Action {
    Remove,
    Template(String),
}

/// Rule matching by tag, namespace and attribute values.
#[derive(Debug)]
pub(crate) struct ConfiguredRule {
    name: String,
    phase: Phase,
    tag: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    action: Action,
}

impl From<&RuleConfig> for ConfiguredRule {
    fn from(config: &RuleConfig) -> Self {
        let action = match &config.template {
            Some(template) if !config.remove => Action::Template(template.clone()),
            _ => Action::Remove,
        };
        Self {
            name: config.display_name().to_owned(),
            phase: config.phase,
            tag: config.tag.clone(),
            namespace: config.namespace.clone(),
            attributes: config
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            action,
        }
    }
}

impl Rewrite for ConfiguredRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn matches(&self, element: &ElementRef<'_>) -> bool {
        let name_matches = match &self.namespace {
            Some(ns) => element.namespace() == Some(ns.as_str()) && element.local_name() == self.tag,
            None => element.name() == self.tag,
        };
        name_matches
            && self
                .attributes
                .iter()
                .all(|(name, value)| element.attr(name) == Some(value.as_str()))
    }

    fn render(&self, element: &ElementSnapshot, index: usize) -> Result<Replacement, RenderError> {
        match &self.action {
            Action::Remove => Ok(Replacement::Remove),
            Action::Template(template) => Ok(render_template(template, element, index)?.into()),
        }
    }
}

/// A `{attr:NAME}` placeholder referenced an attribute the element lacks.
#[derive(Debug, thiserror::Error)]
#[error("<{tag}> has no attribute `{attribute}`")]
pub(crate) struct MissingAttribute {
    tag: String,
    attribute: String,
}

/// Substitute placeholders in `template` with values of the matched element.
fn render_template(
    template: &str,
    element: &ElementSnapshot,
    index: usize,
) -> Result<String, MissingAttribute> {
    let mut out = String::with_capacity(template.len() + element.inner_html.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);

        if let Some(attribute) = caps.get(2) {
            let value = element
                .attr(attribute.as_str())
                .ok_or_else(|| MissingAttribute {
                    tag: element.name.clone(),
                    attribute: attribute.as_str().to_owned(),
                })?;
            out.push_str(value);
        } else {
            match &caps[1] {
                "inner" => out.push_str(&element.inner_html),
                "index" => out.push_str(&index.to_string()),
                "tag" => out.push_str(&element.name),
                "start" => out.push_str(&element.start.to_string()),
                "end" => out.push_str(&element.end.to_string()),
                other => out.push_str(other),
            }
        }
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}
