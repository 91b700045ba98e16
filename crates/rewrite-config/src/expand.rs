//! `${VAR}` and `${VAR:-default}` expansion in rule templates.

use std::borrow::Cow;
use std::convert::Infallible;

use crate::ConfigError;

/// Expand environment variable references in `value`.
///
/// A `${VAR}` without a default must name a set variable. Any other `$`
/// reference to an unset variable, such as `$price`, is kept as written so
/// templates can contain literal dollar signs.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    if let Some(name) = unset_required_var(value) {
        return Err(ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{name}}} not set"),
        });
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, Infallible> {
        Ok(std::env::var(var).ok())
    })
    .map(Cow::into_owned)
    .map_err(|e| match e.cause {})
}

/// First `${NAME}` reference without a default whose variable is unset.
fn unset_required_var(value: &str) -> Option<&str> {
    value.match_indices("${").find_map(|(i, _)| {
        let rest = &value[i + 2..];
        let name = &rest[..rest.find('}')?];
        let required = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        (required && std::env::var_os(name).is_none()).then_some(name)
    })
}
