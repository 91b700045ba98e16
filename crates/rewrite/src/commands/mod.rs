//! CLI command implementations.

pub(crate) mod apply;
pub(crate) mod check;

pub(crate) use apply::ApplyArgs;
pub(crate) use check::CheckArgs;
