//! ST-002: Error types for template resolution and runs.

use super::report::RunReport;

/// Everything that can go wrong outside a single driver call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    /// A ref names an identifier no earlier statement declared in this run.
    #[error("statement {statement}: param '{param}' references undeclared ${ident}")]
    UnresolvedRef {
        statement: usize,
        param: String,
        ident: String,
    },

    #[error("unresolved holes: {}", holes.join(", "))]
    UnresolvedHoles { holes: Vec<String> },

    #[error("unresolved aliases: {}", aliases.join(", "))]
    UnresolvedAliases { aliases: Vec<String> },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Io(String),

    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<String>),
}

/// A run that stopped early. Carries whatever was executed before the stop.
#[derive(Debug, thiserror::Error)]
#[error("run {} aborted: {error}", report.id)]
pub struct RunFailure {
    pub report: Box<RunReport>,
    pub error: TemplateError,
}
