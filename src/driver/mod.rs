//! ST-010: Driver abstraction — maps (action, entity) to an executable.
//!
//! Lookup is total. Unknown pairs resolve to a function that fails at call
//! time with [`DriverError::Unsupported`], so the runner only ever sees
//! failures as ordinary per-statement errors.

pub mod echo;
pub mod registry;

use crate::core::types::{Params, Value};
use std::io::Write;

/// Executable bound to one (action, entity) pair.
pub type DriverFn<'a> = Box<dyn Fn(&Params) -> Result<Value, DriverError> + 'a>;

/// Where a driver writes its diagnostics.
pub type DiagnosticSink = Box<dyn Write + Send>;

/// Failure returned by a driver function. The `Display` text is what ends
/// up in the statement's captured error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error("unsupported action/entity: {action} {entity}")]
    Unsupported { action: String, entity: String },

    #[error("{0}")]
    Failed(String),
}

impl DriverError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Backend capability the runner depends on.
pub trait Driver {
    /// Resolve an (action, entity) pair to an executable.
    fn lookup(&self, action: &str, entity: &str) -> DriverFn<'_>;

    /// Enable or disable no-op mode.
    fn set_dry_run(&mut self, dry_run: bool);

    /// Attach a diagnostic sink.
    fn set_sink(&mut self, sink: DiagnosticSink);
}

/// Function returned for pairs a driver does not know.
pub fn unsupported<'a>(action: &str, entity: &str) -> DriverFn<'a> {
    let err = DriverError::Unsupported {
        action: action.to_string(),
        entity: entity.to_string(),
    };
    Box::new(move |_: &Params| Err(err.clone()))
}
