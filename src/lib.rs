//! Stencil — declarative provisioning templates.
//!
//! Ordered statements, cross-statement refs, holes and aliases resolved
//! before or during a run, and a replayable report for every run.

pub mod cli;
pub mod core;
pub mod driver;
pub mod tripwire;

pub use crate::core::error::{RunFailure, TemplateError};
pub use crate::core::report::RunReport;
pub use crate::core::template::Template;
pub use crate::core::types::{Expression, Node, Outcome, Params, Statement, Value};
pub use crate::driver::{Driver, DriverError, DriverFn};
