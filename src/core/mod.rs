//! Core template logic — AST, resolution, execution, run identity, reports.

pub mod error;
pub mod parser;
pub mod report;
pub mod resolver;
pub mod runid;
pub mod runner;
pub mod template;
pub mod types;
