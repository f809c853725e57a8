//! ST-004: Template facade — the object callers operate on.
//!
//! Resolution passes (`merge_params`, `resolve_holes`, `interactive_resolve`,
//! `resolve_aliases`) mutate the statements in place and are meant to run
//! before any `run`. `run` only reads, so one template serves many runs.

use super::error::{RunFailure, TemplateError};
use super::report::{self, RunReport};
use super::resolver;
use super::runner::Runner;
use super::types::*;
use crate::driver::Driver;
use crate::tripwire::hasher;
use indexmap::IndexMap;

/// An ordered program of statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    pub name: String,
    pub statements: Vec<Statement>,
}

impl Template {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            name: String::new(),
            statements,
        }
    }

    pub fn named(name: &str, statements: Vec<Statement>) -> Self {
        Self {
            name: name.to_string(),
            statements,
        }
    }

    fn expressions_mut(&mut self) -> impl Iterator<Item = &mut Expression> {
        self.statements.iter_mut().map(Statement::expr_mut)
    }

    /// Flat union of every expression's aliases, last write wins.
    pub fn collect_aliases(&self) -> IndexMap<String, String> {
        let mut aliases = IndexMap::new();
        for stmt in &self.statements {
            for (k, v) in &stmt.expr().aliases {
                aliases.insert(k.clone(), v.clone());
            }
        }
        aliases
    }

    /// Apply `entity.param` overrides to every expression of that entity.
    /// Overrides that match nothing, or have no `.`, are ignored.
    pub fn merge_params(&mut self, overrides: &Params) {
        for (key, value) in overrides {
            let Some((entity, param)) = key.split_once('.') else {
                tracing::debug!(key = %key, "override without entity prefix ignored");
                continue;
            };
            for expr in self.expressions_mut() {
                if expr.entity == entity {
                    expr.params.insert(param.to_string(), value.clone());
                }
            }
        }
    }

    /// Fill holes from `fills`. Holes without a fill stay pending and are
    /// reported together.
    pub fn resolve_holes(&mut self, fills: &Params) -> Result<(), TemplateError> {
        let mut open = Vec::new();
        for expr in self.expressions_mut() {
            if expr.holes.is_empty() {
                continue;
            }
            open.extend(resolver::fill_holes(expr, fills));
        }
        if open.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::UnresolvedHoles { holes: open })
        }
    }

    /// Fill every hole by asking, once per hole occurrence, in program order.
    pub fn interactive_resolve<F>(&mut self, mut ask: F)
    where
        F: FnMut(&str) -> Value,
    {
        for expr in self.expressions_mut() {
            resolver::ask_holes(expr, &mut ask);
        }
    }

    /// Move resolved alias values into params.
    pub fn resolve_aliases(&mut self, resolved: &Params) -> Result<(), TemplateError> {
        let mut open = Vec::new();
        for expr in self.expressions_mut() {
            open.extend(resolver::fill_aliases(expr, resolved));
        }
        if open.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::UnresolvedAliases { aliases: open })
        }
    }

    /// Hole names still waiting for a value, in program order.
    pub fn pending_holes(&self) -> Vec<String> {
        self.statements
            .iter()
            .flat_map(|s| s.expr().holes.values().cloned())
            .collect()
    }

    /// Composite BLAKE3 over the rendered statements. Changes whenever a
    /// merge or resolution changes what a run would send to the driver.
    pub fn fingerprint(&self) -> String {
        let parts: Vec<String> = self
            .statements
            .iter()
            .map(|s| hasher::hash_string(&s.to_string()))
            .collect();
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        hasher::composite_hash(&refs)
    }

    /// True iff some statement captured an error.
    pub fn has_errors(&self) -> bool {
        report::has_errors(&self.statements)
    }

    /// Run against `driver` with a system-clock run id.
    pub fn run(&self, driver: &dyn Driver) -> Result<RunReport, RunFailure> {
        Runner::new(driver).run(self)
    }
}
