//! ST-012: Runner — the sequential execution loop.
//!
//! For each statement in program order: resolve refs against this run's
//! bindings → driver lookup → invoke → record outcome → bind identifier.
//! A failed driver call never stops the loop. Only a ref to an identifier
//! that no earlier statement declared aborts the run.

use super::error::{RunFailure, TemplateError};
use super::report::RunReport;
use super::resolver::{self, Bindings, RefError};
use super::runid::{RunIdSource, SharedRunIds};
use super::template::Template;
use super::types::*;
use crate::driver::Driver;
use crate::tripwire::{eventlog, hasher};
use std::path::Path;
use std::time::Instant;

/// How a single statement went.
#[derive(Debug)]
enum StepOutcome {
    Succeeded,
    /// Captured on the statement; the run continues.
    Failed,
    /// The run must stop here.
    Aborted(TemplateError),
}

/// Executes templates against a driver.
pub struct Runner<'a> {
    driver: &'a dyn Driver,
    ids: Box<dyn RunIdSource + 'a>,
    event_log: Option<&'a Path>,
}

impl<'a> Runner<'a> {
    pub fn new(driver: &'a dyn Driver) -> Self {
        Self {
            driver,
            ids: Box::new(SharedRunIds),
            event_log: None,
        }
    }

    /// Replace the run id source (clock + randomness).
    pub fn with_id_source(mut self, ids: impl RunIdSource + 'a) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Append provenance events under `state_dir`.
    pub fn with_event_log(mut self, state_dir: &'a Path) -> Self {
        self.event_log = Some(state_dir);
        self
    }

    /// Run every statement once. The template itself is not modified; the
    /// report carries copies of the statements with outcomes and bindings.
    pub fn run(&mut self, template: &Template) -> Result<RunReport, RunFailure> {
        let start = Instant::now();
        let started_at = self.ids.now();
        let id = self.ids.next_id();
        let run_id = id.to_string();

        tracing::info!(
            run_id = %run_id,
            template = %template.name,
            statements = template.statements.len(),
            "run started"
        );
        self.log_event(ProvenanceEvent::RunStarted {
            run_id: run_id.clone(),
            template: template.name.clone(),
            statements: template.statements.len(),
            template_hash: template.fingerprint(),
            stencil_version: env!("CARGO_PKG_VERSION").to_string(),
        });

        let mut statements = template.statements.clone();
        let mut env = Bindings::new();
        let mut succeeded = 0u32;
        let mut failed = 0u32;
        let mut aborted: Option<(usize, TemplateError)> = None;

        for (index, stmt) in statements.iter_mut().enumerate() {
            reset(stmt);
            match self.execute(index, stmt, &mut env, &run_id) {
                StepOutcome::Succeeded => succeeded += 1,
                StepOutcome::Failed => failed += 1,
                StepOutcome::Aborted(err) => {
                    aborted = Some((index, err));
                    break;
                }
            }
        }

        let mut report = RunReport {
            id,
            template: template.name.clone(),
            started_at,
            finished_at: self.ids.now(),
            statements,
        };

        if let Some((index, error)) = aborted {
            tracing::error!(run_id = %run_id, index, %error, "run aborted");
            self.log_event(ProvenanceEvent::RunAborted {
                run_id,
                index,
                error: error.to_string(),
            });
            report.statements.truncate(index + 1);
            return Err(RunFailure {
                report: Box::new(report),
                error,
            });
        }

        tracing::info!(run_id = %run_id, succeeded, failed, "run completed");
        self.log_event(ProvenanceEvent::RunCompleted {
            run_id,
            succeeded,
            failed,
            total_seconds: start.elapsed().as_secs_f64(),
        });

        Ok(report)
    }

    fn execute(
        &self,
        index: usize,
        stmt: &mut Statement,
        env: &mut Bindings,
        run_id: &str,
    ) -> StepOutcome {
        let line = stmt.source();
        let expr = stmt.expr();

        let params = match resolver::effective_params(expr, env) {
            Ok(params) => params,
            Err(RefError::Undeclared { param, ident }) => {
                let error = TemplateError::UnresolvedRef {
                    statement: index,
                    param,
                    ident,
                };
                stmt.outcome = Outcome::failed(error.to_string());
                return StepOutcome::Aborted(error);
            }
            Err(RefError::Failed { ident, reason, .. }) => {
                let msg = format!("reference ${} failed: {}", ident, reason);
                self.record_failure(index, stmt, env, run_id, &line, msg);
                return StepOutcome::Failed;
            }
        };

        tracing::debug!(index, line = %line, "executing");
        let exec = self.driver.lookup(&expr.action, &expr.entity);
        let step_start = Instant::now();
        let result = exec(&params);
        let duration = step_start.elapsed().as_secs_f64();

        match result {
            Ok(value) => {
                stmt.outcome = Outcome::succeeded(value.clone());
                bind(stmt, env, Binding::Value(value));
                self.log_event(ProvenanceEvent::StatementExecuted {
                    run_id: run_id.to_string(),
                    index,
                    line,
                    params_hash: hasher::hash_params(&params),
                    duration_seconds: duration,
                });
                StepOutcome::Succeeded
            }
            Err(e) => {
                self.record_failure(index, stmt, env, run_id, &line, e.to_string());
                StepOutcome::Failed
            }
        }
    }

    fn record_failure(
        &self,
        index: usize,
        stmt: &mut Statement,
        env: &mut Bindings,
        run_id: &str,
        line: &str,
        error: String,
    ) {
        tracing::warn!(index, line, %error, "statement failed");
        stmt.outcome = Outcome::failed(error.clone());
        bind(stmt, env, Binding::Failed(error.clone()));
        self.log_event(ProvenanceEvent::StatementFailed {
            run_id: run_id.to_string(),
            index,
            line: line.to_string(),
            error,
        });
    }

    fn log_event(&self, event: ProvenanceEvent) {
        if let Some(state_dir) = self.event_log {
            if let Err(e) = eventlog::append_event(state_dir, event) {
                tracing::warn!(error = %e, "event log write failed");
            }
        }
    }
}

/// Clear anything a previous run left on a statement.
fn reset(stmt: &mut Statement) {
    stmt.outcome = Outcome::default();
    if let Node::Declaration(decl) = &mut stmt.node {
        decl.left.value = None;
    }
}

/// Declarations bind their identifier; bare expressions bind nothing.
fn bind(stmt: &mut Statement, env: &mut Bindings, binding: Binding) {
    if let Node::Declaration(decl) = &mut stmt.node {
        env.bind(&decl.left.name, binding.clone());
        decl.left.value = Some(binding);
    }
}
