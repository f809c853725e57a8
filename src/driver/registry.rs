//! ST-011: Map-backed driver — handlers registered per (action, entity).

use super::{unsupported, DiagnosticSink, Driver, DriverError, DriverFn};
use crate::core::types::{Params, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

type Handler = Box<dyn Fn(&Params) -> Result<Value, DriverError>>;

/// Driver backed by a handler table.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<(String, String), Handler>,
    dry_run: bool,
    sink: RefCell<Option<DiagnosticSink>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a pair.
    pub fn register<F>(&mut self, action: &str, entity: &str, handler: F)
    where
        F: Fn(&Params) -> Result<Value, DriverError> + 'static,
    {
        self.handlers
            .insert((action.to_string(), entity.to_string()), Box::new(handler));
    }

    pub fn with<F>(mut self, action: &str, entity: &str, handler: F) -> Self
    where
        F: Fn(&Params) -> Result<Value, DriverError> + 'static,
    {
        self.register(action, entity, handler);
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn supports(&self, action: &str, entity: &str) -> bool {
        self.handlers
            .contains_key(&(action.to_string(), entity.to_string()))
    }

    fn diag(&self, line: &str) {
        let mut sink = self.sink.borrow_mut();
        if let Some(sink) = sink.as_mut() {
            // diagnostics are best-effort
            let _ = writeln!(sink, "{}", line);
        }
    }
}

impl Driver for Registry {
    fn lookup(&self, action: &str, entity: &str) -> DriverFn<'_> {
        let key = (action.to_string(), entity.to_string());
        let Some(handler) = self.handlers.get(&key) else {
            tracing::debug!(action, entity, "no handler registered");
            return unsupported(action, entity);
        };

        Box::new(move |params: &Params| {
            let (action, entity) = (&key.0, &key.1);
            if self.dry_run {
                self.diag(&format!("dry run: {} {}", action, entity));
                return Ok(Value::Null);
            }
            self.diag(&format!("{} {} ({} params)", action, entity, params.len()));
            handler(params)
        })
    }

    fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    fn set_sink(&mut self, sink: DiagnosticSink) {
        *self.sink.get_mut() = Some(sink);
    }
}
