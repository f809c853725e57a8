//! ST-016: Echo driver — deterministic stand-in for a provider backend.
//!
//! `create` answers with `"<entity>-<8 hex of BLAKE3(params)>"`; any other
//! action echoes its params back as an object. Useful for rehearsing a
//! template end to end without touching real infrastructure.

use super::{DiagnosticSink, Driver, DriverFn};
use crate::core::types::{Params, Value};
use crate::tripwire::hasher;
use std::cell::RefCell;
use std::io::Write;

#[derive(Default)]
pub struct EchoDriver {
    dry_run: bool,
    sink: RefCell<Option<DiagnosticSink>>,
}

impl EchoDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Id an echo `create` would hand out for these params.
pub fn echo_id(entity: &str, params: &Params) -> String {
    let hash = hasher::hash_params(params);
    format!("{}-{}", entity, hasher::short_hex(&hash, 8))
}

impl Driver for EchoDriver {
    fn lookup(&self, action: &str, entity: &str) -> DriverFn<'_> {
        let action = action.to_string();
        let entity = entity.to_string();
        Box::new(move |params: &Params| {
            let mut sink = self.sink.borrow_mut();
            if let Some(sink) = sink.as_mut() {
                let _ = writeln!(sink, "echo: {} {}", action, entity);
            }
            if self.dry_run {
                return Ok(Value::Null);
            }
            if action == "create" {
                Ok(Value::String(echo_id(&entity, params)))
            } else {
                Ok(Value::Object(params.clone().into_iter().collect()))
            }
        })
    }

    fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    fn set_sink(&mut self, sink: DiagnosticSink) {
        *self.sink.get_mut() = Some(sink);
    }
}
