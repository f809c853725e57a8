//! ST-001: Template AST and document types.
//!
//! A template is an ordered list of statements. Each statement is either a
//! declaration (`ident := action entity ...`) or a bare expression. Every
//! expression carries its literal params plus three kinds of indirection:
//! refs (`$ident`), aliases (`@name`) and holes (`{name}`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque value passed to and returned by drivers.
pub type Value = serde_json::Value;

/// Parameter bag, insertion-ordered.
pub type Params = IndexMap<String, Value>;

/// Indirection map: param name → referenced name.
pub type Indirections = IndexMap<String, String>;

// ============================================================================
// AST
// ============================================================================

/// An action/entity pair with its parameters and pending indirections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub entity: String,

    /// Literal (or already resolved) parameters
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: Params,

    /// param → identifier declared by an earlier statement
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub refs: Indirections,

    /// param → alias resolved out-of-band
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub aliases: Indirections,

    /// param → hole filled before running
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub holes: Indirections,
}

impl Expression {
    pub fn new(action: &str, entity: &str) -> Self {
        Self {
            action: action.to_string(),
            entity: entity.to_string(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_ref(mut self, key: &str, ident: &str) -> Self {
        self.refs.insert(key.to_string(), ident.to_string());
        self
    }

    pub fn with_alias(mut self, key: &str, alias: &str) -> Self {
        self.aliases.insert(key.to_string(), alias.to_string());
        self
    }

    pub fn with_hole(mut self, key: &str, hole: &str) -> Self {
        self.holes.insert(key.to_string(), hole.to_string());
        self
    }

    /// Param names that appear in more than one of params/refs/aliases/holes.
    pub fn conflicting_keys(&self) -> Vec<String> {
        let mut seen: IndexMap<&str, usize> = IndexMap::new();
        let all = self
            .params
            .keys()
            .chain(self.refs.keys())
            .chain(self.aliases.keys())
            .chain(self.holes.keys());
        for key in all {
            *seen.entry(key.as_str()).or_insert(0) += 1;
        }
        seen.into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(k, _)| k.to_string())
            .collect()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.entity)?;
        for (k, v) in &self.params {
            write!(f, " {}={}", k, value_to_string(v))?;
        }
        for (k, ident) in &self.refs {
            write!(f, " {}=${}", k, ident)?;
        }
        for (k, alias) in &self.aliases {
            write!(f, " {}=@{}", k, alias)?;
        }
        for (k, hole) in &self.holes {
            write!(f, " {}={{{}}}", k, hole)?;
        }
        Ok(())
    }
}

/// Value an identifier holds within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Binding {
    Value(Value),
    /// The declaring statement failed with this message.
    Failed(String),
}

/// Left side of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,

    /// Unset until the declaring statement runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Binding>,
}

impl Identifier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }
}

/// `left := right`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub left: Identifier,
    pub right: Expression,
}

/// The two statement shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Declaration(Declaration),
    Expression(Expression),
}

/// What happened when a statement ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl Outcome {
    pub fn succeeded(result: Value) -> Self {
        Self {
            result: Some(result),
            err: None,
        }
    }

    /// An empty message records no error.
    pub fn failed(err: impl Into<String>) -> Self {
        let err = err.into();
        Self {
            result: None,
            err: (!err.is_empty()).then_some(err),
        }
    }

    /// True iff a non-empty error was captured.
    pub fn is_err(&self) -> bool {
        self.err.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// One line of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Source text, carried verbatim from the parser
    #[serde(default)]
    pub line: String,

    pub node: Node,

    #[serde(default)]
    pub outcome: Outcome,
}

impl Statement {
    pub fn expression(expr: Expression) -> Self {
        Self {
            line: String::new(),
            node: Node::Expression(expr),
            outcome: Outcome::default(),
        }
    }

    pub fn declaration(ident: &str, expr: Expression) -> Self {
        Self {
            line: String::new(),
            node: Node::Declaration(Declaration {
                left: Identifier::new(ident),
                right: expr,
            }),
            outcome: Outcome::default(),
        }
    }

    pub fn with_line(mut self, line: &str) -> Self {
        self.line = line.to_string();
        self
    }

    /// The statement's expression, whichever node shape holds it.
    pub fn expr(&self) -> &Expression {
        match &self.node {
            Node::Declaration(decl) => &decl.right,
            Node::Expression(expr) => expr,
        }
    }

    pub fn expr_mut(&mut self) -> &mut Expression {
        match &mut self.node {
            Node::Declaration(decl) => &mut decl.right,
            Node::Expression(expr) => expr,
        }
    }

    /// Declared identifier name, if this is a declaration.
    pub fn ident(&self) -> Option<&str> {
        match &self.node {
            Node::Declaration(decl) => Some(decl.left.name.as_str()),
            Node::Expression(_) => None,
        }
    }

    /// Source text, or the rendered statement when none was recorded.
    pub fn source(&self) -> String {
        if self.line.is_empty() {
            self.to_string()
        } else {
            self.line.clone()
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Node::Declaration(decl) => write!(f, "{} := {}", decl.left.name, decl.right),
            Node::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

// ============================================================================
// Template document (stencil.yaml)
// ============================================================================

/// A template document: the already-parsed statements plus run inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable template name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Overrides keyed `entity.param`
    #[serde(default)]
    pub params: Params,

    /// Hole fills keyed by hole name
    #[serde(default)]
    pub fills: Params,

    /// Alias resolutions keyed by alias name
    #[serde(default)]
    pub aliases: Params,

    #[serde(default)]
    pub policy: Policy,

    #[serde(default)]
    pub statements: Vec<StatementEntry>,
}

/// Flat on-disk form of a statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementEntry {
    /// Declared identifier; absent for bare expressions
    #[serde(default)]
    pub ident: Option<String>,

    #[serde(default)]
    pub line: Option<String>,

    #[serde(flatten)]
    pub expr: Expression,
}

impl From<StatementEntry> for Statement {
    fn from(entry: StatementEntry) -> Self {
        let stmt = match entry.ident {
            Some(ref ident) => Statement::declaration(ident, entry.expr),
            None => Statement::expression(entry.expr),
        };
        match entry.line {
            Some(line) => stmt.with_line(&line),
            None => stmt,
        }
    }
}

/// Run policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Ask the driver not to perform side effects
    #[serde(default)]
    pub dry_run: bool,

    /// Append provenance events to the state dir
    #[serde(default = "default_true")]
    pub event_log: bool,

    /// Persist the run report to the state dir
    #[serde(default = "default_true")]
    pub save_report: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            dry_run: false,
            event_log: true,
            save_report: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    RunStarted {
        run_id: String,
        template: String,
        statements: usize,
        template_hash: String,
        stencil_version: String,
    },
    StatementExecuted {
        run_id: String,
        index: usize,
        line: String,
        params_hash: String,
        duration_seconds: f64,
    },
    StatementFailed {
        run_id: String,
        index: usize,
        line: String,
        error: String,
    },
    RunCompleted {
        run_id: String,
        succeeded: u32,
        failed: u32,
        total_seconds: f64,
    },
    RunAborted {
        run_id: String,
        index: usize,
        error: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Value helper
// ============================================================================

/// Render a value the way it would be written in a statement.
pub fn value_to_string(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
