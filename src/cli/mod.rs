//! ST-017: CLI subcommands — init, validate, aliases, run, history.

use crate::core::runner::Runner;
use crate::core::types::{self, Params, Value};
use crate::core::{parser, report};
use crate::driver::echo::EchoDriver;
use crate::driver::Driver;
use anyhow::{bail, Context};
use clap::Subcommand;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new stencil project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate a template document without running it
    Validate {
        /// Path to stencil.yaml
        #[arg(short, long, default_value = "stencil.yaml")]
        file: PathBuf,
    },

    /// List aliases the template needs resolved
    Aliases {
        /// Path to stencil.yaml
        #[arg(short, long, default_value = "stencil.yaml")]
        file: PathBuf,
    },

    /// Resolve and run a template against the echo driver
    Run {
        /// Path to stencil.yaml
        #[arg(short, long, default_value = "stencil.yaml")]
        file: PathBuf,

        /// Override a param on every statement of an entity (entity.param=value)
        #[arg(long = "set", value_name = "ENTITY.PARAM=VALUE")]
        set: Vec<String>,

        /// Fill a hole (hole=value)
        #[arg(long = "fill", value_name = "HOLE=VALUE")]
        fill: Vec<String>,

        /// Resolve an alias (alias=value)
        #[arg(long = "alias", value_name = "ALIAS=VALUE")]
        alias: Vec<String>,

        /// Prompt on stdin for holes left unfilled
        #[arg(short, long)]
        interactive: bool,

        /// Ask the driver not to perform side effects
        #[arg(long)]
        dry_run: bool,

        /// Print driver diagnostics to stderr
        #[arg(short, long)]
        verbose: bool,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Do not append provenance events
        #[arg(long)]
        no_event_log: bool,
    },

    /// Show saved run reports
    History {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Show one run in full
        #[arg(short, long)]
        run: Option<String>,
    },
}

/// Options for `stencil run`.
pub struct RunOptions<'a> {
    pub file: &'a Path,
    pub set: &'a [String],
    pub fill: &'a [String],
    pub alias: &'a [String],
    pub interactive: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub state_dir: &'a Path,
    pub no_event_log: bool,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Aliases { file } => cmd_aliases(&file),
        Commands::Run {
            file,
            set,
            fill,
            alias,
            interactive,
            dry_run,
            verbose,
            state_dir,
            no_event_log,
        } => {
            let opts = RunOptions {
                file: &file,
                set: &set,
                fill: &fill,
                alias: &alias,
                interactive,
                dry_run,
                verbose,
                state_dir: &state_dir,
                no_event_log,
            };
            let stdin = std::io::stdin();
            cmd_run(&opts, &mut stdin.lock()).map(|_| ())
        }
        Commands::History { state_dir, run } => cmd_history(&state_dir, run.as_deref()),
    }
}

fn cmd_init(path: &Path) -> anyhow::Result<()> {
    let doc_path = path.join("stencil.yaml");
    if doc_path.exists() {
        bail!("{} already exists", doc_path.display());
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("cannot create {}", state_dir.display()))?;

    let template = r#"version: "1.0"
name: my-infrastructure
description: "Managed by stencil"

# entity.param overrides applied to every matching statement
params: {}

# hole fills
fills: {}

# alias resolutions
aliases: {}

policy:
  dry_run: false
  event_log: true
  save_report: true

statements:
  - ident: vpc
    line: "vpc := create vpc cidr=10.0.0.0/16"
    action: create
    entity: vpc
    params: { cidr: 10.0.0.0/16 }
  - line: "create subnet vpc=$vpc cidr={subnet.cidr}"
    action: create
    entity: subnet
    refs: { vpc: vpc }
    holes: { cidr: subnet.cidr }
"#;
    std::fs::write(&doc_path, template)
        .with_context(|| format!("cannot write {}", doc_path.display()))?;

    println!("Initialized stencil project at {}", path.display());
    println!("  Created: {}", doc_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

/// Parse and validate a document, printing every validation error.
fn parse_and_validate(file: &Path) -> anyhow::Result<types::Document> {
    let doc = parser::parse_document_file(file)?;
    let errors = parser::validate_document(&doc);
    if errors.is_empty() {
        return Ok(doc);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    bail!("{} validation error(s)", errors.len())
}

fn cmd_validate(file: &Path) -> anyhow::Result<()> {
    let doc = parse_and_validate(file)?;
    let name = doc.name.clone();
    let templ = doc.into_template();
    println!(
        "OK: {} ({} statements, {} holes, {} aliases)",
        name,
        templ.statements.len(),
        templ.pending_holes().len(),
        templ.collect_aliases().len()
    );
    Ok(())
}

fn cmd_aliases(file: &Path) -> anyhow::Result<()> {
    let templ = parse_and_validate(file)?.into_template();
    let aliases = templ.collect_aliases();
    if aliases.is_empty() {
        println!("No aliases.");
    }
    for (param, alias) in &aliases {
        println!("  {} = @{}", param, alias);
    }
    Ok(())
}

/// Parse `key=value`; the value is read as a YAML scalar (`10` is a number).
pub fn parse_kv(arg: &str) -> anyhow::Result<(String, Value)> {
    let Some((key, raw)) = arg.split_once('=') else {
        bail!("expected key=value, got '{}'", arg);
    };
    if key.is_empty() {
        bail!("empty key in '{}'", arg);
    }
    Ok((key.to_string(), parse_scalar(raw)))
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    match serde_yaml_ng::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::String(_))) => v,
        _ => Value::String(raw.to_string()),
    }
}

/// Document-level entries first, then command-line entries on top.
fn layered(base: &Params, args: &[String]) -> anyhow::Result<Params> {
    let mut out = base.clone();
    for arg in args {
        let (k, v) = parse_kv(arg)?;
        out.insert(k, v);
    }
    Ok(out)
}

/// Ask for one hole on `input`, echoing the question to stdout.
fn ask_line(input: &mut dyn BufRead, question: &str) -> anyhow::Result<Value> {
    print!("{}? ", question);
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let n = input
        .read_line(&mut line)
        .with_context(|| format!("cannot read answer for hole {}", question))?;
    if n == 0 {
        bail!("no answer for hole {}: end of input", question);
    }
    Ok(parse_scalar(line.trim()))
}

fn cmd_run(opts: &RunOptions, input: &mut dyn BufRead) -> anyhow::Result<report::RunReport> {
    let doc = parse_and_validate(opts.file)?;
    let overrides = layered(&doc.params, opts.set)?;
    let fills = layered(&doc.fills, opts.fill)?;
    let alias_values = layered(&doc.aliases, opts.alias)?;
    let policy = doc.policy.clone();

    let mut templ = doc.into_template();
    templ.merge_params(&overrides);
    templ.resolve_aliases(&alias_values)?;

    let filled = templ.resolve_holes(&fills);
    if opts.interactive {
        let mut failure = None;
        templ.interactive_resolve(|question| {
            if failure.is_some() {
                return Value::Null;
            }
            ask_line(input, question).unwrap_or_else(|e| {
                failure = Some(e);
                Value::Null
            })
        });
        if let Some(e) = failure {
            return Err(e);
        }
    } else {
        filled?;
    }

    let mut driver = EchoDriver::new();
    driver.set_dry_run(policy.dry_run || opts.dry_run);
    if opts.verbose {
        driver.set_sink(Box::new(std::io::stderr()));
    }

    let mut runner = Runner::new(&driver);
    if policy.event_log && !opts.no_event_log {
        runner = runner.with_event_log(opts.state_dir);
    }

    let (run_report, aborted) = match runner.run(&templ) {
        Ok(r) => (r, None),
        Err(failure) => (*failure.report, Some(failure.error)),
    };

    print_report(&run_report);

    if policy.save_report {
        let path = report::save_report(opts.state_dir, &run_report)?;
        println!("  Saved: {}", path.display());
    }

    if let Some(error) = aborted {
        bail!(error);
    }
    if run_report.has_errors() {
        bail!("{} statement(s) failed", run_report.failed().len());
    }
    Ok(run_report)
}

/// Display a report to stdout.
fn print_report(r: &report::RunReport) {
    let name = if r.template.is_empty() { "-" } else { r.template.as_str() };
    println!("Run {} ({}, {} statements)", r.id, name, r.statements.len());
    for stmt in &r.statements {
        match (&stmt.outcome.err, &stmt.outcome.result) {
            (Some(err), _) => println!("  FAIL {}: {}", stmt.source(), err),
            (None, Some(result)) => println!("  ok   {} -> {}", stmt.source(), result),
            (None, None) => println!("  ok   {}", stmt.source()),
        }
    }
    println!();
    if r.has_errors() {
        println!(
            "Run completed with errors: {} succeeded, {} FAILED",
            r.succeeded_count(),
            r.failed().len()
        );
    } else {
        println!("Run complete: {} succeeded.", r.succeeded_count());
    }
}

fn cmd_history(state_dir: &Path, run: Option<&str>) -> anyhow::Result<()> {
    if let Some(id) = run {
        let id = ulid::Ulid::from_string(id).with_context(|| format!("invalid run id '{}'", id))?;
        match report::load_report(state_dir, &id)? {
            Some(r) => print_report(&r),
            None => bail!("no report for run {}", id),
        }
        return Ok(());
    }

    let ids = report::list_reports(state_dir)?;
    if ids.is_empty() {
        println!("No runs recorded. Run `stencil run` first.");
        return Ok(());
    }
    for id in ids {
        if let Some(r) = report::load_report(state_dir, &id)? {
            let status = if r.has_errors() { "FAILED" } else { "OK" };
            println!(
                "{}  {}  {}  {} statements",
                r.id,
                r.started_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                status,
                r.statements.len()
            );
        }
    }
    Ok(())
}
