//! Stencil CLI — declarative provisioning templates.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stencil",
    version,
    about = "Declarative provisioning templates — refs, holes, aliases, replayable runs"
)]
struct Cli {
    #[command(subcommand)]
    command: stencil::cli::Commands,
}

fn main() {
    let filter = EnvFilter::try_from_env("STENCIL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = stencil::cli::dispatch(cli.command) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
