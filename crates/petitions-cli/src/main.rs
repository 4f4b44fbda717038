//! # petitions CLI entry point
//!
//! Parses command-line arguments, loads site settings, picks the data
//! source, and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use petitions_cli::config::load_settings;
use petitions_cli::source::Source;
use petitions_cli::Command;
use petitions_core::Timestamp;

/// Petitions lifecycle CLI.
///
/// Counts signatures, applies moderator decisions, and runs the scheduled
/// sweeps that close, debate, anonymize, and dissolve petitions.
#[derive(Parser, Debug)]
#[command(name = "petitions", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to the site settings YAML file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Operate on a JSON snapshot file instead of a database. Takes
    /// precedence over `--database-url`.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// PostgreSQL connection URL.
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Evaluate as of this instant (RFC 3339, UTC) instead of the clock.
    #[arg(long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let settings = load_settings(cli.config.as_deref())?;
    let now = match cli.now.as_deref() {
        Some(s) => Timestamp::parse(s)?,
        None => Timestamp::now(),
    };
    let source = Source::resolve(cli.snapshot, cli.database_url)?;
    tracing::debug!(?source, %now, "resolved invocation");
    petitions_cli::run(&cli.command, &source, settings, now).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
