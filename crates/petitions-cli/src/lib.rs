//! # petitions-cli — Petitions Command-Line Interface
//!
//! Operates the petition lifecycle from the command line, against either a
//! JSON snapshot file or PostgreSQL.
//!
//! ## Subcommands
//!
//! - `sweep` — Scheduled batch operations (closing, debates, anonymizing,
//!   dissolution)
//! - `signature` — Signature validated / invalidated events
//! - `moderate` — Moderator decisions
//! - `petition` — Per-petition administration
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from business logic.
//! - Handlers delegate to `petitions-store`; no lifecycle rules here.

pub mod config;
pub mod moderate;
pub mod petition;
pub mod signature;
pub mod source;
pub mod sweep;

use anyhow::Result;
use clap::Subcommand;

use petitions_core::{SiteSettings, Timestamp};
use petitions_state::Petition;
use petitions_store::db::{self, PgStore};
use petitions_store::{LifecycleMetrics, PetitionService, PetitionStore};

use crate::moderate::{run_moderate, ModerateArgs};
use crate::petition::{run_petition, PetitionArgs};
use crate::signature::{run_signature, SignatureArgs};
use crate::source::{load_snapshot, save_snapshot, Source};
use crate::sweep::{run_sweep, SweepArgs};

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run scheduled sweeps (close, debated, anonymize, dissolve, all).
    Sweep(SweepArgs),

    /// Apply signature validated / invalidated events.
    Signature(SignatureArgs),

    /// Apply a moderator decision.
    Moderate(ModerateArgs),

    /// Administer individual petitions.
    Petition(PetitionArgs),
}

/// Run `command` against `source`. Snapshot sources are written back only
/// if the command succeeds.
pub async fn run(
    command: &Command,
    source: &Source,
    settings: SiteSettings,
    now: Timestamp,
) -> Result<u8> {
    let metrics = LifecycleMetrics::new()?;
    match source {
        Source::Snapshot(path) => {
            let store = load_snapshot(path)?;
            let svc = PetitionService::new(store, settings).with_metrics(metrics);
            let code = execute(command, &svc, now).await?;
            save_snapshot(path, svc.store())?;
            Ok(code)
        }
        Source::Database(url) => {
            let pool = db::init_pool(url).await?;
            let svc = PetitionService::new(PgStore::new(pool), settings).with_metrics(metrics);
            execute(command, &svc, now).await
        }
    }
}

/// Dispatch one command to its handler.
pub async fn execute<S: PetitionStore>(
    command: &Command,
    svc: &PetitionService<S>,
    now: Timestamp,
) -> Result<u8> {
    match command {
        Command::Sweep(args) => run_sweep(args, svc, now).await,
        Command::Signature(args) => run_signature(args, svc, now).await,
        Command::Moderate(args) => run_moderate(args, svc, now).await,
        Command::Petition(args) => run_petition(args, svc, now).await,
    }
}

pub(crate) fn print_petition(petition: &Petition) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(petition)?);
    Ok(())
}
