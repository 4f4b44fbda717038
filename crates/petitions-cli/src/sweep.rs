//! # Sweep Subcommand
//!
//! Runs the scheduled batch operations once. Intended to be called from
//! cron or a job scheduler.
//!
//! ## Subcommands
//!
//! - `close` — Close open petitions past their deadline.
//! - `debated` — Mark scheduled debates whose date has arrived.
//! - `anonymize` — Scrub personal data from old terminal petitions.
//! - `dissolve` — Close early and stop petitions for an announced
//!   dissolution.
//! - `all` — Everything above, in that order.

use anyhow::Result;
use clap::{Args, Subcommand};

use petitions_core::Timestamp;
use petitions_store::{PetitionService, PetitionStore, SweepReport, DEFAULT_BATCH_SIZE};

/// Arguments for the `petitions sweep` subcommand.
#[derive(Args, Debug)]
pub struct SweepArgs {
    #[command(subcommand)]
    pub command: SweepCommand,

    /// Maximum candidates examined per sweep.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, global = true)]
    pub limit: usize,

    /// Print Prometheus counters after the reports.
    #[arg(long, global = true)]
    pub print_metrics: bool,
}

/// Sweep subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepCommand {
    /// Close open petitions whose deadline has passed.
    Close,
    /// Mark scheduled debates as held once their date arrives.
    Debated,
    /// Anonymize petitions six months after they ended.
    Anonymize,
    /// Close early and stop petitions for an announced dissolution.
    Dissolve,
    /// Run every sweep.
    All,
}

/// Execute the sweep subcommand.
pub async fn run_sweep<S: PetitionStore>(
    args: &SweepArgs,
    svc: &PetitionService<S>,
    now: Timestamp,
) -> Result<u8> {
    let limit = args.limit;
    let mut reports: Vec<SweepReport> = Vec::new();

    if matches!(args.command, SweepCommand::Close | SweepCommand::All) {
        reports.push(svc.close_petitions(now, limit).await?);
    }
    if matches!(args.command, SweepCommand::Debated | SweepCommand::All) {
        reports.push(svc.mark_petitions_as_debated(now, limit).await?);
    }
    if matches!(args.command, SweepCommand::Anonymize | SweepCommand::All) {
        reports.push(svc.anonymize_petitions(now, limit).await?);
    }
    if matches!(args.command, SweepCommand::Dissolve | SweepCommand::All) {
        if !svc.settings().dissolution_announced() {
            tracing::warn!("no dissolution announced; dissolve sweeps will do nothing");
        }
        reports.push(svc.close_petitions_early(limit).await?);
        reports.push(svc.stop_petitions_early(limit).await?);
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);

    if args.print_metrics {
        if let Some(metrics) = svc.metrics() {
            let text = metrics.gather_and_encode().map_err(anyhow::Error::msg)?;
            print!("{text}");
        }
    }

    Ok(0)
}
