//! # Scheduled Sweeps
//!
//! Batch operations run by a scheduler: closing petitions at their
//! deadline, marking scheduled debates as held, anonymizing old petitions,
//! and closing or stopping petitions for a dissolution.
//!
//! Each run fetches one bounded candidate batch and applies the lifecycle
//! operation to every candidate through its own atomic update. Candidates
//! the operation leaves unchanged are not written. A candidate
//! that disappeared or moved to a state the operation no longer accepts is
//! logged and skipped; any other error aborts the run. Running a sweep
//! twice changes nothing the second time.

use serde::Serialize;

use petitions_core::{PetitionId, Timestamp};
use petitions_state::{DissolutionOutcome, Petition};

use crate::error::StoreError;
use crate::service::PetitionService;
use crate::store::PetitionStore;

/// Default candidate batch size per sweep run.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// The scheduled sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sweep {
    Close,
    MarkDebated,
    Anonymize,
    CloseEarly,
    StopEarly,
}

impl Sweep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::MarkDebated => "mark_debated",
            Self::Anonymize => "anonymize",
            Self::CloseEarly => "close_early",
            Self::StopEarly => "stop_early",
        }
    }
}

impl std::fmt::Display for Sweep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sweep: Sweep,
    /// Candidates fetched.
    pub examined: usize,
    /// Candidates the operation changed.
    pub applied: usize,
    /// Candidates skipped because they changed underneath the sweep.
    pub skipped: usize,
}

impl SweepReport {
    fn new(sweep: Sweep, examined: usize) -> Self {
        Self {
            sweep,
            examined,
            applied: 0,
            skipped: 0,
        }
    }

    /// Count one candidate's result; propagate errors that are not about
    /// the candidate itself.
    fn tally(
        &mut self,
        id: PetitionId,
        result: Result<(Petition, bool), StoreError>,
    ) -> Result<(), StoreError> {
        match result {
            Ok((_, true)) => {
                self.applied += 1;
                tracing::info!(sweep = %self.sweep, petition_id = %id, "sweep applied");
            }
            Ok((_, false)) => {
                tracing::debug!(sweep = %self.sweep, petition_id = %id, "sweep no-op");
            }
            Err(e) if e.is_skippable() => {
                self.skipped += 1;
                tracing::warn!(sweep = %self.sweep, petition_id = %id, error = %e, "sweep skipped petition");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

impl<S: PetitionStore> PetitionService<S> {
    fn finish(&self, report: SweepReport) -> SweepReport {
        if let Some(metrics) = &self.metrics {
            metrics.record_applied(report.sweep, report.applied as u64);
            metrics.record_skipped(report.sweep, report.skipped as u64);
        }
        tracing::info!(
            sweep = %report.sweep,
            examined = report.examined,
            applied = report.applied,
            skipped = report.skipped,
            "sweep finished"
        );
        report
    }

    /// Close open petitions whose deadline has passed at `now`.
    pub async fn close_petitions(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<SweepReport, StoreError> {
        let settings = &self.settings;
        let ids = self
            .store
            .petitions_in_need_of_closing(settings, now, limit)
            .await?;
        let mut report = SweepReport::new(Sweep::Close, ids.len());
        for id in ids {
            let result = self
                .store
                .update(id, |p| {
                    let before = p.state;
                    p.close(settings, now).map(|state| state != before)
                })
                .await;
            report.tally(id, result)?;
        }
        Ok(self.finish(report))
    }

    /// Mark scheduled debates whose date has arrived as debated.
    pub async fn mark_petitions_as_debated(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<SweepReport, StoreError> {
        let today = now.date();
        let ids = self
            .store
            .petitions_in_need_of_marking_as_debated(today, limit)
            .await?;
        let mut report = SweepReport::new(Sweep::MarkDebated, ids.len());
        for id in ids {
            let result = self
                .store
                .update(id, |p| {
                    let before = p.debate_state;
                    Ok(p.mark_debated(today, now) != before)
                })
                .await;
            report.tally(id, result)?;
        }
        Ok(self.finish(report))
    }

    /// Anonymize petitions that reached a terminal state long enough ago,
    /// then scrub their signatures.
    pub async fn anonymize_petitions(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<SweepReport, StoreError> {
        let Some(cutoff) = Petition::anonymization_cutoff(now) else {
            return Ok(self.finish(SweepReport::new(Sweep::Anonymize, 0)));
        };
        let ids = self
            .store
            .petitions_in_need_of_anonymizing(cutoff, limit)
            .await?;
        let mut report = SweepReport::new(Sweep::Anonymize, ids.len());
        for id in ids {
            let result = self.store.anonymize(id, now).await.map(|(p, scrubbed)| {
                if let Some(signatures) = scrubbed {
                    tracing::debug!(petition_id = %id, signatures, "signatures anonymized");
                }
                (p, scrubbed.is_some())
            });
            report.tally(id, result)?;
        }
        Ok(self.finish(report))
    }

    /// Close open petitions that would outlive an announced dissolution.
    /// Does nothing unless a dissolution has been announced.
    pub async fn close_petitions_early(&self, limit: usize) -> Result<SweepReport, StoreError> {
        let settings = &self.settings;
        let Some(dissolution) = settings.announced_dissolution() else {
            tracing::debug!("no announced dissolution; nothing to close early");
            return Ok(self.finish(SweepReport::new(Sweep::CloseEarly, 0)));
        };
        let ids = self
            .store
            .petitions_closing_after(settings, dissolution.at, limit)
            .await?;
        let mut report = SweepReport::new(Sweep::CloseEarly, ids.len());
        for id in ids {
            let result = self
                .store
                .update(id, |p| {
                    p.close_early_for_dissolution(settings)
                        .map(|outcome| outcome == DissolutionOutcome::ClosedEarly)
                })
                .await;
            report.tally(id, result)?;
        }
        Ok(self.finish(report))
    }

    /// Stop petitions created before an announced dissolution that have not
    /// been moderated. Does nothing unless a dissolution has been announced.
    pub async fn stop_petitions_early(&self, limit: usize) -> Result<SweepReport, StoreError> {
        let settings = &self.settings;
        let Some(dissolution) = settings.announced_dissolution() else {
            tracing::debug!("no announced dissolution; nothing to stop");
            return Ok(self.finish(SweepReport::new(Sweep::StopEarly, 0)));
        };
        let ids = self
            .store
            .petitions_awaiting_moderation(dissolution.at, limit)
            .await?;
        let mut report = SweepReport::new(Sweep::StopEarly, ids.len());
        for id in ids {
            let result = self
                .store
                .update(id, |p| {
                    p.stop_early_for_dissolution(settings)
                        .map(|outcome| outcome == DissolutionOutcome::Stopped)
                })
                .await;
            report.tally(id, result)?;
        }
        Ok(self.finish(report))
    }
}
