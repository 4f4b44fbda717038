//! # Closure
//!
//! Deadlines and the transitions out of `open` (closing) and out of the
//! moderation queue (stopping).
//!
//! The deadline of an open petition is the end of the UTC day that falls
//! `petition_duration_months` months plus `deadline_extension` days after
//! `open_at`. Once `closed_at` is set it is the deadline.

use chrono::Duration;

use petitions_core::{SiteSettings, Timestamp};

use crate::petition::{Petition, PetitionError, PetitionState};

/// Hours a closed petition keeps accepting signatures.
pub const SIGNING_GRACE_PERIOD_HOURS: i64 = 24;

impl Petition {
    /// The instant this petition closes (or closed).
    ///
    /// `None` for a petition that was never opened.
    pub fn deadline(&self, settings: &SiteSettings) -> Option<Timestamp> {
        if let Some(closed_at) = self.closed_at {
            return Some(closed_at);
        }
        self.open_at?
            .add_months(settings.petition_duration_months)?
            .add_days(i64::from(self.deadline_extension))
            .map(|t| t.end_of_day())
    }

    /// Close an open petition once its deadline has passed.
    ///
    /// Before the deadline this is a no-op, so sweeps may call it on any
    /// open petition. `closed_at` is set to the deadline, not to `at`.
    ///
    /// # Errors
    ///
    /// [`PetitionError::InvalidTransition`] unless the petition is open.
    pub fn close(
        &mut self,
        settings: &SiteSettings,
        at: Timestamp,
    ) -> Result<PetitionState, PetitionError> {
        self.require_any(|s| *s == PetitionState::Open, PetitionState::Closed.as_str())?;
        let deadline = self
            .deadline(settings)
            .ok_or_else(|| PetitionError::Validation("open petition has no open_at".into()))?;
        if at >= deadline {
            self.closed_at = Some(deadline);
            self.do_transition(PetitionState::Closed, "deadline passed", at);
        }
        Ok(self.state)
    }

    /// Close an open petition at `at`, regardless of its deadline.
    pub fn close_early(&mut self, at: Timestamp) -> Result<PetitionState, PetitionError> {
        self.require_any(|s| *s == PetitionState::Open, PetitionState::Closed.as_str())?;
        self.closed_at = Some(at);
        self.do_transition(PetitionState::Closed, "closed early", at);
        Ok(self.state)
    }

    /// Whether the petition no longer accepts signatures at `now`.
    ///
    /// Rejected and hidden petitions are closed for signing immediately;
    /// closed petitions stay signable for a grace period after `closed_at`.
    pub fn closed_for_signing(&self, now: Timestamp) -> bool {
        if self.state.is_rejection() {
            return true;
        }
        match (self.state, self.closed_at) {
            (PetitionState::Closed, Some(closed_at)) => {
                now.since(&closed_at) > Duration::hours(SIGNING_GRACE_PERIOD_HOURS)
            }
            _ => false,
        }
    }

    /// Stop a petition that has not been moderated yet.
    ///
    /// # Errors
    ///
    /// [`PetitionError::InvalidTransition`] unless the petition is pending,
    /// validated, sponsored, flagged, or dormant.
    pub fn stop(&mut self, at: Timestamp) -> Result<PetitionState, PetitionError> {
        self.require_any(PetitionState::is_pre_moderation, PetitionState::Stopped.as_str())?;
        self.stopped_at = Some(at);
        self.do_transition(PetitionState::Stopped, "stopped", at);
        Ok(self.state)
    }

    /// Push the deadline back by one day.
    pub fn extend_deadline(&mut self, now: Timestamp) -> PetitionState {
        self.deadline_extension = self.deadline_extension.saturating_add(1);
        self.touch(now);
        self.state
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
