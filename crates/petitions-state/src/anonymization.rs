//! # Anonymization
//!
//! Petitions are anonymized six months after they reach a terminal state:
//! the creator's contact details are scrubbed while the counts, state, and
//! milestones stay intact. `do_not_anonymize` exempts a petition entirely.
//!
//! The terminal reference time depends on the state:
//!
//! | State              | Reference     |
//! |--------------------|---------------|
//! | `closed`           | `closed_at`   |
//! | `rejected`/`hidden`| `rejected_at` |
//! | `stopped`          | `stopped_at`  |
//! | `removed`          | `removed_at`  |

use petitions_core::Timestamp;

use crate::petition::{Petition, PetitionError, PetitionState};

/// Months after a terminal state before a petition is anonymized.
pub const ANONYMIZE_AFTER_MONTHS: u32 = 6;

impl Petition {
    /// When this petition reached its terminal state, if it has.
    pub fn terminal_at(&self) -> Option<Timestamp> {
        match self.state {
            PetitionState::Closed => self.closed_at,
            PetitionState::Rejected | PetitionState::Hidden => self.rejected_at,
            PetitionState::Stopped => self.stopped_at,
            PetitionState::Removed => self.removed_at,
            _ => None,
        }
    }

    /// The latest terminal time that is old enough to anonymize at `now`.
    pub fn anonymization_cutoff(now: Timestamp) -> Option<Timestamp> {
        now.sub_months(ANONYMIZE_AFTER_MONTHS)
    }

    /// Whether the petition should be anonymized at `now`.
    pub fn anonymization_due(&self, now: Timestamp) -> bool {
        if self.do_not_anonymize || self.anonymized_at.is_some() {
            return false;
        }
        match (self.terminal_at(), Self::anonymization_cutoff(now)) {
            (Some(terminal_at), Some(cutoff)) => terminal_at <= cutoff,
            _ => false,
        }
    }

    /// Scrub the creator's personal details.
    ///
    /// Returns `Ok(false)` if the petition was already anonymized.
    ///
    /// # Errors
    ///
    /// [`PetitionError::InvalidTransition`] if anonymization is not due.
    pub fn anonymize(&mut self, now: Timestamp) -> Result<bool, PetitionError> {
        if self.anonymized_at.is_some() {
            return Ok(false);
        }
        if !self.anonymization_due(now) {
            return Err(self.invalid("anonymized"));
        }
        self.creator = None;
        self.locked_by = None;
        self.locked_at = None;
        self.anonymized_at = Some(now);
        self.touch(now);
        Ok(true)
    }
}
