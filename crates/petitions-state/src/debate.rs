//! # Debate and Government Response
//!
//! The `debate_state` and `response_state` sub-machines of published
//! petitions. Signature thresholds move them to `awaiting` (see
//! `signatures.rs`); the operations here are driven by the debate date and
//! by recorded outcomes, independently of the signature count.
//!
//! These operations apply only to `open` and `closed` petitions.

use chrono::NaiveDate;

use petitions_core::Timestamp;

use crate::petition::{DebateState, Petition, PetitionError, ResponseState};

impl Petition {
    /// Set or clear the scheduled debate date and recompute `debate_state`.
    ///
    /// - cleared, threshold reached → `awaiting`
    /// - cleared, threshold not reached → `pending`
    /// - after `today` → `scheduled`
    /// - on or before `today` → `debated`
    pub fn schedule_debate(
        &mut self,
        date: Option<NaiveDate>,
        today: NaiveDate,
        now: Timestamp,
    ) -> Result<DebateState, PetitionError> {
        self.require_any(|s| s.is_published(), "debate scheduled")?;
        self.scheduled_debate_date = date;
        self.debate_state = match date {
            None if self.debate_threshold_reached_at.is_some() => DebateState::Awaiting,
            None => DebateState::Pending,
            Some(date) if date > today => DebateState::Scheduled,
            Some(_) => DebateState::Debated,
        };
        self.touch(now);
        Ok(self.debate_state)
    }

    /// Mark a scheduled debate as held once its date has arrived.
    ///
    /// A no-op for anything other than a published, scheduled petition
    /// whose date is on or before `today`.
    pub fn mark_debated(&mut self, today: NaiveDate, now: Timestamp) -> DebateState {
        let due = self.state.is_published()
            && self.debate_state == DebateState::Scheduled
            && self.scheduled_debate_date.is_some_and(|date| date <= today);
        if due {
            self.debate_state = DebateState::Debated;
            self.touch(now);
        }
        self.debate_state
    }

    /// Record whether parliament debated the petition.
    pub fn record_debate_outcome(
        &mut self,
        debated: bool,
        now: Timestamp,
    ) -> Result<DebateState, PetitionError> {
        self.require_any(|s| s.is_published(), "debate outcome")?;
        self.debate_state = if debated {
            DebateState::Debated
        } else {
            DebateState::NotDebated
        };
        self.debate_outcome_at = Some(now);
        self.touch(now);
        Ok(self.debate_state)
    }

    /// Record the government response. The first response time is kept.
    pub fn record_government_response(
        &mut self,
        now: Timestamp,
    ) -> Result<ResponseState, PetitionError> {
        self.require_any(|s| s.is_published(), "government response")?;
        self.response_state = ResponseState::Responded;
        if self.government_response_at.is_none() {
            self.government_response_at = Some(now);
        }
        self.touch(now);
        Ok(self.response_state)
    }
}
