//! # Dissolution
//!
//! When a dissolution of parliament is announced, every open petition whose
//! natural deadline falls after the dissolution closes early at the
//! dissolution instant, and every petition still waiting for moderation is
//! stopped at that instant.
//!
//! Only petitions that existed at the dissolution instant are affected: a
//! petition opened or created after it is left alone, so no closure or stop
//! is ever dated before the petition itself.
//!
//! A dissolution that is only scheduled, not announced, changes nothing.
//! Both operations are idempotent: a petition already closed or stopped is
//! reported as [`DissolutionOutcome::Unaffected`].

use serde::{Deserialize, Serialize};

use petitions_core::{Dissolution, SiteSettings};

use crate::petition::{Petition, PetitionError, PetitionState};

/// What a dissolution did to one petition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DissolutionOutcome {
    ClosedEarly,
    Stopped,
    Unaffected,
}

impl Petition {
    /// Whether this open petition will be closed early by the announced
    /// dissolution, i.e. it opened before the dissolution and its natural
    /// deadline falls after it.
    pub fn closing_early_for_dissolution(&self, settings: &SiteSettings) -> bool {
        let Some(dissolution) = settings.announced_dissolution() else {
            return false;
        };
        self.state == PetitionState::Open
            && self.open_at.is_some_and(|open_at| open_at <= dissolution.at)
            && self
                .deadline(settings)
                .is_some_and(|deadline| deadline > dissolution.at)
    }

    /// Close this petition early at the dissolution instant if it is open
    /// and would otherwise outlive parliament.
    pub fn close_early_for_dissolution(
        &mut self,
        settings: &SiteSettings,
    ) -> Result<DissolutionOutcome, PetitionError> {
        let Some(Dissolution { at, .. }) = settings.announced_dissolution() else {
            return Ok(DissolutionOutcome::Unaffected);
        };
        if !self.closing_early_for_dissolution(settings) {
            return Ok(DissolutionOutcome::Unaffected);
        }
        self.close_early(at)?;
        Ok(DissolutionOutcome::ClosedEarly)
    }

    /// Stop this petition at the dissolution instant if it existed by then
    /// and has not been moderated yet.
    pub fn stop_early_for_dissolution(
        &mut self,
        settings: &SiteSettings,
    ) -> Result<DissolutionOutcome, PetitionError> {
        let Some(Dissolution { at, .. }) = settings.announced_dissolution() else {
            return Ok(DissolutionOutcome::Unaffected);
        };
        if !self.state.is_pre_moderation() || self.created_at > at {
            return Ok(DissolutionOutcome::Unaffected);
        }
        self.stop(at)?;
        Ok(DissolutionOutcome::Stopped)
    }
}
