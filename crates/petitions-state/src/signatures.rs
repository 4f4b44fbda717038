//! # Signature Count Aggregation
//!
//! Applies validated and invalidated signatures to a petition's
//! `signature_count` and detects threshold crossings.
//!
//! ## Crossing Rules
//!
//! A threshold is crossed when the count moves from below the threshold to
//! exactly the threshold. Being above a threshold is not a crossing: a
//! petition whose count was corrected upwards past a threshold with a nil
//! timestamp fires nothing until it comes back down and up again.
//!
//! Crossing upwards sets the timestamp once. Crossing back down (from
//! `threshold` to `threshold - 1`) clears it only while the dependent
//! state is still waiting on it:
//!
//! | Threshold  | Up                          | Down clears when            |
//! |------------|-----------------------------|-----------------------------|
//! | moderation | `pending/validated → sponsored` | state is validated/sponsored |
//! | response   | `response_state → awaiting` | `response_state == awaiting`|
//! | debate     | `debate_state → awaiting`   | `debate_state == awaiting`  |

use serde::{Deserialize, Serialize};

use petitions_core::{SiteSettings, Timestamp};

use crate::petition::{DebateState, Petition, PetitionState, ResponseState};

/// Who made a signature, as reported by the signature collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// The petition creator's own signature.
    Creator,
    /// One of the sponsors gathered before moderation.
    Sponsor,
    /// Any other member of the public.
    Public,
}

impl SignatureKind {
    /// Whether validating this signature confirms the creator, moving a
    /// `pending` petition to `validated`. A sponsor can only have been
    /// invited by a confirmed creator.
    pub fn validates_creator(&self) -> bool {
        matches!(self, Self::Creator | Self::Sponsor)
    }
}

/// Whether moving from `old` to `new` passes through `threshold` upwards.
fn crossed_up(old: u32, new: u32, threshold: u32) -> bool {
    old < threshold && threshold <= new
}

impl Petition {
    /// Whether the count sits exactly on the moderation threshold and the
    /// crossing has not been recorded yet.
    pub fn at_threshold_for_moderation(&self, settings: &SiteSettings) -> bool {
        self.signature_count == settings.threshold_for_moderation
            && self.moderation_threshold_reached_at.is_none()
    }

    /// Whether the count sits exactly on the response threshold, unrecorded,
    /// and the government has not responded yet.
    pub fn at_threshold_for_response(&self, settings: &SiteSettings) -> bool {
        self.signature_count == settings.threshold_for_response
            && self.response_threshold_reached_at.is_none()
            && self.response_state != ResponseState::Responded
    }

    /// Whether the count sits exactly on the debate threshold, unrecorded,
    /// and no debate has been scheduled or decided manually.
    pub fn at_threshold_for_debate(&self, settings: &SiteSettings) -> bool {
        self.signature_count == settings.threshold_for_debate
            && self.debate_threshold_reached_at.is_none()
            && self.debate_state.is_undecided()
    }

    /// Count one validated signature.
    pub fn increment_signature_count(
        &mut self,
        kind: SignatureKind,
        settings: &SiteSettings,
        now: Timestamp,
    ) -> PetitionState {
        self.increment_signature_count_by(1, kind, settings, now)
    }

    /// Count `n` validated signatures at once.
    ///
    /// Produces the same count, state, and threshold timestamps as `n`
    /// calls to [`Petition::increment_signature_count`] at the same `now`.
    pub fn increment_signature_count_by(
        &mut self,
        n: u32,
        kind: SignatureKind,
        settings: &SiteSettings,
        now: Timestamp,
    ) -> PetitionState {
        if n == 0 {
            return self.state;
        }
        let old = self.signature_count;
        let new = old.saturating_add(n);
        self.signature_count = new;
        self.last_signed_at = Some(now);

        if self.state == PetitionState::Pending && kind.validates_creator() {
            self.do_transition(PetitionState::Validated, "creator signature validated", now);
        }

        if crossed_up(old, new, settings.threshold_for_moderation)
            && self.moderation_threshold_reached_at.is_none()
        {
            self.moderation_threshold_reached_at = Some(now);
            if matches!(self.state, PetitionState::Pending | PetitionState::Validated) {
                self.do_transition(PetitionState::Sponsored, "moderation threshold reached", now);
            }
        }

        if crossed_up(old, new, settings.threshold_for_response)
            && self.response_threshold_reached_at.is_none()
            && self.response_state != ResponseState::Responded
        {
            self.response_threshold_reached_at = Some(now);
            self.response_state = ResponseState::Awaiting;
        }

        if crossed_up(old, new, settings.threshold_for_debate)
            && self.debate_threshold_reached_at.is_none()
            && self.debate_state.is_undecided()
        {
            self.debate_threshold_reached_at = Some(now);
            self.debate_state = DebateState::Awaiting;
        }

        self.touch(now);
        self.state
    }

    /// Uncount one previously validated signature.
    ///
    /// The count never drops below 1 while the creator signature stands;
    /// at a count of 1 or less this is a no-op.
    pub fn decrement_signature_count(
        &mut self,
        settings: &SiteSettings,
        now: Timestamp,
    ) -> PetitionState {
        if self.signature_count <= 1 {
            return self.state;
        }
        self.signature_count -= 1;
        let count = self.signature_count;

        if count.checked_add(1) == Some(settings.threshold_for_moderation)
            && self.moderation_threshold_reached_at.is_some()
            && matches!(self.state, PetitionState::Validated | PetitionState::Sponsored)
        {
            self.moderation_threshold_reached_at = None;
            if self.state == PetitionState::Sponsored {
                self.do_transition(PetitionState::Validated, "below moderation threshold", now);
            }
        }

        if count.checked_add(1) == Some(settings.threshold_for_response)
            && self.response_state == ResponseState::Awaiting
        {
            self.response_threshold_reached_at = None;
            self.response_state = ResponseState::Pending;
        }

        if count.checked_add(1) == Some(settings.threshold_for_debate)
            && self.debate_state == DebateState::Awaiting
        {
            self.debate_threshold_reached_at = None;
            self.debate_state = DebateState::Pending;
        }

        self.touch(now);
        self.state
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn now() -> Timestamp {
        at("2017-04-01T12:00:00Z")
    }

    fn later() -> Timestamp {
        at("2017-04-02T12:00:00Z")
    }

    fn settings() -> SiteSettings {
        SiteSettings {
            threshold_for_moderation: 5,
            threshold_for_response: 10,
            threshold_for_debate: 100,
            ..SiteSettings::default()
        }
    }

    fn petition_with(count: u32, state: PetitionState) -> Petition {
        let mut p = Petition::new("a", "b", None, now());
        p.signature_count = count;
        p.state = state;
        p
    }

    // ── Increment ────────────────────────────────────────────────────

    #[test]
    fn test_creator_signature_validates_pending_petition() {
        let mut p = petition_with(0, PetitionState::Pending);
        let state = p.increment_signature_count(SignatureKind::Creator, &settings(), now());
        assert_eq!(state, PetitionState::Validated);
        assert_eq!(p.signature_count, 1);
        assert_eq!(p.last_signed_at, Some(now()));
        assert_eq!(p.updated_at, now());
    }

    #[test]
    fn test_public_signature_does_not_validate_pending_petition() {
        let mut p = petition_with(0, PetitionState::Pending);
        p.increment_signature_count(SignatureKind::Public, &settings(), now());
        assert_eq!(p.state, PetitionState::Pending);
        assert_eq!(p.signature_count, 1);
    }

    #[test]
    fn test_sponsor_reaching_threshold_sponsors_petition() {
        let mut p = petition_with(4, PetitionState::Validated);
        let state = p.increment_signature_count(SignatureKind::Sponsor, &settings(), now());
        assert_eq!(state, PetitionState::Sponsored);
        assert_eq!(p.moderation_threshold_reached_at, Some(now()));
    }

    #[test]
    fn test_pending_jumps_to_sponsored_on_threshold() {
        let mut p = petition_with(4, PetitionState::Pending);
        p.increment_signature_count(SignatureKind::Sponsor, &settings(), now());
        assert_eq!(p.state, PetitionState::Sponsored);
        assert_eq!(p.transitions.len(), 2);
    }

    #[test]
    fn test_flagged_petition_is_not_promoted() {
        let mut p = petition_with(4, PetitionState::Flagged);
        p.increment_signature_count(SignatureKind::Sponsor, &settings(), now());
        assert_eq!(p.state, PetitionState::Flagged);
        assert_eq!(p.moderation_threshold_reached_at, Some(now()));
    }

    #[test]
    fn test_at_threshold_for_moderation_uses_equality() {
        let s = settings();
        let mut p = petition_with(5, PetitionState::Validated);
        assert!(p.at_threshold_for_moderation(&s));
        p.signature_count = 6;
        assert!(!p.at_threshold_for_moderation(&s));
        p.signature_count = 5;
        p.moderation_threshold_reached_at = Some(now());
        assert!(!p.at_threshold_for_moderation(&s));
    }

    #[test]
    fn test_above_threshold_with_nil_timestamp_fires_nothing() {
        let mut p = petition_with(7, PetitionState::Validated);
        p.increment_signature_count(SignatureKind::Sponsor, &settings(), now());
        assert_eq!(p.state, PetitionState::Validated);
        assert!(p.moderation_threshold_reached_at.is_none());
    }

    #[test]
    fn test_debate_threshold_set_once() {
        let mut p = petition_with(99, PetitionState::Open);
        p.increment_signature_count(SignatureKind::Public, &settings(), now());
        assert_eq!(p.debate_threshold_reached_at, Some(now()));
        assert_eq!(p.debate_state, DebateState::Awaiting);

        p.increment_signature_count(SignatureKind::Public, &settings(), later());
        assert_eq!(p.debate_threshold_reached_at, Some(now()));
        assert_eq!(p.signature_count, 101);
    }

    #[test]
    fn test_response_threshold_moves_response_state() {
        let mut p = petition_with(9, PetitionState::Open);
        p.increment_signature_count(SignatureKind::Public, &settings(), now());
        assert_eq!(p.response_threshold_reached_at, Some(now()));
        assert_eq!(p.response_state, ResponseState::Awaiting);
    }

    #[test]
    fn test_scheduled_debate_not_overridden_by_threshold() {
        let mut p = petition_with(99, PetitionState::Open);
        p.debate_state = DebateState::Scheduled;
        p.increment_signature_count(SignatureKind::Public, &settings(), now());
        assert_eq!(p.debate_state, DebateState::Scheduled);
        assert!(p.debate_threshold_reached_at.is_none());
    }

    #[test]
    fn test_batch_crossing_matches_single_steps() {
        let s = settings();
        let mut stepped = petition_with(1, PetitionState::Validated);
        let mut batched = stepped.clone();
        for _ in 0..12 {
            stepped.increment_signature_count(SignatureKind::Sponsor, &s, now());
        }
        batched.increment_signature_count_by(12, SignatureKind::Sponsor, &s, now());
        assert_eq!(stepped.signature_count, batched.signature_count);
        assert_eq!(stepped.state, batched.state);
        assert_eq!(
            stepped.moderation_threshold_reached_at,
            batched.moderation_threshold_reached_at
        );
        assert_eq!(stepped.response_state, batched.response_state);
    }

    // ── Decrement ────────────────────────────────────────────────────

    #[test]
    fn test_decrement_floors_at_one() {
        let mut p = petition_with(1, PetitionState::Validated);
        p.decrement_signature_count(&settings(), later());
        assert_eq!(p.signature_count, 1);
        assert_eq!(p.updated_at, now());
    }

    #[test]
    fn test_decrement_below_moderation_threshold_resets() {
        let mut p = petition_with(4, PetitionState::Validated);
        p.increment_signature_count(SignatureKind::Sponsor, &settings(), now());
        assert_eq!(p.state, PetitionState::Sponsored);

        let state = p.decrement_signature_count(&settings(), later());
        assert_eq!(state, PetitionState::Validated);
        assert_eq!(p.signature_count, 4);
        assert!(p.moderation_threshold_reached_at.is_none());
    }

    #[test]
    fn test_decrement_after_publication_keeps_moderation_timestamp() {
        let mut p = petition_with(5, PetitionState::Open);
        p.moderation_threshold_reached_at = Some(now());
        p.decrement_signature_count(&settings(), later());
        assert_eq!(p.moderation_threshold_reached_at, Some(now()));
        assert_eq!(p.state, PetitionState::Open);
    }

    #[test]
    fn test_decrement_below_response_threshold_while_awaiting() {
        let mut p = petition_with(9, PetitionState::Open);
        p.increment_signature_count(SignatureKind::Public, &settings(), now());
        p.decrement_signature_count(&settings(), later());
        assert!(p.response_threshold_reached_at.is_none());
        assert_eq!(p.response_state, ResponseState::Pending);
    }

    #[test]
    fn test_decrement_after_response_keeps_timestamp() {
        let mut p = petition_with(10, PetitionState::Open);
        p.response_threshold_reached_at = Some(now());
        p.response_state = ResponseState::Responded;
        p.decrement_signature_count(&settings(), later());
        assert_eq!(p.response_threshold_reached_at, Some(now()));
        assert_eq!(p.response_state, ResponseState::Responded);
    }

    #[test]
    fn test_decrement_with_scheduled_debate_keeps_timestamp() {
        let mut p = petition_with(100, PetitionState::Open);
        p.debate_threshold_reached_at = Some(now());
        p.debate_state = DebateState::Scheduled;
        p.decrement_signature_count(&settings(), later());
        assert_eq!(p.debate_threshold_reached_at, Some(now()));
        assert_eq!(p.debate_state, DebateState::Scheduled);
    }

    #[test]
    fn test_decrement_away_from_boundary_changes_nothing_else() {
        let mut p = petition_with(50, PetitionState::Open);
        p.moderation_threshold_reached_at = Some(now());
        p.response_threshold_reached_at = Some(now());
        p.response_state = ResponseState::Awaiting;
        p.decrement_signature_count(&settings(), later());
        assert_eq!(p.signature_count, 49);
        assert_eq!(p.response_state, ResponseState::Awaiting);
        assert_eq!(p.updated_at, later());
    }
}
