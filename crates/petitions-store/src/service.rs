//! # Petition Service
//!
//! One async method per lifecycle operation. Each method is exactly one
//! [`PetitionStore::update`], so every operation is atomic against
//! concurrent signature traffic, moderators, and sweeps.

use chrono::NaiveDate;

use petitions_core::{ModeratorId, PetitionId, SiteSettings, Timestamp};
use petitions_state::{
    CreatorContact, DebateState, ModerationParams, Petition, PetitionState, RejectionCode,
    ResponseState, SignatureKind,
};

use crate::error::StoreError;
use crate::metrics::LifecycleMetrics;
use crate::store::PetitionStore;

/// Lifecycle operations over a [`PetitionStore`].
#[derive(Clone)]
pub struct PetitionService<S> {
    pub(crate) store: S,
    pub(crate) settings: SiteSettings,
    pub(crate) metrics: Option<LifecycleMetrics>,
}

impl<S: PetitionStore> PetitionService<S> {
    pub fn new(store: S, settings: SiteSettings) -> Self {
        Self {
            store,
            settings,
            metrics: None,
        }
    }

    /// Record sweep counters in `metrics`.
    pub fn with_metrics(mut self, metrics: LifecycleMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    pub fn metrics(&self) -> Option<&LifecycleMetrics> {
        self.metrics.as_ref()
    }

    /// Create and store a new pending petition.
    pub async fn create(
        &self,
        action: impl Into<String>,
        background: impl Into<String>,
        creator: Option<CreatorContact>,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let petition = Petition::new(action, background, creator, now);
        self.store.insert(&petition).await?;
        tracing::info!(petition_id = %petition.id, "petition created");
        Ok(petition)
    }

    pub async fn get(&self, id: PetitionId) -> Result<Petition, StoreError> {
        self.store.get(id).await?.ok_or(StoreError::NotFound(id))
    }

    // ── Signatures ───────────────────────────────────────────────────

    /// Count one newly validated signature.
    pub async fn signature_validated(
        &self,
        id: PetitionId,
        kind: SignatureKind,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        self.signatures_validated(id, 1, kind, now).await
    }

    /// Count `count` newly validated signatures of the same kind in one
    /// write.
    pub async fn signatures_validated(
        &self,
        id: PetitionId,
        count: u32,
        kind: SignatureKind,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let settings = &self.settings;
        let (petition, before) = self
            .store
            .update(id, |p| {
                let before = p.state;
                p.increment_signature_count_by(count, kind, settings, now);
                Ok(before)
            })
            .await?;
        if petition.state != before {
            tracing::info!(
                petition_id = %id,
                from = %before,
                to = %petition.state,
                signature_count = petition.signature_count,
                "signature threshold moved petition"
            );
        }
        Ok(petition)
    }

    /// Uncount one signature that turned out to be invalid.
    pub async fn signature_invalidated(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let settings = &self.settings;
        let (petition, _) = self
            .store
            .update(id, |p| {
                p.decrement_signature_count(settings, now);
                Ok(())
            })
            .await?;
        tracing::debug!(
            petition_id = %id,
            signature_count = petition.signature_count,
            "signature invalidated"
        );
        Ok(petition)
    }

    // ── Moderation ───────────────────────────────────────────────────

    /// Apply a moderator decision.
    pub async fn moderate(
        &self,
        id: PetitionId,
        params: &ModerationParams,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let (petition, state) = self.store.update(id, |p| p.moderate(params, now)).await?;
        tracing::info!(petition_id = %id, state = %state, "petition moderated");
        Ok(petition)
    }

    /// Reject a petition that has not been published.
    pub async fn reject(
        &self,
        id: PetitionId,
        code: RejectionCode,
        details: Option<String>,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let (petition, state) = self
            .store
            .update(id, |p| p.reject(code, details, now))
            .await?;
        tracing::info!(petition_id = %id, code = code.as_str(), state = %state, "petition rejected");
        Ok(petition)
    }

    // ── Closure ──────────────────────────────────────────────────────

    /// Close an open petition if its deadline has passed at `now`.
    pub async fn close(&self, id: PetitionId, now: Timestamp) -> Result<Petition, StoreError> {
        let settings = &self.settings;
        let (petition, state) = self.store.update(id, |p| p.close(settings, now)).await?;
        if state == PetitionState::Closed {
            tracing::info!(petition_id = %id, "petition closed");
        }
        Ok(petition)
    }

    pub async fn close_early(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let (petition, _) = self.store.update(id, |p| p.close_early(now)).await?;
        tracing::info!(petition_id = %id, "petition closed early");
        Ok(petition)
    }

    pub async fn stop(&self, id: PetitionId, now: Timestamp) -> Result<Petition, StoreError> {
        let (petition, _) = self.store.update(id, |p| p.stop(now)).await?;
        tracing::info!(petition_id = %id, "petition stopped");
        Ok(petition)
    }

    /// Add one day to the petition's deadline.
    pub async fn extend_deadline(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let (petition, _) = self
            .store
            .update(id, |p| Ok(p.extend_deadline(now)))
            .await?;
        tracing::info!(
            petition_id = %id,
            deadline_extension = petition.deadline_extension,
            "petition deadline extended"
        );
        Ok(petition)
    }

    pub async fn remove(&self, id: PetitionId, now: Timestamp) -> Result<Petition, StoreError> {
        let (petition, _) = self.store.update(id, |p| p.remove(now)).await?;
        tracing::info!(petition_id = %id, "petition removed");
        Ok(petition)
    }

    // ── Debate and Response ──────────────────────────────────────────

    /// Set or clear the debate date. Dates are compared with `now`'s UTC
    /// calendar day.
    pub async fn schedule_debate(
        &self,
        id: PetitionId,
        date: Option<NaiveDate>,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let today = now.date();
        let (petition, debate_state): (Petition, DebateState) = self
            .store
            .update(id, |p| p.schedule_debate(date, today, now))
            .await?;
        tracing::info!(petition_id = %id, debate_state = %debate_state, "debate scheduled");
        Ok(petition)
    }

    pub async fn record_debate_outcome(
        &self,
        id: PetitionId,
        debated: bool,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let (petition, debate_state) = self
            .store
            .update(id, |p| p.record_debate_outcome(debated, now))
            .await?;
        tracing::info!(petition_id = %id, debate_state = %debate_state, "debate outcome recorded");
        Ok(petition)
    }

    pub async fn record_government_response(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> Result<Petition, StoreError> {
        let (petition, response_state): (Petition, ResponseState) = self
            .store
            .update(id, |p| p.record_government_response(now))
            .await?;
        tracing::info!(petition_id = %id, response_state = %response_state, "government response recorded");
        Ok(petition)
    }

    // ── Moderator Lock ───────────────────────────────────────────────

    /// Take the edit lock. Returns `false` if another moderator holds it.
    pub async fn checkout(
        &self,
        id: PetitionId,
        moderator: ModeratorId,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let (_, taken) = self
            .store
            .update(id, |p| Ok(p.checkout(moderator, now)))
            .await?;
        tracing::debug!(petition_id = %id, %moderator, taken, "lock checkout");
        Ok(taken)
    }

    pub async fn force_checkout(
        &self,
        id: PetitionId,
        moderator: ModeratorId,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let (_, taken) = self
            .store
            .update(id, |p| Ok(p.force_checkout(moderator, now)))
            .await?;
        tracing::info!(petition_id = %id, %moderator, "lock force checkout");
        Ok(taken)
    }

    pub async fn release(
        &self,
        id: PetitionId,
        moderator: ModeratorId,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let (_, released) = self
            .store
            .update(id, |p| Ok(p.release(moderator, now)))
            .await?;
        tracing::debug!(petition_id = %id, %moderator, released, "lock release");
        Ok(released)
    }

    // ── Anonymization ────────────────────────────────────────────────

    /// Anonymize one petition and scrub its signatures.
    ///
    /// Returns `false` if the petition was already anonymized.
    pub async fn anonymize(&self, id: PetitionId, now: Timestamp) -> Result<bool, StoreError> {
        let (_, scrubbed) = self.store.anonymize(id, now).await?;
        if let Some(signatures) = scrubbed {
            tracing::info!(petition_id = %id, signatures, "petition anonymized");
        }
        Ok(scrubbed.is_some())
    }
}
