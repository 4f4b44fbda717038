//! # Petition Store Trait
//!
//! The storage seam between the lifecycle engine and a database.
//!
//! ## Atomicity
//!
//! [`PetitionStore::update`] is the way a stored petition changes. It
//! locks the row, hands a copy to the operation, and writes the copy back
//! in a single write if the operation succeeds and changed it. A failing
//! operation, or one that leaves the petition as it was, writes nothing.
//! Two concurrent updates of the same row serialize on the lock; neither
//! retries.
//!
//! [`PetitionStore::anonymize`] is the one compound write: the petition and
//! its signatures are scrubbed under the same row lock, so either both are
//! anonymized or neither is.
//!
//! ## Candidate Queries
//!
//! Each sweep has its own named query returning a bounded, ordered list of
//! petition identifiers. A query may return a superset of the petitions a
//! sweep will actually change; the per-petition operation is a no-op for the
//! rest.

use std::future::Future;

use chrono::NaiveDate;

use petitions_core::{PetitionId, SiteSettings, Timestamp};
use petitions_state::{Petition, PetitionError};

use crate::error::StoreError;

/// Abstract petition storage. Implementations must be safe to share across
/// worker tasks.
pub trait PetitionStore: Send + Sync {
    /// Insert a new petition.
    fn insert(&self, petition: &Petition) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a petition.
    fn get(
        &self,
        id: PetitionId,
    ) -> impl Future<Output = Result<Option<Petition>, StoreError>> + Send;

    /// Atomically apply `operation` to one petition row.
    ///
    /// Returns the petition as stored afterwards together with the
    /// operation's own result. Nothing is written if the operation left the
    /// petition unchanged.
    fn update<T, F>(
        &self,
        id: PetitionId,
        operation: F,
    ) -> impl Future<Output = Result<(Petition, T), StoreError>> + Send
    where
        T: Send,
        F: FnOnce(&mut Petition) -> Result<T, PetitionError> + Send;

    /// Open petitions whose deadline may have passed at `now`.
    fn petitions_in_need_of_closing(
        &self,
        settings: &SiteSettings,
        now: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<PetitionId>, StoreError>> + Send;

    /// Published petitions with a scheduled debate on or before `today`.
    fn petitions_in_need_of_marking_as_debated(
        &self,
        today: NaiveDate,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<PetitionId>, StoreError>> + Send;

    /// Terminal petitions that reached their terminal state on or before
    /// `cutoff` and are not yet anonymized.
    fn petitions_in_need_of_anonymizing(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<PetitionId>, StoreError>> + Send;

    /// Open petitions that opened by `dissolution_at` and whose deadline may
    /// fall after it.
    fn petitions_closing_after(
        &self,
        settings: &SiteSettings,
        dissolution_at: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<PetitionId>, StoreError>> + Send;

    /// Petitions created by `created_by` that have not been moderated yet.
    fn petitions_awaiting_moderation(
        &self,
        created_by: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<PetitionId>, StoreError>> + Send;

    /// Anonymize one petition and scrub the personal details of its
    /// signatures in a single atomic write.
    ///
    /// Returns the petition as stored afterwards and the number of
    /// signatures scrubbed, or `None` if it was already anonymized.
    fn anonymize(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> impl Future<Output = Result<(Petition, Option<u64>), StoreError>> + Send;
}
