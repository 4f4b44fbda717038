//! In-memory petition store backed by `DashMap`.
//!
//! `update` holds the shard write lock for the row while the operation runs
//! on a copy, so concurrent updates of one petition serialize and updates
//! of different petitions proceed in parallel. Every insert, and every
//! update that changed the petition, counts as one write;
//! [`MemoryStore::writes`] exposes the total.
//!
//! Signatures are not held individually: the store records when the
//! signatures of each petition were scrubbed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;

use petitions_core::{PetitionId, SiteSettings, Timestamp};
use petitions_state::{DebateState, Petition, PetitionError, PetitionState};

use crate::error::StoreError;
use crate::store::PetitionStore;

struct Inner {
    petitions: DashMap<PetitionId, Petition>,
    anonymized_signatures: DashMap<PetitionId, Timestamp>,
    writes: AtomicU64,
    #[cfg(test)]
    fail_signature_scrub: std::sync::atomic::AtomicBool,
}

/// Shared in-memory store.
///
/// Cheaply cloneable via `Arc`; all clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                petitions: DashMap::new(),
                anonymized_signatures: DashMap::new(),
                writes: AtomicU64::new(0),
                #[cfg(test)]
                fail_signature_scrub: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    /// Build a store from previously saved petitions. Loading does not
    /// count as writes.
    pub fn load(petitions: impl IntoIterator<Item = Petition>) -> Self {
        let store = Self::new();
        for petition in petitions {
            store.inner.petitions.insert(petition.id, petition);
        }
        store
    }

    /// Every petition, oldest first.
    pub fn snapshot(&self) -> Vec<Petition> {
        let mut petitions: Vec<Petition> = self
            .inner
            .petitions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        petitions.sort_by_key(|p| (p.created_at, p.id));
        petitions
    }

    /// Number of successful row writes since creation.
    pub fn writes(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// When the signatures of `id` were scrubbed, if they were.
    pub fn signatures_anonymized_at(&self, id: PetitionId) -> Option<Timestamp> {
        self.inner.anonymized_signatures.get(&id).map(|at| *at)
    }

    pub fn len(&self) -> usize {
        self.inner.petitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.petitions.is_empty()
    }

    fn update_sync<T, F>(&self, id: PetitionId, operation: F) -> Result<(Petition, T), StoreError>
    where
        F: FnOnce(&mut Petition) -> Result<T, PetitionError>,
    {
        let mut row = self
            .inner
            .petitions
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        let mut working = row.value().clone();
        let output = operation(&mut working)?;
        if working != *row {
            *row = working.clone();
            self.inner.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok((working, output))
    }

    fn anonymize_sync(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> Result<(Petition, Option<u64>), StoreError> {
        let mut row = self
            .inner
            .petitions
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        let mut working = row.value().clone();
        if !working.anonymize(now)? {
            return Ok((working, None));
        }
        let scrubbed = self.scrub_signatures(&working, now)?;
        *row = working.clone();
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok((working, Some(scrubbed)))
    }

    /// Mark the signatures of `petition` scrubbed. Called with the row lock
    /// held.
    fn scrub_signatures(&self, petition: &Petition, now: Timestamp) -> Result<u64, StoreError> {
        #[cfg(test)]
        if self.inner.fail_signature_scrub.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let first = self
            .inner
            .anonymized_signatures
            .insert(petition.id, now)
            .is_none();
        Ok(if first { u64::from(petition.signature_count) } else { 0 })
    }

    /// Ids of petitions matching `keep`, ordered by `key` then id, at most
    /// `limit` of them.
    fn select<K: Ord>(
        &self,
        limit: usize,
        keep: impl Fn(&Petition) -> bool,
        key: impl Fn(&Petition) -> K,
    ) -> Vec<PetitionId> {
        let mut matches: Vec<(K, PetitionId)> = self
            .inner
            .petitions
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| (key(entry.value()), entry.value().id))
            .collect();
        matches.sort();
        matches.into_iter().take(limit).map(|(_, id)| id).collect()
    }
}

impl PetitionStore for MemoryStore {
    async fn insert(&self, petition: &Petition) -> Result<(), StoreError> {
        self.inner.petitions.insert(petition.id, petition.clone());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, id: PetitionId) -> Result<Option<Petition>, StoreError> {
        Ok(self.inner.petitions.get(&id).map(|row| row.value().clone()))
    }

    async fn update<T, F>(&self, id: PetitionId, operation: F) -> Result<(Petition, T), StoreError>
    where
        T: Send,
        F: FnOnce(&mut Petition) -> Result<T, PetitionError> + Send,
    {
        self.update_sync(id, operation)
    }

    async fn petitions_in_need_of_closing(
        &self,
        settings: &SiteSettings,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        Ok(self.select(
            limit,
            |p| {
                p.state == PetitionState::Open
                    && p.deadline(settings).is_some_and(|deadline| deadline <= now)
            },
            |p| p.open_at,
        ))
    }

    async fn petitions_in_need_of_marking_as_debated(
        &self,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        Ok(self.select(
            limit,
            |p| {
                p.state.is_published()
                    && p.debate_state == DebateState::Scheduled
                    && p.scheduled_debate_date.is_some_and(|date| date <= today)
            },
            |p| p.scheduled_debate_date,
        ))
    }

    async fn petitions_in_need_of_anonymizing(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        Ok(self.select(
            limit,
            |p| {
                !p.do_not_anonymize
                    && p.anonymized_at.is_none()
                    && p.terminal_at().is_some_and(|at| at <= cutoff)
            },
            |p| p.terminal_at(),
        ))
    }

    async fn petitions_closing_after(
        &self,
        settings: &SiteSettings,
        dissolution_at: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        Ok(self.select(
            limit,
            |p| {
                p.state == PetitionState::Open
                    && p.open_at.is_some_and(|open_at| open_at <= dissolution_at)
                    && p
                        .deadline(settings)
                        .is_some_and(|deadline| deadline > dissolution_at)
            },
            |p| p.open_at,
        ))
    }

    async fn petitions_awaiting_moderation(
        &self,
        created_by: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        Ok(self.select(
            limit,
            |p| p.state.is_pre_moderation() && p.created_at <= created_by,
            |p| p.created_at,
        ))
    }

    async fn anonymize(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> Result<(Petition, Option<u64>), StoreError> {
        self.anonymize_sync(id, now)
    }
}
