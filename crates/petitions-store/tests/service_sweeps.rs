//! Service and sweep behaviour against the in-memory store: atomic updates
//! under concurrency, idempotent sweeps, dissolution, and anonymization.

use std::sync::Arc;

use chrono::NaiveDate;

use petitions_core::{Dissolution, PetitionId, SiteSettings, Timestamp};
use petitions_state::{
    CreatorContact, DebateState, ModerationParams, Petition, PetitionError, PetitionState,
    RejectionCode, SignatureKind,
};
use petitions_store::{
    LifecycleMetrics, MemoryStore, PetitionService, PetitionStore, StoreError, Sweep,
};

fn at(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn settings() -> SiteSettings {
    SiteSettings {
        threshold_for_moderation: 5,
        threshold_for_response: 10,
        threshold_for_debate: 20,
        petition_duration_months: 6,
        dissolution: None,
    }
}

fn creator() -> CreatorContact {
    CreatorContact {
        name: "Jo Bloggs".into(),
        email: "jo@example.com".into(),
        postcode: Some("SW1A 1AA".into()),
    }
}

fn petition_in(state: PetitionState, opened: Option<&str>) -> Petition {
    let mut p = Petition::new("Do the thing", "Because", Some(creator()), at("2016-09-01T09:00:00Z"));
    p.state = state;
    p.open_at = opened.map(at);
    p
}

fn service(petitions: Vec<Petition>, settings: SiteSettings) -> PetitionService<MemoryStore> {
    PetitionService::new(MemoryStore::load(petitions), settings)
        .with_metrics(LifecycleMetrics::new().unwrap())
}

// ── Concurrency ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_signatures_are_all_counted_with_one_write_each() {
    let p = petition_in(PetitionState::Open, Some("2017-04-01T10:00:00Z"));
    let id = p.id;
    let svc = Arc::new(service(vec![p], settings()));
    let now = at("2017-04-02T10:00:00Z");

    let tasks: Vec<_> = (0..200)
        .map(|_| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move {
                svc.signature_validated(id, SignatureKind::Public, now).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let p = svc.get(id).await.unwrap();
    assert_eq!(p.signature_count, 200);
    assert_eq!(svc.store().writes(), 200);
    assert_eq!(p.response_threshold_reached_at, Some(now));
    assert_eq!(p.debate_threshold_reached_at, Some(now));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sponsors_cross_moderation_threshold_once() {
    let mut p = petition_in(PetitionState::Validated, None);
    p.signature_count = 1;
    let id = p.id;
    let svc = Arc::new(service(vec![p], settings()));
    let now = at("2017-04-02T10:00:00Z");

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move {
                svc.signature_validated(id, SignatureKind::Sponsor, now).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let p = svc.get(id).await.unwrap();
    assert_eq!(p.signature_count, 11);
    assert_eq!(p.state, PetitionState::Sponsored);
    assert_eq!(p.moderation_threshold_reached_at, Some(now));
    let sponsored: Vec<_> = p
        .transitions
        .iter()
        .filter(|t| t.to_state == PetitionState::Sponsored)
        .collect();
    assert_eq!(sponsored.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_rejections_both_succeed_and_last_write_wins() {
    let p = petition_in(PetitionState::Sponsored, None);
    let id = p.id;
    let svc = Arc::new(service(vec![p], settings()));
    let now = at("2017-04-02T10:00:00Z");

    let a = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move {
            svc.moderate(id, &ModerationParams::reject("duplicate"), now).await
        })
    };
    let b = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move {
            svc.moderate(id, &ModerationParams::reject("offensive"), now).await
        })
    };
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    let last = if a.transitions.len() > b.transitions.len() { a } else { b };
    let stored = svc.get(id).await.unwrap();
    assert_eq!(stored, last);
    let code = stored.rejection.as_ref().unwrap().code;
    assert!(matches!(code, RejectionCode::Duplicate | RejectionCode::Offensive));
    assert_eq!(stored.state, code.target_state());
    assert_eq!(svc.store().writes(), 2);
}

// ── Service operations ───────────────────────────────────────────────

#[tokio::test]
async fn failed_operation_writes_nothing() {
    let p = petition_in(PetitionState::Pending, None);
    let id = p.id;
    let svc = service(vec![p.clone()], settings());

    let err = svc
        .moderate(id, &ModerationParams::default(), at("2017-04-02T10:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Petition(PetitionError::Validation(_))));

    let err = svc.remove(id, at("2017-04-02T10:00:00Z")).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Petition(PetitionError::InvalidTransition { .. })
    ));

    assert_eq!(svc.store().writes(), 0);
    assert_eq!(svc.get(id).await.unwrap(), p);
}

#[tokio::test]
async fn unknown_petition_is_not_found() {
    let svc = service(vec![], settings());
    let err = svc
        .signature_validated(PetitionId::new(), SignatureKind::Public, at("2017-04-02T10:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn creator_then_sponsors_reach_moderation_and_approval_opens() {
    let svc = service(vec![], settings());
    let now = at("2017-04-01T10:00:00Z");
    let p = svc.create("Do the thing", "Because", Some(creator()), now).await.unwrap();

    let p = svc.signature_validated(p.id, SignatureKind::Creator, now).await.unwrap();
    assert_eq!(p.state, PetitionState::Validated);
    let p = svc
        .signatures_validated(p.id, 4, SignatureKind::Sponsor, now)
        .await
        .unwrap();
    assert_eq!(p.state, PetitionState::Sponsored);

    let later = at("2017-04-03T10:00:00Z");
    let p = svc.moderate(p.id, &ModerationParams::approve(), later).await.unwrap();
    assert_eq!(p.state, PetitionState::Open);
    assert_eq!(p.open_at, Some(later));

    let p = svc.signature_invalidated(p.id, later).await.unwrap();
    assert_eq!(p.signature_count, 4);
    assert_eq!(p.state, PetitionState::Open);
}

#[tokio::test]
async fn debate_and_response_through_service() {
    let mut p = petition_in(PetitionState::Open, Some("2017-04-01T10:00:00Z"));
    p.signature_count = 20;
    p.debate_threshold_reached_at = Some(at("2017-05-01T10:00:00Z"));
    p.debate_state = DebateState::Awaiting;
    let id = p.id;
    let svc = service(vec![p], settings());
    let now = at("2017-06-01T10:00:00Z");

    let date = NaiveDate::from_ymd_opt(2017, 6, 12).unwrap();
    let p = svc.schedule_debate(id, Some(date), now).await.unwrap();
    assert_eq!(p.debate_state, DebateState::Scheduled);

    let p = svc.schedule_debate(id, None, now).await.unwrap();
    assert_eq!(p.debate_state, DebateState::Awaiting);

    let p = svc.record_debate_outcome(id, false, now).await.unwrap();
    assert_eq!(p.debate_state, DebateState::NotDebated);

    let p = svc.record_government_response(id, now).await.unwrap();
    assert_eq!(p.government_response_at, Some(now));
}

#[tokio::test]
async fn lock_through_service() {
    let p = petition_in(PetitionState::Sponsored, None);
    let id = p.id;
    let svc = service(vec![p], settings());
    let now = at("2017-04-02T10:00:00Z");
    let (me, other) = (
        petitions_core::ModeratorId::new(),
        petitions_core::ModeratorId::new(),
    );

    assert!(svc.checkout(id, me, now).await.unwrap());
    assert!(!svc.checkout(id, other, now).await.unwrap());
    assert!(!svc.release(id, other, now).await.unwrap());
    assert!(svc.force_checkout(id, other, now).await.unwrap());
    assert_eq!(svc.get(id).await.unwrap().locked_by, Some(other));
    assert!(svc.release(id, other, now).await.unwrap());
}

// ── Sweeps ───────────────────────────────────────────────────────────

#[tokio::test]
async fn close_sweep_closes_at_deadline_and_is_idempotent() {
    let due = petition_in(PetitionState::Open, Some("2017-04-01T10:00:00Z"));
    let not_due = petition_in(PetitionState::Open, Some("2017-05-01T10:00:00Z"));
    let svc = service(vec![due.clone(), not_due.clone()], settings());
    let now = at("2017-10-02T00:00:00Z");

    let report = svc.close_petitions(now, 100).await.unwrap();
    assert_eq!(report.sweep, Sweep::Close);
    assert_eq!(report.examined, 1);
    assert_eq!(report.applied, 1);

    let closed = svc.get(due.id).await.unwrap();
    assert_eq!(closed.state, PetitionState::Closed);
    assert_eq!(closed.closed_at, Some(at("2017-10-01T23:59:59.999Z")));
    assert_eq!(svc.get(not_due.id).await.unwrap().state, PetitionState::Open);

    let again = svc.close_petitions(now, 100).await.unwrap();
    assert_eq!(again.examined, 0);
    assert_eq!(again.applied, 0);
    assert_eq!(svc.metrics().unwrap().applied(Sweep::Close), 1);
}

#[tokio::test]
async fn close_sweep_honours_batch_limit() {
    let petitions: Vec<_> = (1..=5)
        .map(|day| petition_in(PetitionState::Open, Some(&format!("2017-01-0{day}T10:00:00Z"))))
        .collect();
    let svc = service(petitions, settings());
    let now = at("2017-12-01T00:00:00Z");

    let first = svc.close_petitions(now, 2).await.unwrap();
    assert_eq!((first.examined, first.applied), (2, 2));
    let second = svc.close_petitions(now, 10).await.unwrap();
    assert_eq!((second.examined, second.applied), (3, 3));
}

#[tokio::test]
async fn mark_debated_sweep() {
    let mut scheduled = petition_in(PetitionState::Closed, Some("2017-01-01T10:00:00Z"));
    scheduled.debate_state = DebateState::Scheduled;
    scheduled.scheduled_debate_date = NaiveDate::from_ymd_opt(2017, 7, 10);
    let mut later = scheduled.clone();
    later.id = PetitionId::new();
    later.scheduled_debate_date = NaiveDate::from_ymd_opt(2017, 7, 20);
    let svc = service(vec![scheduled.clone(), later.clone()], settings());

    let report = svc
        .mark_petitions_as_debated(at("2017-07-10T06:00:00Z"), 100)
        .await
        .unwrap();
    assert_eq!((report.examined, report.applied), (1, 1));
    assert_eq!(svc.get(scheduled.id).await.unwrap().debate_state, DebateState::Debated);
    assert_eq!(svc.get(later.id).await.unwrap().debate_state, DebateState::Scheduled);
}

#[tokio::test]
async fn dissolution_sweeps_require_announcement() {
    let open = petition_in(PetitionState::Open, Some("2017-03-01T10:00:00Z"));
    let pending = petition_in(PetitionState::Pending, None);
    let mut s = settings();
    s.dissolution = Some(Dissolution {
        at: at("2017-05-03T00:01:00Z"),
        announced: false,
    });
    let svc = service(vec![open.clone(), pending.clone()], s);

    assert_eq!(svc.close_petitions_early(100).await.unwrap().applied, 0);
    assert_eq!(svc.stop_petitions_early(100).await.unwrap().applied, 0);
    assert_eq!(svc.store().writes(), 0);
}

#[tokio::test]
async fn dissolution_closes_open_and_stops_unmoderated() {
    let dissolution_at = at("2017-05-03T00:01:00Z");
    let outlives = petition_in(PetitionState::Open, Some("2017-03-01T10:00:00Z"));
    let ends_before = petition_in(PetitionState::Open, Some("2016-10-01T10:00:00Z"));
    let pending = petition_in(PetitionState::Pending, None);
    let flagged = petition_in(PetitionState::Flagged, None);
    let rejected = petition_in(PetitionState::Rejected, None);
    let mut s = settings();
    s.dissolution = Some(Dissolution {
        at: dissolution_at,
        announced: true,
    });
    let svc = service(
        vec![
            outlives.clone(),
            ends_before.clone(),
            pending.clone(),
            flagged.clone(),
            rejected.clone(),
        ],
        s,
    );

    let closed = svc.close_petitions_early(100).await.unwrap();
    assert_eq!(closed.applied, 1);
    let p = svc.get(outlives.id).await.unwrap();
    assert_eq!(p.state, PetitionState::Closed);
    assert_eq!(p.closed_at, Some(dissolution_at));
    assert_eq!(svc.get(ends_before.id).await.unwrap().state, PetitionState::Open);

    let stopped = svc.stop_petitions_early(100).await.unwrap();
    assert_eq!(stopped.applied, 2);
    for id in [pending.id, flagged.id] {
        let p = svc.get(id).await.unwrap();
        assert_eq!(p.state, PetitionState::Stopped);
        assert_eq!(p.stopped_at, Some(dissolution_at));
    }
    assert_eq!(svc.get(rejected.id).await.unwrap().state, PetitionState::Rejected);

    assert_eq!(svc.close_petitions_early(100).await.unwrap().applied, 0);
    assert_eq!(svc.stop_petitions_early(100).await.unwrap().applied, 0);
    let metrics = svc.metrics().unwrap();
    assert_eq!(metrics.applied(Sweep::CloseEarly), 1);
    assert_eq!(metrics.applied(Sweep::StopEarly), 2);
}

#[tokio::test]
async fn dissolution_leaves_petitions_from_after_it_alone() {
    let dissolution_at = at("2017-05-03T00:01:00Z");
    let mut s = settings();
    s.dissolution = Some(Dissolution {
        at: dissolution_at,
        announced: true,
    });
    let svc = service(vec![], s);

    let created = at("2017-06-10T09:00:00Z");
    let late = svc.create("Do the thing", "Because", Some(creator()), created).await.unwrap();
    let mut opened_late = petition_in(PetitionState::Open, Some("2017-06-12T10:00:00Z"));
    opened_late.created_at = created;
    svc.store().insert(&opened_late).await.unwrap();
    let writes = svc.store().writes();

    let stopped = svc.stop_petitions_early(100).await.unwrap();
    assert_eq!((stopped.examined, stopped.applied), (0, 0));
    let closed = svc.close_petitions_early(100).await.unwrap();
    assert_eq!((closed.examined, closed.applied), (0, 0));

    let p = svc.get(late.id).await.unwrap();
    assert_eq!(p.state, PetitionState::Pending);
    assert_eq!(p.stopped_at, None);
    let p = svc.get(opened_late.id).await.unwrap();
    assert_eq!(p.state, PetitionState::Open);
    assert_eq!(p.closed_at, None);
    assert_eq!(svc.store().writes(), writes);
}

#[tokio::test]
async fn anonymize_sweep_includes_removed_petitions() {
    let mut removed = petition_in(PetitionState::Open, Some("2017-04-01T10:00:00Z"));
    removed.signature_count = 7;
    let svc = service(vec![removed.clone()], settings());
    svc.close(removed.id, at("2017-10-02T00:00:00Z")).await.unwrap();
    svc.remove(removed.id, at("2017-11-01T09:00:00Z")).await.unwrap();

    let early = svc.anonymize_petitions(at("2018-04-30T00:00:00Z"), 100).await.unwrap();
    assert_eq!(early.examined, 0);

    let now = at("2020-01-01T00:00:00Z");
    let report = svc.anonymize_petitions(now, 100).await.unwrap();
    assert_eq!((report.examined, report.applied), (1, 1));
    let p = svc.get(removed.id).await.unwrap();
    assert_eq!(p.state, PetitionState::Removed);
    assert!(p.creator.is_none());
    assert_eq!(svc.store().signatures_anonymized_at(removed.id), Some(now));
}

#[tokio::test]
async fn anonymize_sweep_scrubs_old_petitions_once() {
    let mut old = petition_in(PetitionState::Closed, Some("2016-06-01T10:00:00Z"));
    old.closed_at = Some(at("2016-12-01T23:59:59.999Z"));
    old.signature_count = 42;
    let mut exempt = old.clone();
    exempt.id = PetitionId::new();
    exempt.do_not_anonymize = true;
    let mut recent = old.clone();
    recent.id = PetitionId::new();
    recent.closed_at = Some(at("2017-05-01T23:59:59.999Z"));
    let svc = service(vec![old.clone(), exempt.clone(), recent.clone()], settings());
    let now = at("2017-07-01T00:00:00Z");

    let report = svc.anonymize_petitions(now, 100).await.unwrap();
    assert_eq!((report.examined, report.applied), (1, 1));

    let p = svc.get(old.id).await.unwrap();
    assert!(p.creator.is_none());
    assert_eq!(p.anonymized_at, Some(now));
    assert_eq!(svc.store().signatures_anonymized_at(old.id), Some(now));
    assert!(svc.get(exempt.id).await.unwrap().creator.is_some());
    assert!(svc.get(recent.id).await.unwrap().creator.is_some());

    let again = svc.anonymize_petitions(now, 100).await.unwrap();
    assert_eq!(again.applied, 0);
    assert!(!svc.anonymize(old.id, now).await.unwrap());
}

// ── Skipping stale candidates ────────────────────────────────────────

/// Store whose closing query reports a petition that no longer exists.
struct StaleCandidates {
    inner: MemoryStore,
    ghost: PetitionId,
}

impl PetitionStore for StaleCandidates {
    async fn insert(&self, petition: &Petition) -> Result<(), StoreError> {
        self.inner.insert(petition).await
    }

    async fn get(&self, id: PetitionId) -> Result<Option<Petition>, StoreError> {
        self.inner.get(id).await
    }

    async fn update<T, F>(&self, id: PetitionId, operation: F) -> Result<(Petition, T), StoreError>
    where
        T: Send,
        F: FnOnce(&mut Petition) -> Result<T, PetitionError> + Send,
    {
        self.inner.update(id, operation).await
    }

    async fn petitions_in_need_of_closing(
        &self,
        settings: &SiteSettings,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        let mut ids = vec![self.ghost];
        ids.extend(self.inner.petitions_in_need_of_closing(settings, now, limit).await?);
        Ok(ids)
    }

    async fn petitions_in_need_of_marking_as_debated(
        &self,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        self.inner
            .petitions_in_need_of_marking_as_debated(today, limit)
            .await
    }

    async fn petitions_in_need_of_anonymizing(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        self.inner.petitions_in_need_of_anonymizing(cutoff, limit).await
    }

    async fn petitions_closing_after(
        &self,
        settings: &SiteSettings,
        dissolution_at: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        self.inner
            .petitions_closing_after(settings, dissolution_at, limit)
            .await
    }

    async fn petitions_awaiting_moderation(
        &self,
        created_by: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        self.inner.petitions_awaiting_moderation(created_by, limit).await
    }

    async fn anonymize(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> Result<(Petition, Option<u64>), StoreError> {
        self.inner.anonymize(id, now).await
    }
}

#[tokio::test]
async fn sweep_skips_vanished_candidates_and_carries_on() {
    let due = petition_in(PetitionState::Open, Some("2017-01-01T10:00:00Z"));
    let store = StaleCandidates {
        inner: MemoryStore::load([due.clone()]),
        ghost: PetitionId::new(),
    };
    let metrics = LifecycleMetrics::new().unwrap();
    let svc = PetitionService::new(store, settings()).with_metrics(metrics.clone());

    let report = svc.close_petitions(at("2017-09-01T00:00:00Z"), 100).await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(metrics.skipped(Sweep::Close), 1);
    assert_eq!(
        svc.get(due.id).await.unwrap().state,
        PetitionState::Closed
    );
}
