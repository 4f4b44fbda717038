//! # Prometheus Metrics
//!
//! Counters for the lifecycle sweeps, kept in their own registry so a host
//! process can merge or expose them as it likes.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::sweeps::Sweep;

/// Shared sweep counters backed by a Prometheus registry.
#[derive(Clone)]
pub struct LifecycleMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    closed_total: IntCounter,
    debated_total: IntCounter,
    anonymized_total: IntCounter,
    closed_early_total: IntCounter,
    stopped_total: IntCounter,
    skipped_total: IntCounterVec,
}

impl std::fmt::Debug for LifecycleMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleMetrics")
            .field("closed", &self.applied(Sweep::Close))
            .field("debated", &self.applied(Sweep::MarkDebated))
            .field("anonymized", &self.applied(Sweep::Anonymize))
            .field("closed_early", &self.applied(Sweep::CloseEarly))
            .field("stopped", &self.applied(Sweep::StopEarly))
            .finish()
    }
}

impl LifecycleMetrics {
    /// Create the counters in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let closed_total = IntCounter::new(
            "petitions_closed_total",
            "Petitions closed at their deadline",
        )?;
        let debated_total = IntCounter::new(
            "petitions_debated_total",
            "Scheduled debates marked as held",
        )?;
        let anonymized_total = IntCounter::new(
            "petitions_anonymized_total",
            "Petitions whose personal data was scrubbed",
        )?;
        let closed_early_total = IntCounter::new(
            "petitions_closed_early_total",
            "Open petitions closed early for a dissolution",
        )?;
        let stopped_total = IntCounter::new(
            "petitions_stopped_total",
            "Unmoderated petitions stopped for a dissolution",
        )?;
        let skipped_total = IntCounterVec::new(
            Opts::new(
                "petitions_sweep_skipped_total",
                "Candidates a sweep skipped because they changed underneath it",
            ),
            &["sweep"],
        )?;

        registry.register(Box::new(closed_total.clone()))?;
        registry.register(Box::new(debated_total.clone()))?;
        registry.register(Box::new(anonymized_total.clone()))?;
        registry.register(Box::new(closed_early_total.clone()))?;
        registry.register(Box::new(stopped_total.clone()))?;
        registry.register(Box::new(skipped_total.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                closed_total,
                debated_total,
                anonymized_total,
                closed_early_total,
                stopped_total,
                skipped_total,
            }),
        })
    }

    fn counter(&self, sweep: Sweep) -> &IntCounter {
        match sweep {
            Sweep::Close => &self.inner.closed_total,
            Sweep::MarkDebated => &self.inner.debated_total,
            Sweep::Anonymize => &self.inner.anonymized_total,
            Sweep::CloseEarly => &self.inner.closed_early_total,
            Sweep::StopEarly => &self.inner.stopped_total,
        }
    }

    /// Record petitions changed by one sweep run.
    pub fn record_applied(&self, sweep: Sweep, count: u64) {
        self.counter(sweep).inc_by(count);
    }

    /// Record candidates a sweep skipped.
    pub fn record_skipped(&self, sweep: Sweep, count: u64) {
        self.inner
            .skipped_total
            .with_label_values(&[sweep.as_str()])
            .inc_by(count);
    }

    /// Total petitions changed by `sweep`.
    pub fn applied(&self, sweep: Sweep) -> u64 {
        self.counter(sweep).get()
    }

    /// Total candidates skipped by `sweep`.
    pub fn skipped(&self, sweep: Sweep) -> u64 {
        self.inner
            .skipped_total
            .with_label_values(&[sweep.as_str()])
            .get()
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}
