//! # petitions-store — Atomic Persistence and Sweeps
//!
//! Wraps the synchronous lifecycle engine in `petitions-state` with storage.
//!
//! ## Layers
//!
//! - [`PetitionStore`] (`store.rs`): the storage seam. Its central method,
//!   `update`, applies a lifecycle operation to one petition row under a
//!   row-level lock and writes the result back exactly once, or not at all
//!   if the operation fails.
//!
//! - [`MemoryStore`] (`memory.rs`): `DashMap`-backed store used by tests
//!   and by the CLI's snapshot mode. Counts writes.
//!
//! - [`db::PgStore`] (`db/`): PostgreSQL via SQLx. Row locking with
//!   `SELECT … FOR UPDATE`; rejections upserted with `ON CONFLICT`.
//!
//! - [`LifecycleMetrics`] (`metrics.rs`): Prometheus counters for sweeps.
//!
//! - [`PetitionService`] (`service.rs`): one async method per lifecycle
//!   operation, each a single atomic store update.
//!
//! - Sweeps (`sweeps.rs`): scheduled batch operations over bounded
//!   candidate sets: closing, marking debates, anonymizing, and dissolution.
//!   Every sweep is idempotent and safe alongside live signature traffic.
//!
//! ## Crate Policy
//!
//! - No lifecycle rules here; every decision is made by `petitions-state`.
//! - No configuration globals; `SiteSettings` lives on the service.

pub mod db;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod service;
pub mod store;
pub mod sweeps;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use metrics::LifecycleMetrics;
pub use service::PetitionService;
pub use store::PetitionStore;
pub use sweeps::{Sweep, SweepReport, DEFAULT_BATCH_SIZE};
