//! # petitions-core — Foundational Types for the Petitions Engine
//!
//! The leaf of the workspace dependency DAG. Every other crate depends on
//! `petitions-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `PetitionId` and `ModeratorId`
//!    cannot be confused with one another or with bare UUIDs.
//!
//! 2. **UTC-only timestamps with millisecond precision.** Deadlines end at
//!    `23:59:59.999`, so `Timestamp` keeps milliseconds and nothing finer.
//!
//! 3. **Explicit configuration context.** `SiteSettings` is a plain value
//!    handed to every operation that needs thresholds, the petition
//!    duration, or the dissolution date. There is no global settings cache.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `petitions-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod error;
pub mod identity;
pub mod temporal;

pub use config::{Dissolution, SiteSettings};
pub use error::CoreError;
pub use identity::{ModeratorId, PetitionId};
pub use temporal::Timestamp;
