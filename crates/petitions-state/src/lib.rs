//! # petitions-state — Petition Lifecycle Engine
//!
//! The synchronous core of the petitions system. A [`Petition`] is an
//! aggregate whose fields only change through the explicit operations in
//! this crate; each operation validates the current state, computes every
//! dependent field change, and applies them together or not at all.
//!
//! ## Components
//!
//! - **State machine** (`petition.rs`, `moderation.rs`): the primary
//!   `state`, moderator decisions, rejection codes, removal.
//!
//! - **Signature aggregation** (`signatures.rs`): `signature_count` and the
//!   moderation, response, and debate threshold timestamps. Crossings are
//!   detected by exact equality with the configured threshold.
//!
//! - **Closure** (`closure.rs`): deadlines, scheduled and early closing,
//!   stopping, deadline extensions, the 24-hour signing grace window.
//!
//! - **Debate and response** (`debate.rs`): the `debate_state` and
//!   `response_state` sub-machines.
//!
//! - **Dissolution** (`dissolution.rs`): forced early closure and stopping
//!   once a dissolution of parliament is announced.
//!
//! - **Anonymization** (`anonymization.rs`): eligibility six months after a
//!   terminal state, and the PII scrub itself.
//!
//! - **Moderator lock** (`lock.rs`): the cooperative checkout lock.
//!
//! ## Design
//!
//! No operation reads a clock or a global. The current time is always an
//! argument, and thresholds come from an explicit
//! [`petitions_core::SiteSettings`]. Nothing here performs I/O; atomic
//! persistence is the job of `petitions-store`.

pub mod anonymization;
pub mod closure;
pub mod debate;
pub mod dissolution;
pub mod lock;
pub mod moderation;
pub mod petition;
pub mod signatures;

pub use anonymization::ANONYMIZE_AFTER_MONTHS;
pub use closure::SIGNING_GRACE_PERIOD_HOURS;
pub use dissolution::DissolutionOutcome;
pub use moderation::{ModerationAction, ModerationParams, Rejection, RejectionCode};
pub use petition::{
    CreatorContact, DebateState, Petition, PetitionError, PetitionState,
    PetitionTransitionRecord, ResponseState,
};
pub use signatures::SignatureKind;
