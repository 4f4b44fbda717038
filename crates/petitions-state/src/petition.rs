//! # Petition Aggregate
//!
//! The petition record, its primary lifecycle state, and the response and
//! debate sub-states.
//!
//! ## States
//!
//! ```text
//!   pending ──▶ validated ──▶ sponsored ──▶ open ──▶ closed ──▶ removed
//!      │            │  ▲          │  ▲        │ ▲       ▲
//!      │            ▼  │          ▼  │        ▼ │       │
//!      │        flagged / dormant ───┘     rejected ──▶ hidden
//!      │            │                         │  (restore → sponsored)
//!      ▼            ▼                         │
//!   stopped ◀───────┘ (any pre-moderation)    └──▶ open / closed (approve)
//! ```
//!
//! ## Design Decision
//!
//! Like the entity lifecycle it is modelled on, the state is an enum with
//! validated transitions rather than one type per state. Petitions are
//! loaded from storage in arbitrary states and moved between them by
//! signature traffic and sweeps, so the state must be a runtime value;
//! each operation checks it and returns
//! [`PetitionError::InvalidTransition`] on a bad edge.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use petitions_core::{ModeratorId, PetitionId, Timestamp};

use crate::moderation::Rejection;

// ─── Primary State ───────────────────────────────────────────────────

/// The primary lifecycle state of a petition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetitionState {
    /// Created; the creator has not validated their signature yet.
    Pending,
    /// Creator signature validated; collecting sponsors.
    Validated,
    /// Enough sponsors to enter the moderation queue.
    Sponsored,
    /// Held back by a moderator for a second opinion.
    Flagged,
    /// Parked by a moderator.
    Dormant,
    /// Stopped before moderation (e.g. by a dissolution).
    Stopped,
    /// Published and collecting signatures.
    Open,
    /// Rejected with a public reason.
    Rejected,
    /// Rejected with a reason that hides the petition entirely.
    Hidden,
    /// Past its deadline, or closed early.
    Closed,
    /// Taken down after closing.
    Removed,
}

impl PetitionState {
    /// Every state, in lifecycle order.
    pub const ALL: [PetitionState; 11] = [
        Self::Pending,
        Self::Validated,
        Self::Sponsored,
        Self::Flagged,
        Self::Dormant,
        Self::Stopped,
        Self::Open,
        Self::Rejected,
        Self::Hidden,
        Self::Closed,
        Self::Removed,
    ];

    /// States before a moderation decision; these can be stopped.
    pub fn is_pre_moderation(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Validated | Self::Sponsored | Self::Flagged | Self::Dormant
        )
    }

    /// States a moderator can publish or reject from the queue.
    pub fn is_moderatable(&self) -> bool {
        matches!(
            self,
            Self::Validated | Self::Sponsored | Self::Flagged | Self::Dormant
        )
    }

    /// Published states.
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Open | Self::Closed)
    }

    /// States carrying a rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected | Self::Hidden)
    }

    /// Storage and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Sponsored => "sponsored",
            Self::Flagged => "flagged",
            Self::Dormant => "dormant",
            Self::Stopped => "stopped",
            Self::Open => "open",
            Self::Rejected => "rejected",
            Self::Hidden => "hidden",
            Self::Closed => "closed",
            Self::Removed => "removed",
        }
    }
}

impl FromStr for PetitionState {
    type Err = PetitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| PetitionError::Validation(format!("unknown petition state {s:?}")))
    }
}

impl std::fmt::Display for PetitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Sub-States ──────────────────────────────────────────────────────

/// Progress of the government response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseState {
    /// Below the response threshold.
    #[default]
    Pending,
    /// Threshold reached, response not yet published.
    Awaiting,
    /// Government has responded.
    Responded,
}

impl ResponseState {
    /// Storage and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Awaiting => "awaiting",
            Self::Responded => "responded",
        }
    }
}

impl FromStr for ResponseState {
    type Err = PetitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "awaiting" => Ok(Self::Awaiting),
            "responded" => Ok(Self::Responded),
            other => Err(PetitionError::Validation(format!(
                "unknown response state {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for ResponseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress towards a parliamentary debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateState {
    /// Below the debate threshold and no debate scheduled.
    #[default]
    Pending,
    /// Threshold reached, no date set.
    Awaiting,
    /// A debate date in the future is set.
    Scheduled,
    /// The debate took place.
    Debated,
    /// Parliament decided not to debate.
    NotDebated,
}

impl DebateState {
    /// Whether the sub-state is still `pending` or `awaiting`.
    pub fn is_undecided(&self) -> bool {
        matches!(self, Self::Pending | Self::Awaiting)
    }

    /// Storage and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Awaiting => "awaiting",
            Self::Scheduled => "scheduled",
            Self::Debated => "debated",
            Self::NotDebated => "not_debated",
        }
    }
}

impl FromStr for DebateState {
    type Err = PetitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "awaiting" => Ok(Self::Awaiting),
            "scheduled" => Ok(Self::Scheduled),
            "debated" => Ok(Self::Debated),
            "not_debated" => Ok(Self::NotDebated),
            other => Err(PetitionError::Validation(format!(
                "unknown debate state {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for DebateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors that can occur during petition lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PetitionError {
    /// The operation is not permitted from the current state. Callers are
    /// expected to check state first; this is never retried.
    #[error("invalid petition transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Attempted target.
        to: String,
    },

    /// Input is missing or malformed (e.g. a rejection without a code).
    #[error("validation failure: {0}")]
    Validation(String),
}

// ─── Transition Log ──────────────────────────────────────────────────

/// Record of a primary state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionTransitionRecord {
    /// State before the transition.
    pub from_state: PetitionState,
    /// State after the transition.
    pub to_state: PetitionState,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Reason for the transition.
    pub reason: String,
}

/// Personally identifying details of the petition creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorContact {
    pub name: String,
    pub email: String,
    pub postcode: Option<String>,
}

// ─── Petition ────────────────────────────────────────────────────────

/// A petition with its lifecycle state, counters, and milestones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Petition {
    pub id: PetitionId,
    /// What the petition asks for.
    pub action: String,
    /// Why.
    pub background: String,
    /// Creator PII; `None` once anonymized.
    pub creator: Option<CreatorContact>,

    pub state: PetitionState,
    /// Validated signatures, creator and sponsors included.
    pub signature_count: u32,
    pub last_signed_at: Option<Timestamp>,

    pub open_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub stopped_at: Option<Timestamp>,
    pub rejected_at: Option<Timestamp>,
    pub removed_at: Option<Timestamp>,
    pub anonymized_at: Option<Timestamp>,

    pub moderation_threshold_reached_at: Option<Timestamp>,
    pub response_threshold_reached_at: Option<Timestamp>,
    pub debate_threshold_reached_at: Option<Timestamp>,

    pub response_state: ResponseState,
    pub government_response_at: Option<Timestamp>,
    pub debate_state: DebateState,
    pub scheduled_debate_date: Option<chrono::NaiveDate>,
    pub debate_outcome_at: Option<Timestamp>,

    /// Extra days added to the computed deadline.
    pub deadline_extension: u32,
    /// Exempts the petition from anonymization.
    pub do_not_anonymize: bool,

    /// Moderator holding the cooperative edit lock.
    pub locked_by: Option<ModeratorId>,
    pub locked_at: Option<Timestamp>,

    /// Present only while the state is `rejected` or `hidden`.
    pub rejection: Option<Rejection>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Ordered log of all primary state transitions.
    pub transitions: Vec<PetitionTransitionRecord>,
}

impl Petition {
    /// Create a new petition in the `pending` state.
    pub fn new(
        action: impl Into<String>,
        background: impl Into<String>,
        creator: Option<CreatorContact>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: PetitionId::new(),
            action: action.into(),
            background: background.into(),
            creator,
            state: PetitionState::Pending,
            signature_count: 0,
            last_signed_at: None,
            open_at: None,
            closed_at: None,
            stopped_at: None,
            rejected_at: None,
            removed_at: None,
            anonymized_at: None,
            moderation_threshold_reached_at: None,
            response_threshold_reached_at: None,
            debate_threshold_reached_at: None,
            response_state: ResponseState::Pending,
            government_response_at: None,
            debate_state: DebateState::Pending,
            scheduled_debate_date: None,
            debate_outcome_at: None,
            deadline_extension: 0,
            do_not_anonymize: false,
            locked_by: None,
            locked_at: None,
            rejection: None,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        }
    }

    /// Remove the petition after it has closed (CLOSED → REMOVED).
    pub fn remove(&mut self, now: Timestamp) -> Result<PetitionState, PetitionError> {
        if self.state != PetitionState::Closed {
            return Err(self.invalid(PetitionState::Removed.as_str()));
        }
        self.removed_at = Some(now);
        self.do_transition(PetitionState::Removed, "removed", now);
        Ok(self.state)
    }

    /// Build an `InvalidTransition` from the current state.
    pub(crate) fn invalid(&self, to: &str) -> PetitionError {
        PetitionError::InvalidTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }

    /// Require the petition to be in one of `allowed`.
    pub(crate) fn require_any(
        &self,
        allowed: impl Fn(&PetitionState) -> bool,
        target: &str,
    ) -> Result<(), PetitionError> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(target))
        }
    }

    /// Move to `to`, logging the transition and touching `updated_at`.
    /// A transition to the current state only touches `updated_at`.
    pub(crate) fn do_transition(&mut self, to: PetitionState, reason: &str, now: Timestamp) {
        if self.state != to {
            self.transitions.push(PetitionTransitionRecord {
                from_state: self.state,
                to_state: to,
                timestamp: now,
                reason: reason.to_string(),
            });
            self.state = to;
        }
        self.touch(now);
    }

    pub(crate) fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
