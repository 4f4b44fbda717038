//! # Moderation
//!
//! Moderator decisions on a petition: approve, reject, restore, flag, and
//! park as dormant. A rejection carries a [`RejectionCode`]; hidden codes
//! put the petition in `hidden` instead of `rejected`.
//!
//! A petition holds at most one [`Rejection`]. Rejecting again overwrites
//! it, so two moderators rejecting concurrently both succeed and the last
//! write decides the code.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use petitions_core::Timestamp;

use crate::petition::{Petition, PetitionError, PetitionState};

// ─── Rejection Codes ─────────────────────────────────────────────────

/// Why a petition was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionCode {
    /// Duplicate of an existing petition.
    Duplicate,
    /// Not something parliament or government is responsible for.
    Irrelevant,
    /// Doesn't ask for a clear action.
    NoAction,
    /// About honours or appointments.
    Honours,
    /// Created under a false name.
    FakeName,
    /// A freedom of information request.
    Foi,
    /// Potentially libellous; hidden.
    Libellous,
    /// Offensive or abusive; hidden.
    Offensive,
}

impl RejectionCode {
    /// Every rejection code.
    pub const ALL: [RejectionCode; 8] = [
        Self::Duplicate,
        Self::Irrelevant,
        Self::NoAction,
        Self::Honours,
        Self::FakeName,
        Self::Foi,
        Self::Libellous,
        Self::Offensive,
    ];

    /// Whether petitions rejected with this code are hidden from the public.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Libellous | Self::Offensive)
    }

    /// The state a petition rejected with this code ends up in.
    pub fn target_state(&self) -> PetitionState {
        if self.is_hidden() {
            PetitionState::Hidden
        } else {
            PetitionState::Rejected
        }
    }

    /// Storage and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Irrelevant => "irrelevant",
            Self::NoAction => "no-action",
            Self::Honours => "honours",
            Self::FakeName => "fake-name",
            Self::Foi => "foi",
            Self::Libellous => "libellous",
            Self::Offensive => "offensive",
        }
    }
}

impl FromStr for RejectionCode {
    type Err = PetitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| PetitionError::Validation(format!("unknown rejection code {s:?}")))
    }
}

impl std::fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rejection attached to a `rejected` or `hidden` petition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: RejectionCode,
    pub details: Option<String>,
}

// ─── Moderation Parameters ───────────────────────────────────────────

/// A moderator decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Reject,
    Restore,
    Flag,
    Dormant,
}

impl FromStr for ModerationAction {
    type Err = PetitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "restore" => Ok(Self::Restore),
            "flag" => Ok(Self::Flag),
            "dormant" => Ok(Self::Dormant),
            other => Err(PetitionError::Validation(format!(
                "unknown moderation action {other:?}"
            ))),
        }
    }
}

/// Parameters submitted with a moderation decision. The rejection code is
/// raw input and is validated by [`Petition::moderate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationParams {
    pub moderation: Option<ModerationAction>,
    pub rejection_code: Option<String>,
    pub rejection_details: Option<String>,
}

impl ModerationParams {
    /// Parameters for an approval.
    pub fn approve() -> Self {
        Self {
            moderation: Some(ModerationAction::Approve),
            ..Self::default()
        }
    }

    /// Parameters for a rejection with `code`.
    pub fn reject(code: &str) -> Self {
        Self {
            moderation: Some(ModerationAction::Reject),
            rejection_code: Some(code.to_string()),
            ..Self::default()
        }
    }

    /// Parameters for a bare action without rejection details.
    pub fn action(action: ModerationAction) -> Self {
        Self {
            moderation: Some(action),
            ..Self::default()
        }
    }
}

// ─── Operations ──────────────────────────────────────────────────────

impl Petition {
    /// Apply a moderator decision and return the resulting state.
    ///
    /// # Errors
    ///
    /// - [`PetitionError::Validation`] if no action is given, or a
    ///   rejection has a missing or unknown code.
    /// - [`PetitionError::InvalidTransition`] if the action is not allowed
    ///   from the current state.
    pub fn moderate(
        &mut self,
        params: &ModerationParams,
        now: Timestamp,
    ) -> Result<PetitionState, PetitionError> {
        let action = params
            .moderation
            .ok_or_else(|| PetitionError::Validation("moderation action is required".into()))?;

        match action {
            ModerationAction::Reject => {
                let code = params
                    .rejection_code
                    .as_deref()
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .ok_or_else(|| PetitionError::Validation("rejection code is required".into()))?
                    .parse::<RejectionCode>()?;
                self.require_any(
                    |s| s.is_moderatable() || s.is_published() || s.is_rejection(),
                    code.target_state().as_str(),
                )?;
                self.apply_rejection(code, params.rejection_details.clone(), now);
            }
            ModerationAction::Approve => self.approve(now)?,
            ModerationAction::Restore => self.restore(now)?,
            ModerationAction::Flag => {
                self.require_any(
                    |s| matches!(s, PetitionState::Validated | PetitionState::Sponsored),
                    PetitionState::Flagged.as_str(),
                )?;
                self.do_transition(PetitionState::Flagged, "flagged", now);
            }
            ModerationAction::Dormant => {
                self.require_any(
                    |s| matches!(s, PetitionState::Validated | PetitionState::Sponsored),
                    PetitionState::Dormant.as_str(),
                )?;
                self.do_transition(PetitionState::Dormant, "dormant", now);
            }
        }

        Ok(self.state)
    }

    /// Reject a petition that has not been published yet.
    ///
    /// Unlike [`Petition::moderate`], this refuses published and already
    /// rejected petitions.
    pub fn reject(
        &mut self,
        code: RejectionCode,
        details: Option<String>,
        now: Timestamp,
    ) -> Result<PetitionState, PetitionError> {
        self.require_any(PetitionState::is_pre_moderation, code.target_state().as_str())?;
        self.apply_rejection(code, details, now);
        Ok(self.state)
    }

    /// Publish from the queue, or republish a rejected petition.
    ///
    /// A republished petition returns to `closed` if it had already closed,
    /// otherwise to `open`. Existing `open_at`/`closed_at` are kept.
    fn approve(&mut self, now: Timestamp) -> Result<(), PetitionError> {
        self.require_any(
            |s| s.is_moderatable() || s.is_rejection(),
            PetitionState::Open.as_str(),
        )?;
        self.rejection = None;
        if self.open_at.is_none() {
            self.open_at = Some(now);
        }
        let target = match self.closed_at {
            Some(closed_at) if closed_at < now => PetitionState::Closed,
            _ => PetitionState::Open,
        };
        self.do_transition(target, "approved", now);
        Ok(())
    }

    /// Send a rejected, flagged, or dormant petition back to the queue.
    ///
    /// Restoring a rejection wipes its publication history so the petition
    /// is moderated from scratch.
    fn restore(&mut self, now: Timestamp) -> Result<(), PetitionError> {
        self.require_any(
            |s| s.is_rejection() || matches!(s, PetitionState::Flagged | PetitionState::Dormant),
            PetitionState::Sponsored.as_str(),
        )?;
        if self.state.is_rejection() {
            self.rejection = None;
            self.rejected_at = None;
            self.open_at = None;
            self.closed_at = None;
        }
        self.do_transition(PetitionState::Sponsored, "restored", now);
        Ok(())
    }

    fn apply_rejection(&mut self, code: RejectionCode, details: Option<String>, now: Timestamp) {
        self.rejection = Some(Rejection { code, details });
        self.rejected_at = Some(now);
        self.do_transition(code.target_state(), &format!("rejected: {code}"), now);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
