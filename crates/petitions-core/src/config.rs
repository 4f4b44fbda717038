//! # Site Settings
//!
//! Per-deployment thresholds, petition duration, and the parliamentary
//! dissolution date. A `SiteSettings` value is passed explicitly to every
//! operation that reads it, and is loaded once by the caller (the CLI reads
//! it from YAML).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::temporal::Timestamp;

/// Default signature count at which a petition is sent for moderation.
pub const DEFAULT_THRESHOLD_FOR_MODERATION: u32 = 5;
/// Default signature count at which the government must respond.
pub const DEFAULT_THRESHOLD_FOR_RESPONSE: u32 = 10_000;
/// Default signature count at which a debate is considered.
pub const DEFAULT_THRESHOLD_FOR_DEBATE: u32 = 100_000;
/// Default number of months a petition stays open.
pub const DEFAULT_PETITION_DURATION_MONTHS: u32 = 6;

/// A scheduled or announced dissolution of parliament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dissolution {
    /// The instant parliament dissolves.
    pub at: Timestamp,
    /// Whether the dissolution has been publicly announced. Only an
    /// announced dissolution closes or stops petitions.
    #[serde(default)]
    pub announced: bool,
}

/// Deployment configuration consumed by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Signatures (creator and sponsors included) needed to reach moderation.
    pub threshold_for_moderation: u32,
    /// Signatures needed for a government response.
    pub threshold_for_response: u32,
    /// Signatures needed for a parliamentary debate.
    pub threshold_for_debate: u32,
    /// How long a published petition stays open, in calendar months.
    pub petition_duration_months: u32,
    /// Upcoming dissolution, if any.
    pub dissolution: Option<Dissolution>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            threshold_for_moderation: DEFAULT_THRESHOLD_FOR_MODERATION,
            threshold_for_response: DEFAULT_THRESHOLD_FOR_RESPONSE,
            threshold_for_debate: DEFAULT_THRESHOLD_FOR_DEBATE,
            petition_duration_months: DEFAULT_PETITION_DURATION_MONTHS,
            dissolution: None,
        }
    }
}

impl SiteSettings {
    /// Check that the thresholds and duration are usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if any threshold or the duration is
    /// zero, or if the response threshold exceeds the debate threshold.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("threshold_for_moderation", self.threshold_for_moderation),
            ("threshold_for_response", self.threshold_for_response),
            ("threshold_for_debate", self.threshold_for_debate),
            ("petition_duration_months", self.petition_duration_months),
        ] {
            if value == 0 {
                return Err(CoreError::Config(format!("{name} must be positive")));
            }
        }
        if self.threshold_for_response > self.threshold_for_debate {
            return Err(CoreError::Config(format!(
                "threshold_for_response ({}) exceeds threshold_for_debate ({})",
                self.threshold_for_response, self.threshold_for_debate
            )));
        }
        Ok(())
    }

    /// The dissolution instant, whether or not it has been announced.
    pub fn dissolution_at(&self) -> Option<Timestamp> {
        self.dissolution.map(|d| d.at)
    }

    /// Whether a dissolution has been announced.
    pub fn dissolution_announced(&self) -> bool {
        self.dissolution.is_some_and(|d| d.announced)
    }

    /// The dissolution, only once it has been announced.
    pub fn announced_dissolution(&self) -> Option<Dissolution> {
        self.dissolution.filter(|d| d.announced)
    }
}
