//! # Identifier Newtypes
//!
//! A `PetitionId` cannot be passed where a `ModeratorId` is expected.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Unique identifier for a petition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PetitionId(pub Uuid);

/// Unique identifier for a moderator holding the cooperative edit lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeratorId(pub Uuid);

impl PetitionId {
    /// Generate a new random petition identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl ModeratorId {
    /// Generate a new random moderator identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PetitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ModeratorId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for PetitionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("petition:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| CoreError::Validation(format!("invalid petition id {s:?}: {e}")))
    }
}

impl FromStr for ModeratorId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("moderator:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| CoreError::Validation(format!("invalid moderator id {s:?}: {e}")))
    }
}

impl std::fmt::Display for PetitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "petition:{}", self.0)
    }
}

impl std::fmt::Display for ModeratorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "moderator:{}", self.0)
    }
}
