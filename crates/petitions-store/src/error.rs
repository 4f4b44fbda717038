//! # Store Errors

use thiserror::Error;

use petitions_core::PetitionId;
use petitions_state::PetitionError;

/// Errors raised by a [`crate::PetitionStore`] or the service above it.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No petition with this identifier.
    #[error("petition not found: {0}")]
    NotFound(PetitionId),

    /// The lifecycle operation itself was rejected; nothing was written.
    #[error(transparent)]
    Petition(#[from] PetitionError),

    /// The database failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back to a petition.
    #[error("corrupt petition row {id}: {reason}")]
    Corrupt {
        /// Row identifier.
        id: uuid::Uuid,
        /// What failed to map.
        reason: String,
    },

    /// JSON encoding of a stored column failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether a sweep should skip this petition and carry on: the row went
    /// away, or another writer moved it to a state the sweep no longer
    /// applies to.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Petition(_))
    }
}
