//! # Error Types
//!
//! Errors raised while building the foundational values of the engine:
//! parsing timestamps and identifiers, and validating site settings.
//! Lifecycle errors live next to the state machine in `petitions-state`.

use thiserror::Error;

/// Top-level error type for `petitions-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Site settings are internally inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A value failed to parse or validate.
    #[error("validation error: {0}")]
    Validation(String),
}
