//! Error taxonomy for the gating engine.

use thiserror::Error;
use waypoint_types::{ProductSlug, SessionId};

/// Errors from gate-facing operations.
///
/// `EmptyPlacements`, `NotConfirmed`, and `StepOutOfRange` are recoverable
/// and map to "please provide/confirm your data" prompts; storage errors map
/// to a generic retryable failure.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("placements are empty; nothing to confirm")]
    EmptyPlacements,

    #[error("placements not confirmed; step advance refused")]
    NotConfirmed,

    #[error("step {requested} is outside the allowed range [{min}, {max}]")]
    StepOutOfRange { requested: u32, min: u32, max: u32 },

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("no product access for: {0}")]
    ProductNotFound(ProductSlug),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the version/attempt manager.
#[derive(Error, Debug)]
pub enum VersionError {
    #[error("free attempts exhausted: {used} of {limit} used")]
    AttemptsExhausted { used: u32, limit: u32 },

    #[error("no product access for: {0}")]
    ProductNotFound(ProductSlug),

    #[error("parent session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("version creation kept racing concurrent writers; retries exhausted")]
    StorageConflict,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Failures surfaced by storage adapters, propagated opaquely.
///
/// `Conflict` is the optimistic-concurrency signal: the caller must repeat
/// the full read-evaluate-write sequence, because the correct resolution
/// depends on re-reading current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage operation timed out")]
    Timeout,

    #[error("storage connection lost")]
    ConnectionLost,

    #[error("conditional write lost the race")]
    Conflict,

    #[error("record not found")]
    NotFound,
}

/// Result alias for storage-facing calls.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
