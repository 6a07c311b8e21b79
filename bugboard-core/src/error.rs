use thiserror::Error;

/// Domain error taxonomy. Every rejection is local and terminal for the
/// request that raised it; no partial state change accompanies an Err.
#[derive(Debug, Error)]
pub enum BugError {
    /// Missing or malformed input (no priority set, bad hours, short reason)
    #[error("validation error: {0}")]
    Validation(String),

    /// Role or ownership mismatch for the attempted operation
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Illegal transition, already-assigned, stale revert window,
    /// already-reopened and similar state-dependent rejections
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// The assignment engine found no eligible candidate
    #[error("no eligible candidate: {0}")]
    CapacityExhausted(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, BugError>;
