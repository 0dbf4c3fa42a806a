use thiserror::Error;

/// Errors surfaced by a [`CounterStore`](crate::contracts::CounterStore)
/// backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Entity already exists: {0}")]
    EntityExists(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Timed out acquiring named lock: {0}")]
    LockTimedOut(String),

    #[error("Counter overflow for entity: {0}")]
    Overflow(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Errors surfaced by the pot registry and counter engine.
///
/// `NotFound` and `AlreadyExists` are expected outcomes, not server faults:
/// the first is the normal answer for a pot that was never created, the
/// second is the losing side of a creation race.
#[derive(Error, Debug)]
pub enum PotError {
    #[error("Pot not found: {0}")]
    NotFound(String),

    #[error("Pot already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid pot name: {0}")]
    InvalidName(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
