use std::time::Duration;

use crate::contracts::error::StoreError;

/// Durable per-pot counter storage.
///
/// The store is the single source of truth and the only shared mutable
/// resource: all serialization of counter mutation happens here, never in
/// the registry or engine. Any number of engine instances may operate
/// against the same store concurrently.
///
/// # Invariants
/// - Entity creation is atomic and exclusive: of two concurrent
///   `create_entity` calls for the same name, exactly one succeeds and the
///   other observes `EntityExists`.
/// - `atomic_increment_and_fetch` is one indivisible step: the returned
///   value is the post-increment counter state, and no two calls ever
///   return the same value for the same entity.
/// - Named locks on distinct names never contend.
pub trait CounterStore: Send + Sync {
    /// Creates the counter entity for a pot, recording its floor.
    /// Returns `EntityExists` if an entity with this name already exists.
    fn create_entity(&self, name: &str, floor: u64) -> Result<(), StoreError>;

    /// Writes the initial counter row for a freshly created entity.
    fn insert_value(&self, name: &str, value: u64) -> Result<(), StoreError>;

    /// Removes an entity and its counter row. Used only to roll back a
    /// half-created pot whose initial insert failed.
    fn drop_entity(&self, name: &str) -> Result<(), StoreError>;

    /// Non-mutating existence probe. Absence is `Ok(false)`, not an error.
    fn entity_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Acquires the advisory lock for `name`, waiting at most `timeout`.
    /// Returns `LockTimedOut` if the bound elapses.
    fn acquire_named_lock(&self, name: &str, timeout: Duration) -> Result<(), StoreError>;

    /// Releases the advisory lock for `name`. Releasing a lock that is not
    /// held is a no-op.
    fn release_named_lock(&self, name: &str) -> Result<(), StoreError>;

    /// Advances the counter by exactly 1 and returns the new value as one
    /// atomic unit. Returns `EntityNotFound` for a pot that was never
    /// created and `Overflow` if the counter would wrap.
    fn atomic_increment_and_fetch(&self, name: &str) -> Result<u64, StoreError>;

    /// Returns the counter's present value without mutating it.
    fn read_value(&self, name: &str) -> Result<u64, StoreError>;
}
