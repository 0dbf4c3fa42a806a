use std::sync::Arc;
use std::time::Duration;

use crate::contracts::{CounterStore, PotError, StoreError};

/// Bounded wait for the creation lock, matching the store-side advisory
/// lock timeout the reference deployment used.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_POT_NAME_LEN: usize = 128;

/// Checks a caller-supplied pot name against the allow-list before any
/// storage identifier is derived from it: non-empty, at most 128 bytes,
/// ASCII alphanumeric plus `_` and `-`.
pub fn validate_pot_name(name: &str) -> Result<(), PotError> {
    if name.is_empty() {
        return Err(PotError::InvalidName("name must not be empty".into()));
    }
    if name.len() > MAX_POT_NAME_LEN {
        return Err(PotError::InvalidName(format!(
            "name exceeds {} bytes",
            MAX_POT_NAME_LEN
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
    {
        return Err(PotError::InvalidName(format!(
            "character {:?} is not allowed",
            c
        )));
    }
    Ok(())
}

/// RAII guard for a store-side advisory named lock. Releases on drop, so
/// every exit path out of the creation sequence releases the lock.
struct NamedLockGuard<'a, S: CounterStore + ?Sized> {
    store: &'a S,
    name: &'a str,
}

impl<'a, S: CounterStore + ?Sized> NamedLockGuard<'a, S> {
    fn acquire(store: &'a S, name: &'a str, timeout: Duration) -> Result<Self, StoreError> {
        store.acquire_named_lock(name, timeout)?;
        Ok(Self { store, name })
    }
}

impl<S: CounterStore + ?Sized> Drop for NamedLockGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.release_named_lock(self.name) {
            tracing::warn!(pot = self.name, error = %e, "failed to release named lock");
        }
    }
}

/// Creates pots exactly once under racing creators and answers existence
/// queries. Stateless apart from the injected store; any number of
/// instances may run against the same store.
pub struct PotRegistry<S: CounterStore> {
    store: Arc<S>,
    lock_timeout: Duration,
}

impl<S: CounterStore> PotRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_lock_timeout(store, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(store: Arc<S>, lock_timeout: Duration) -> Self {
        Self {
            store,
            lock_timeout,
        }
    }

    /// Creates the pot `name` with its counter initialized to `floor`.
    ///
    /// Concurrent creators of the same name are serialized by a store-side
    /// advisory lock; exactly one observes `Ok`, the rest
    /// `PotError::AlreadyExists`. Creators of distinct names never block
    /// each other. If the initial value insert fails after the entity was
    /// created, the entity is rolled back so the store never retains an
    /// uninitialized pot.
    pub fn create_pot(&self, name: &str, floor: u64) -> Result<(), PotError> {
        validate_pot_name(name)?;

        let _lock = NamedLockGuard::acquire(self.store.as_ref(), name, self.lock_timeout)?;

        match self.store.create_entity(name, floor) {
            Ok(()) => {}
            Err(StoreError::EntityExists(_)) => {
                return Err(PotError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.store.insert_value(name, floor) {
            if let Err(drop_err) = self.store.drop_entity(name) {
                tracing::warn!(
                    pot = name,
                    error = %drop_err,
                    "failed to roll back half-created pot"
                );
            }
            return Err(e.into());
        }

        tracing::info!(pot = name, floor, "created pot");
        Ok(())
    }

    /// Non-mutating existence probe. A pot that was never created is
    /// `Ok(false)`, not an error.
    pub fn exists(&self, name: &str) -> Result<bool, PotError> {
        Ok(self.store.entity_exists(name)?)
    }
}
