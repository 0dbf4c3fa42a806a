use std::sync::Arc;

use crate::contracts::{CounterStore, PotError, StoreError};

/// Atomic increment-and-fetch and non-mutating reads for existing pots.
///
/// Holds no locks and no counter state of its own: both operations are a
/// single store round-trip, and all serialization of mutation is the
/// store's row-level atomicity.
pub struct CounterEngine<S: CounterStore> {
    store: Arc<S>,
}

impl<S: CounterStore> CounterEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Advances the pot's counter by exactly 1 and returns the new value.
    ///
    /// No two calls ever observe the same value, and every returned value
    /// is the immediate successor of the previous counter state.
    pub fn increment(&self, name: &str) -> Result<u64, PotError> {
        let value = match self.store.atomic_increment_and_fetch(name) {
            Ok(v) => v,
            Err(StoreError::EntityNotFound(_)) => {
                return Err(PotError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // A post-increment value of 0 means the counter wrapped behind the
        // store's back. The store reports Overflow before that can happen,
        // so treat it as fatal to the operation.
        if value == 0 {
            return Err(StoreError::InvariantViolation(format!(
                "increment of pot {} read back 0",
                name
            ))
            .into());
        }

        Ok(value)
    }

    /// Returns the counter's present value without mutating it. A read
    /// racing an increment may observe either the pre- or post-increment
    /// value; both are valid point-in-time observations.
    pub fn current_value(&self, name: &str) -> Result<u64, PotError> {
        match self.store.read_value(name) {
            Ok(v) => Ok(v),
            Err(StoreError::EntityNotFound(_)) => Err(PotError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
