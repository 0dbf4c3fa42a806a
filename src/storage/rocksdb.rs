use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use rocksdb::{Options, DB};

use crate::contracts::{CounterStore, StoreError};

/// Key prefix for pot entity markers (holds the floor).
const ENTITY_PREFIX: &str = "pot";
/// Key prefix for counter rows.
const VALUE_PREFIX: &str = "val";

fn entity_key(name: &str) -> String {
    format!("{}:{}", ENTITY_PREFIX, name)
}

fn value_key(name: &str) -> String {
    format!("{}:{}", VALUE_PREFIX, name)
}

/// Advisory named locks: a held-set guarded by a mutex, with a condvar to
/// wake waiters on release. Waiters only spin on their own name, so locks
/// on distinct names never contend beyond the map lookup itself.
struct NamedLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl NamedLocks {
    fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    fn acquire(&self, name: &str, timeout: Duration) -> Result<(), StoreError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        while held.contains(name) {
            if self.released.wait_until(&mut held, deadline).timed_out() {
                return Err(StoreError::LockTimedOut(name.to_string()));
            }
        }
        held.insert(name.to_string());
        Ok(())
    }

    fn release(&self, name: &str) {
        let mut held = self.held.lock();
        if held.remove(name) {
            self.released.notify_all();
        }
    }
}

/// RocksDB-backed counter store.
///
/// Each pot maps to two keys: an entity marker recording the floor, and the
/// counter row holding the current value as 8-byte big-endian. Row-level
/// serialization for increments is provided by a per-pot mutex, so the
/// read-modify-write in `atomic_increment_and_fetch` is one indivisible
/// step from any caller's point of view.
pub struct RocksDbStore {
    db: DB,
    /// Per-pot row mutexes (lock-free concurrent map).
    row_locks: DashMap<String, Arc<Mutex<()>>>,
    named_locks: NamedLocks,
}

impl RocksDbStore {
    /// Opens or creates a counter store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            db,
            row_locks: DashMap::new(),
            named_locks: NamedLocks::new(),
        })
    }

    fn row_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.row_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn get_u64(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let bytes = self
            .db
            .get(key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match bytes {
            None => Ok(None),
            Some(b) => {
                let arr: [u8; 8] = b.as_slice().try_into().map_err(|_| {
                    StoreError::InvariantViolation(format!(
                        "counter row for key {} holds {} bytes, expected 8",
                        key,
                        b.len()
                    ))
                })?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
        }
    }

    fn put_u64(&self, key: &str, value: u64) -> Result<(), StoreError> {
        self.db
            .put(key.as_bytes(), value.to_be_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl CounterStore for RocksDbStore {
    fn create_entity(&self, name: &str, floor: u64) -> Result<(), StoreError> {
        let lock = self.row_lock(name);
        let _guard = lock.lock();

        let exists = self
            .db
            .get(entity_key(name).as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .is_some();
        if exists {
            return Err(StoreError::EntityExists(name.to_string()));
        }

        self.put_u64(&entity_key(name), floor)
    }

    fn insert_value(&self, name: &str, value: u64) -> Result<(), StoreError> {
        let lock = self.row_lock(name);
        let _guard = lock.lock();

        let created = self
            .db
            .get(entity_key(name).as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .is_some();
        if !created {
            return Err(StoreError::EntityNotFound(name.to_string()));
        }

        self.put_u64(&value_key(name), value)
    }

    fn drop_entity(&self, name: &str) -> Result<(), StoreError> {
        let lock = self.row_lock(name);
        let _guard = lock.lock();

        self.db
            .delete(value_key(name).as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.db
            .delete(entity_key(name).as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn entity_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .db
            .get(entity_key(name).as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .is_some())
    }

    fn acquire_named_lock(&self, name: &str, timeout: Duration) -> Result<(), StoreError> {
        self.named_locks.acquire(name, timeout)
    }

    fn release_named_lock(&self, name: &str) -> Result<(), StoreError> {
        self.named_locks.release(name);
        Ok(())
    }

    fn atomic_increment_and_fetch(&self, name: &str) -> Result<u64, StoreError> {
        let lock = self.row_lock(name);
        let _guard = lock.lock();

        let current = self
            .get_u64(&value_key(name))?
            .ok_or_else(|| StoreError::EntityNotFound(name.to_string()))?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::Overflow(name.to_string()))?;

        self.put_u64(&value_key(name), next)?;
        Ok(next)
    }

    fn read_value(&self, name: &str) -> Result<u64, StoreError> {
        self.get_u64(&value_key(name))?
            .ok_or_else(|| StoreError::EntityNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksDbStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        (store, dir)
    }

    // =========================================================================
    // Entity Lifecycle Tests
    // =========================================================================

    #[test]
    fn create_entity_then_exists() {
        let (store, _dir) = create_test_store();
        assert!(!store.entity_exists("orders").unwrap());
        store.create_entity("orders", 0).unwrap();
        assert!(store.entity_exists("orders").unwrap());
    }

    #[test]
    fn duplicate_create_reports_entity_exists() {
        let (store, _dir) = create_test_store();
        store.create_entity("dup", 0).unwrap();
        let err = store.create_entity("dup", 10).unwrap_err();
        assert!(matches!(err, StoreError::EntityExists(_)));
    }

    #[test]
    fn insert_then_read_value() {
        let (store, _dir) = create_test_store();
        store.create_entity("x", 1000).unwrap();
        store.insert_value("x", 1000).unwrap();
        assert_eq!(store.read_value("x").unwrap(), 1000);
    }

    #[test]
    fn insert_without_entity_reports_not_found() {
        let (store, _dir) = create_test_store();
        let err = store.insert_value("ghost", 5).unwrap_err();
        assert!(matches!(err, StoreError::EntityNotFound(_)));
    }

    #[test]
    fn drop_entity_removes_marker_and_row() {
        let (store, _dir) = create_test_store();
        store.create_entity("gone", 0).unwrap();
        store.insert_value("gone", 0).unwrap();
        store.drop_entity("gone").unwrap();
        assert!(!store.entity_exists("gone").unwrap());
        assert!(matches!(
            store.read_value("gone").unwrap_err(),
            StoreError::EntityNotFound(_)
        ));
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            store.create_entity("durable", 7).unwrap();
            store.insert_value("durable", 7).unwrap();
            store.atomic_increment_and_fetch("durable").unwrap();
        }
        let store = RocksDbStore::open(dir.path()).unwrap();
        assert!(store.entity_exists("durable").unwrap());
        assert_eq!(store.read_value("durable").unwrap(), 8);
    }

    // =========================================================================
    // Counter Tests
    // =========================================================================

    #[test]
    fn increment_advances_by_one() {
        let (store, _dir) = create_test_store();
        store.create_entity("seq", 0).unwrap();
        store.insert_value("seq", 0).unwrap();
        assert_eq!(store.atomic_increment_and_fetch("seq").unwrap(), 1);
        assert_eq!(store.atomic_increment_and_fetch("seq").unwrap(), 2);
        assert_eq!(store.atomic_increment_and_fetch("seq").unwrap(), 3);
        assert_eq!(store.read_value("seq").unwrap(), 3);
    }

    #[test]
    fn increment_missing_entity_reports_not_found() {
        let (store, _dir) = create_test_store();
        let err = store.atomic_increment_and_fetch("missing").unwrap_err();
        assert!(matches!(err, StoreError::EntityNotFound(_)));
    }

    #[test]
    fn increment_at_max_reports_overflow() {
        let (store, _dir) = create_test_store();
        store.create_entity("full", u64::MAX).unwrap();
        store.insert_value("full", u64::MAX).unwrap();
        let err = store.atomic_increment_and_fetch("full").unwrap_err();
        assert!(matches!(err, StoreError::Overflow(_)));
        // The failed increment must not disturb the stored value.
        assert_eq!(store.read_value("full").unwrap(), u64::MAX);
    }

    #[test]
    fn read_does_not_mutate() {
        let (store, _dir) = create_test_store();
        store.create_entity("quiet", 42).unwrap();
        store.insert_value("quiet", 42).unwrap();
        for _ in 0..5 {
            assert_eq!(store.read_value("quiet").unwrap(), 42);
        }
    }

    // =========================================================================
    // Named Lock Tests
    // =========================================================================

    #[test]
    fn lock_acquire_and_release() {
        let (store, _dir) = create_test_store();
        store
            .acquire_named_lock("a", Duration::from_millis(100))
            .unwrap();
        store.release_named_lock("a").unwrap();
        // Re-acquire after release must succeed immediately.
        store
            .acquire_named_lock("a", Duration::from_millis(100))
            .unwrap();
        store.release_named_lock("a").unwrap();
    }

    #[test]
    fn held_lock_times_out_second_acquirer() {
        let (store, _dir) = create_test_store();
        store
            .acquire_named_lock("busy", Duration::from_millis(100))
            .unwrap();
        let err = store
            .acquire_named_lock("busy", Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, StoreError::LockTimedOut(_)));
        store.release_named_lock("busy").unwrap();
    }

    #[test]
    fn locks_on_distinct_names_are_independent() {
        let (store, _dir) = create_test_store();
        store
            .acquire_named_lock("left", Duration::from_millis(100))
            .unwrap();
        store
            .acquire_named_lock("right", Duration::from_millis(100))
            .unwrap();
        store.release_named_lock("left").unwrap();
        store.release_named_lock("right").unwrap();
    }

    #[test]
    fn releasing_unheld_lock_is_noop() {
        let (store, _dir) = create_test_store();
        store.release_named_lock("never-held").unwrap();
    }

    #[test]
    fn release_wakes_waiting_acquirer() {
        use std::sync::Arc;
        use std::thread;

        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        store
            .acquire_named_lock("handoff", Duration::from_secs(5))
            .unwrap();

        let waiter = {
            let s = Arc::clone(&store);
            thread::spawn(move || s.acquire_named_lock("handoff", Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(50));
        store.release_named_lock("handoff").unwrap();
        waiter.join().unwrap().unwrap();
        store.release_named_lock("handoff").unwrap();
    }
}
