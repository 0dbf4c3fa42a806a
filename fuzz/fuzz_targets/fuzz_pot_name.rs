#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use tempfile::TempDir;

use idpot::engine::CounterEngine;
use idpot::registry::PotRegistry;
use idpot::storage::RocksDbStore;

fuzz_target!(|data: &[u8]| {
    // Fuzz pot names with arbitrary strings
    // This tests handling of special characters, unicode, etc.
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksDbStore::open(dir.path()).unwrap());
    let registry = PotRegistry::new(Arc::clone(&store));
    let engine = CounterEngine::new(store);

    // Convert bytes to string (invalid UTF-8 becomes replacement chars)
    let name = String::from_utf8_lossy(data);

    // Try create with fuzzed pot name - should not panic
    let _ = registry.create_pot(&name, 0);

    // Try existence probe with fuzzed pot name - should not panic
    let _ = registry.exists(&name);

    // Try increment and read with fuzzed pot name - should not panic
    let _ = engine.increment(&name);
    let _ = engine.current_value(&name);
});
