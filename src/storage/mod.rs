mod rocksdb;

pub use self::rocksdb::RocksDbStore;
