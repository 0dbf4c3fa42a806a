pub mod error;
pub mod store;

pub use error::{PotError, StoreError};
pub use store::CounterStore;
