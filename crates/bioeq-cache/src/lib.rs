//! bioeq-cache — time-aware key/value cache for literature records,
//! extractions and whole-query results.

pub mod entry;
pub mod error;
pub mod layer;
pub mod store;

pub use entry::CacheEntry;
pub use error::CacheError;
pub use layer::{CacheConfig, CacheLayer, PurgeReport};
pub use store::CacheStore;
