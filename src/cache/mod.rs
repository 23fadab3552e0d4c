//! Cache Module
//!
//! In-memory write-back cache for named configuration documents.

mod entry;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use store::{CacheStore, DirtyMark};
