//! Cache Entry Module
//!
//! Defines the structure for individual cached config documents.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

// == Cache Entry ==
/// A cached configuration document with version tracking.
///
/// The payload is an opaque JSON value; the engine never interprets its
/// shape. The version counts in-memory mutations and is used by the host
/// for conflict resolution when the same config can be loaded from disk.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored document
    pub data: Value,
    /// Mutation version, incremented on every `set`
    pub version: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry at the given version.
    pub fn new(data: Value, version: u64) -> Self {
        Self { data, version }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
