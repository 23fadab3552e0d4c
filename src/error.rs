//! Error types for the config cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// The engine itself only ever constructs `NotFound`; the save/eviction
/// variants exist for host-supplied persistence callbacks to return, so
/// their failures carry context back through the sweep logs.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Config not found in cache
    #[error("Config not found: {0}")]
    NotFound(String),

    /// Host save callback failed for a config
    #[error("Save failed: {0}")]
    SaveFailed(String),

    /// Host eviction callback failed for a config
    #[error("Eviction failed: {0}")]
    EvictionFailed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
