//! Scheduled Tasks Module
//!
//! The engines that ride on the shared scheduler: idle eviction,
//! write-back persistence, and per-key debounced updates.

mod debounce;
mod eviction;
mod persistence;

pub use debounce::UpdateDebouncer;
pub use eviction::{EvictCallback, EvictionManager, PendingEviction, EVICTION_TASK_ID};
pub use persistence::{
    FlushReport, PersistenceScheduler, PersistenceStatus, SaveFn, PERSISTENCE_TASK_ID,
};
