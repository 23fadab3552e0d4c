//! Config Cache - a write-back cache for named configuration documents
//!
//! Keeps frequently read, rarely written config documents in memory,
//! tracks which entries are dirty, evicts entries idle beyond a timeout
//! (unless pinned), and flushes dirty entries to durable storage on a
//! schedule, with a guaranteed final flush before shutdown. All disk I/O
//! happens inside host-supplied async callbacks; reads and writes never
//! block on storage.

pub mod cache;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod tasks;

pub use cache::{CacheEntry, CacheStore, DirtyMark};
pub use config::Config;
pub use error::{CacheError, Result};
pub use scheduler::{ScheduleOptions, Scheduler, TimeUnit};
pub use tasks::{
    EvictCallback, EvictionManager, FlushReport, PendingEviction, PersistenceScheduler,
    PersistenceStatus, SaveFn, UpdateDebouncer,
};
