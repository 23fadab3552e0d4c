//! Cache Eviction Task
//!
//! Periodic sweep that reclaims configs idle beyond a timeout. Each
//! candidate is handed to a host-supplied async callback that persists
//! the config before it is dropped; only after that callback succeeds is
//! the entry removed from the store. Hot names are exempt from the sweep
//! but can still be force-evicted.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{current_timestamp_ms, CacheStore};
use crate::error::Result;
use crate::scheduler::{ScheduleOptions, Scheduler, TimeUnit};

/// Scheduler task id for the periodic eviction sweep.
pub const EVICTION_TASK_ID: &str = "storage:cache-eviction";

// == Evict Callback ==
/// Host callback that persists a config before it is dropped from memory.
///
/// A failure must be returned as an error; the entry then stays cached
/// (and keeps its dirty state) and is retried on the next sweep.
pub type EvictCallback = Arc<
    dyn Fn(String) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

// == Pending Eviction ==
/// Diagnostic view of a config that has crossed the idle threshold.
#[derive(Debug, Clone, Serialize)]
pub struct PendingEviction {
    /// Config name
    pub name: String,
    /// How long the config has been idle, in milliseconds
    pub idle_ms: u64,
}

// == Eviction Manager ==
/// Reclaims idle configs from a shared [`CacheStore`] on a schedule.
pub struct EvictionManager {
    cache: Arc<RwLock<CacheStore>>,
    scheduler: Arc<Scheduler>,
    on_evict: EvictCallback,
    eviction_timeout_ms: u64,
    cleanup_interval_ms: u64,
    /// Caller-owned exemption set; the engine only reads it
    hot_names: Arc<RwLock<HashSet<String>>>,
}

impl EvictionManager {
    // == Constructor ==
    /// Creates a new EvictionManager.
    ///
    /// # Arguments
    /// * `cache` - Shared cache store
    /// * `scheduler` - Shared task scheduler
    /// * `on_evict` - Persist-and-release callback invoked before removal
    /// * `eviction_timeout_ms` - Idle time after which a config is evictable
    /// * `cleanup_interval_ms` - Time between sweeps
    /// * `hot_names` - Names exempt from the periodic sweep
    pub fn new(
        cache: Arc<RwLock<CacheStore>>,
        scheduler: Arc<Scheduler>,
        on_evict: EvictCallback,
        eviction_timeout_ms: u64,
        cleanup_interval_ms: u64,
        hot_names: Arc<RwLock<HashSet<String>>>,
    ) -> Self {
        Self {
            cache,
            scheduler,
            on_evict,
            eviction_timeout_ms,
            cleanup_interval_ms,
            hot_names,
        }
    }

    // == Start Cleanup ==
    /// Registers the periodic eviction sweep. Idempotent: calling twice
    /// does not double-schedule.
    pub fn start_cleanup(self: &Arc<Self>) {
        if self.scheduler.is_registered(EVICTION_TASK_ID) {
            debug!("Eviction sweep already scheduled");
            return;
        }

        let manager = Arc::clone(self);
        self.scheduler.register(
            EVICTION_TASK_ID,
            Arc::new(move || {
                let manager = Arc::clone(&manager);
                Box::pin(async move {
                    let evicted = manager.evict_idle().await;
                    if !evicted.is_empty() {
                        info!("Eviction sweep removed {} idle configs", evicted.len());
                    } else {
                        debug!("Eviction sweep found no idle configs");
                    }
                })
            }),
            ScheduleOptions::every(self.cleanup_interval_ms, TimeUnit::Milliseconds),
        );
        info!(
            interval_ms = self.cleanup_interval_ms,
            timeout_ms = self.eviction_timeout_ms,
            "Eviction sweep scheduled"
        );
    }

    // == Stop Cleanup ==
    /// Unregisters the periodic eviction sweep.
    pub fn stop_cleanup(&self) {
        self.scheduler.unregister(EVICTION_TASK_ID);
    }

    // == Touch ==
    /// Keepalive: re-inserts the config's current data via `set`, which
    /// refreshes its access time (and re-marks it dirty).
    pub async fn touch(&self, name: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        let data = cache.get(name)?;
        cache.set(name, data);
        Ok(())
    }

    // == Manual Evict ==
    /// Runs one idle sweep outside the schedule, returning the names that
    /// were evicted.
    pub async fn manual_evict(&self) -> Vec<String> {
        self.evict_idle().await
    }

    // == Force Evict ==
    /// Evicts a config regardless of idle time, still persisting it via
    /// the eviction callback first. No-op if the name is not cached.
    pub async fn force_evict(&self, name: &str) -> Result<()> {
        let version = {
            let cache = self.cache.read().await;
            if !cache.has(name) {
                return Ok(());
            }
            cache.get_version(name)
        };

        (self.on_evict)(name.to_string()).await?;

        let mut cache = self.cache.write().await;
        if cache.get_version(name) == version {
            cache.evict(name);
            debug!(config = name, "Config force-evicted");
        } else {
            debug!(config = name, "Config rewritten mid-eviction, left cached");
        }
        Ok(())
    }

    // == Pending Evictions ==
    /// Snapshot of configs past the idle threshold, sorted by idle time
    /// descending. Never mutates state.
    pub async fn get_pending_evictions(&self) -> Vec<PendingEviction> {
        let now = current_timestamp_ms();
        let cache = self.cache.read().await;
        let hot = self.hot_names.read().await;

        let mut pending: Vec<PendingEviction> = cache
            .all_names()
            .into_iter()
            .filter(|name| !hot.contains(name))
            .filter_map(|name| {
                let idle_ms = now.saturating_sub(cache.last_access_time(&name)?);
                if idle_ms > self.eviction_timeout_ms {
                    Some(PendingEviction { name, idle_ms })
                } else {
                    None
                }
            })
            .collect();

        pending.sort_by(|a, b| b.idle_ms.cmp(&a.idle_ms));
        pending
    }

    // == Idle Sweep ==
    /// Shared scan for the periodic sweep and `manual_evict`: evict every
    /// non-hot config idle longer than the timeout. Per-name failures are
    /// logged and leave the entry cached for the next sweep.
    ///
    /// Candidates carry their version from the snapshot: a write landing
    /// while `on_evict` is in flight bumps the version, in which case the
    /// entry is left cached (and dirty) instead of being dropped.
    async fn evict_idle(&self) -> Vec<String> {
        let now = current_timestamp_ms();
        let candidates: Vec<(String, u64)> = {
            let cache = self.cache.read().await;
            let hot = self.hot_names.read().await;
            cache
                .all_names()
                .into_iter()
                .filter(|name| !hot.contains(name))
                .filter(|name| {
                    cache
                        .last_access_time(name)
                        .map(|at| now.saturating_sub(at) > self.eviction_timeout_ms)
                        .unwrap_or(false)
                })
                .map(|name| {
                    let version = cache.get_version(&name);
                    (name, version)
                })
                .collect()
        };

        let mut evicted = Vec::new();
        for (name, version) in candidates {
            match (self.on_evict)(name.clone()).await {
                Ok(()) => {
                    let mut cache = self.cache.write().await;
                    if cache.get_version(&name) == version {
                        cache.evict(&name);
                        evicted.push(name);
                    } else {
                        debug!(config = %name, "Config rewritten mid-eviction, left cached");
                    }
                }
                Err(e) => {
                    warn!(config = %name, error = %e, "Eviction callback failed, config stays cached");
                }
            }
        }
        evicted
    }
}
