//! Config Persistence Task
//!
//! Periodic write-back flush: every polling interval, the current dirty
//! names are snapshotted and saved concurrently through a host-supplied
//! callback. Each name's outcome is independent; failures stay dirty and
//! are retried next cycle. `stop()` performs one final awaited flush so
//! no dirty config is lost at shutdown.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::Result;
use crate::scheduler::{ScheduleOptions, Scheduler, TimeUnit};

/// Scheduler task id for the periodic persistence sweep.
pub const PERSISTENCE_TASK_ID: &str = "storage:config-polling";

// == Save Callback ==
/// Host callback that persists one config to durable storage.
///
/// On success the engine assumes the value on disk matches the value in
/// memory at call time; writes landing mid-save simply stay dirty and are
/// saved again next cycle.
pub type SaveFn = Arc<
    dyn Fn(String) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

// == Flush Report ==
/// Aggregate outcome of one fan-out flush.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FlushReport {
    /// Configs saved and marked clean
    pub saved: usize,
    /// Configs whose save failed; they remain dirty
    pub failed: usize,
}

// == Persistence Status ==
/// Point-in-time view of the scheduler, for host monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct PersistenceStatus {
    pub is_running: bool,
    pub polling_interval_ms: u64,
    /// Dirty count that stays nonzero is the host's signal that a config
    /// never becomes clean
    pub dirty_count: usize,
}

// == Persistence Scheduler ==
/// Flushes dirty configs from a shared [`CacheStore`] on a schedule.
pub struct PersistenceScheduler {
    cache: Arc<RwLock<CacheStore>>,
    scheduler: Arc<Scheduler>,
    save_fn: SaveFn,
    polling_interval_ms: AtomicU64,
    is_running: AtomicBool,
}

impl PersistenceScheduler {
    // == Constructor ==
    /// Creates a new PersistenceScheduler.
    ///
    /// # Arguments
    /// * `cache` - Shared cache store
    /// * `scheduler` - Shared task scheduler
    /// * `save_fn` - Persist callback invoked per dirty config
    /// * `polling_interval_ms` - Time between flush sweeps
    pub fn new(
        cache: Arc<RwLock<CacheStore>>,
        scheduler: Arc<Scheduler>,
        save_fn: SaveFn,
        polling_interval_ms: u64,
    ) -> Self {
        Self {
            cache,
            scheduler,
            save_fn,
            polling_interval_ms: AtomicU64::new(polling_interval_ms),
            is_running: AtomicBool::new(false),
        }
    }

    // == Start ==
    /// Registers the periodic flush sweep. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.scheduler.is_registered(PERSISTENCE_TASK_ID) {
            debug!("Persistence sweep already scheduled");
            self.is_running.store(true, Ordering::SeqCst);
            return;
        }

        self.register_polling_task();
        self.is_running.store(true, Ordering::SeqCst);
        info!(
            interval_ms = self.polling_interval_ms.load(Ordering::SeqCst),
            "Persistence sweep scheduled"
        );
    }

    // == Stop ==
    /// Unregisters the sweep and performs one final awaited flush so no
    /// dirty config is lost at shutdown. Always completes, even if every
    /// underlying save failed.
    pub async fn stop(&self) {
        self.scheduler.unregister(PERSISTENCE_TASK_ID);
        self.is_running.store(false, Ordering::SeqCst);
        self.force_save().await;
    }

    // == Perform Save ==
    /// One flush sweep: snapshot the dirty names, fan out saves, settle.
    /// A sweep with nothing dirty is a silent no-op.
    pub async fn perform_save(&self) {
        let report = self.flush_dirty().await;
        if report.saved + report.failed > 0 {
            debug!(saved = report.saved, failed = report.failed, "Persistence sweep completed");
        }
    }

    // == Force Save ==
    /// Deterministic, awaited flush for shutdown or explicit "save now".
    /// Logs aggregate counts; callers needing a hard guarantee should
    /// inspect the dirty count afterwards.
    pub async fn force_save(&self) -> FlushReport {
        let report = self.flush_dirty().await;
        if report.saved + report.failed > 0 {
            info!(saved = report.saved, failed = report.failed, "Force save completed");
        }
        report
    }

    // == Set Interval ==
    /// Updates the polling interval. If running, the sweep is immediately
    /// re-registered at the new cadence; an in-flight sweep is not
    /// cancelled.
    pub fn set_interval(self: &Arc<Self>, interval_ms: u64) {
        self.polling_interval_ms.store(interval_ms, Ordering::SeqCst);
        if self.is_running.load(Ordering::SeqCst) {
            self.scheduler.unregister(PERSISTENCE_TASK_ID);
            self.register_polling_task();
            debug!(interval_ms, "Persistence sweep re-registered");
        }
    }

    // == Status ==
    /// Returns the current running state, interval, and dirty count.
    pub async fn get_status(&self) -> PersistenceStatus {
        PersistenceStatus {
            is_running: self.is_running.load(Ordering::SeqCst),
            polling_interval_ms: self.polling_interval_ms.load(Ordering::SeqCst),
            dirty_count: self.cache.read().await.dirty_configs().len(),
        }
    }

    fn register_polling_task(self: &Arc<Self>) {
        let service = Arc::clone(self);
        self.scheduler.register(
            PERSISTENCE_TASK_ID,
            Arc::new(move || {
                let service = Arc::clone(&service);
                Box::pin(async move {
                    service.perform_save().await;
                })
            }),
            ScheduleOptions::every(
                self.polling_interval_ms.load(Ordering::SeqCst),
                TimeUnit::Milliseconds,
            ),
        );
    }

    // == Flush ==
    /// Fan-out-and-settle over a snapshot of the dirty names. Every save
    /// is attempted regardless of the others' outcome; each success
    /// clears that name's dirty flag, each failure is logged and left
    /// dirty for the next cycle.
    ///
    /// The snapshot pairs each name with its version: a write landing
    /// while its save is in flight bumps the version, so the dirty flag
    /// is left set and the newer value is saved again next cycle.
    async fn flush_dirty(&self) -> FlushReport {
        let dirty: Vec<(String, u64)> = {
            let cache = self.cache.read().await;
            cache
                .dirty_configs()
                .into_iter()
                .map(|name| {
                    let version = cache.get_version(&name);
                    (name, version)
                })
                .collect()
        };
        if dirty.is_empty() {
            return FlushReport { saved: 0, failed: 0 };
        }

        let mut saves = JoinSet::new();
        for (name, version) in dirty {
            let save_fn = Arc::clone(&self.save_fn);
            saves.spawn(async move {
                let result = save_fn(name.clone()).await;
                (name, version, result)
            });
        }

        let mut report = FlushReport { saved: 0, failed: 0 };
        while let Some(joined) = saves.join_next().await {
            match joined {
                Ok((name, version, Ok(()))) => {
                    let mut cache = self.cache.write().await;
                    if cache.get_version(&name) == version {
                        cache.clear_dirty(&name);
                    } else {
                        debug!(config = %name, "Config rewritten mid-save, stays dirty");
                    }
                    report.saved += 1;
                }
                Ok((name, _, Err(e))) => {
                    warn!(config = %name, error = %e, "Save failed, config stays dirty");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Save task panicked");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
