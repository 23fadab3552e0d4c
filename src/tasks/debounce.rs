//! Debounced Update Task
//!
//! Collapses bursts of update requests keyed by an arbitrary id (e.g. a
//! UI widget id) so only the last requested callback within a quiet
//! window executes. Each key gets at most one pending one-shot task; a
//! new request cancels and replaces the pending one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::scheduler::{ScheduleOptions, Scheduler, TimeUnit};

/// Prefix namespacing debounce task ids on the shared scheduler.
const UPDATE_TASK_PREFIX: &str = "widget-update:";

// == Update Debouncer ==
/// Per-key debounced scheduling on a shared [`Scheduler`].
pub struct UpdateDebouncer {
    scheduler: Arc<Scheduler>,
    /// Generation per pending key; guards the replace-vs-fire race
    pending: Arc<Mutex<HashMap<String, u64>>>,
    debounce_window_ms: u64,
}

impl UpdateDebouncer {
    // == Constructor ==
    /// Creates a new debouncer with the given quiet window.
    pub fn new(scheduler: Arc<Scheduler>, debounce_window_ms: u64) -> Self {
        Self {
            scheduler,
            pending: Arc::new(Mutex::new(HashMap::new())),
            debounce_window_ms,
        }
    }

    // == Schedule Update ==
    /// Schedules `callback` to run after the quiet window.
    ///
    /// Cancel-and-replace semantics: if an update is already pending for
    /// `key`, it is dropped and only this latest callback can fire. The
    /// one-shot task unregisters itself and clears its pending entry when
    /// it runs.
    pub fn schedule_update<F>(&self, key: &str, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let task_id = format!("{}{}", UPDATE_TASK_PREFIX, key);

        let generation = {
            let mut pending = self.pending.lock().unwrap();
            let slot = pending.entry(key.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };

        if self.scheduler.is_registered(&task_id) {
            debug!(key, "Replacing pending update");
            self.scheduler.unregister(&task_id);
        }

        let callback = Arc::new(Mutex::new(Some(Box::new(callback) as Box<dyn FnOnce() + Send>)));
        let scheduler = Arc::clone(&self.scheduler);
        let pending = Arc::clone(&self.pending);
        let key = key.to_string();
        let fire_task_id = task_id.clone();

        self.scheduler.register(
            &task_id,
            Arc::new(move || {
                let callback = Arc::clone(&callback);
                let scheduler = Arc::clone(&scheduler);
                let pending = Arc::clone(&pending);
                let key = key.clone();
                let task_id = fire_task_id.clone();
                Box::pin(async move {
                    // Generation check and callback take commit together:
                    // a replacement either lands before the check (this
                    // tick bails) or after the take (it finds the slot
                    // empty), never in between.
                    let run = {
                        let pending = pending.lock().unwrap();
                        if pending.get(&key) != Some(&generation) {
                            return;
                        }
                        callback.lock().unwrap().take()
                    };
                    if let Some(run) = run {
                        run();
                    }
                    let remove = {
                        let mut pending = pending.lock().unwrap();
                        if pending.get(&key) == Some(&generation) {
                            pending.remove(&key);
                            true
                        } else {
                            false
                        }
                    };
                    if remove {
                        scheduler.unregister(&task_id);
                    }
                })
            }),
            ScheduleOptions::every(self.debounce_window_ms, TimeUnit::Milliseconds)
                .with_initial_delay(self.debounce_window_ms),
        );
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_update_fires_once() {
        let scheduler = Arc::new(Scheduler::new());
        let debouncer = UpdateDebouncer::new(Arc::clone(&scheduler), 30);
        let fired = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&fired);
        debouncer.schedule_update("w1", move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // Self-cleaning: the one-shot unregistered itself
        assert!(!scheduler.is_registered("widget-update:w1"));
    }

    #[tokio::test]
    async fn test_rapid_updates_collapse_to_last() {
        let scheduler = Arc::new(Scheduler::new());
        let debouncer = UpdateDebouncer::new(Arc::clone(&scheduler), 50);
        let executions = Arc::new(Mutex::new(Vec::new()));
        scheduler.start();

        for i in 0..5 {
            let log = Arc::clone(&executions);
            debouncer.schedule_update("w1", move || {
                log.lock().unwrap().push(i);
            });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.stop();

        // Exactly one invocation, and it is the last supplied callback
        assert_eq!(executions.lock().unwrap().as_slice(), &[4]);
    }

    #[tokio::test]
    async fn test_independent_keys_do_not_interfere() {
        let scheduler = Arc::new(Scheduler::new());
        let debouncer = UpdateDebouncer::new(Arc::clone(&scheduler), 30);
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.start();

        for key in ["w1", "w2", "w3"] {
            let f = Arc::clone(&fired);
            debouncer.schedule_update(key, move || {
                f.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop();

        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reschedule_after_fire_runs_again() {
        let scheduler = Arc::new(Scheduler::new());
        let debouncer = UpdateDebouncer::new(Arc::clone(&scheduler), 20);
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.start();

        let f = Arc::clone(&fired);
        debouncer.schedule_update("w1", move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let f = Arc::clone(&fired);
        debouncer.schedule_update("w1", move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop();

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replacement_at_window_boundary_never_double_fires() {
        let scheduler = Arc::new(Scheduler::new());
        let debouncer = UpdateDebouncer::new(Arc::clone(&scheduler), 10);
        let executions = Arc::new(Mutex::new(Vec::new()));
        scheduler.start();

        // Reschedule right at the quiet-window boundary, repeatedly, so
        // replacements race ticks already in flight
        for i in 0..25 {
            let log = Arc::clone(&executions);
            debouncer.schedule_update("w1", move || {
                log.lock().unwrap().push(i);
            });
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop();

        // Each fired callback ran exactly once, in order, and the last
        // scheduled one always ran
        let log = executions.lock().unwrap();
        let mut deduped = log.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(*log, deduped);
        assert_eq!(log.last(), Some(&24));
    }

    #[tokio::test]
    async fn test_at_most_one_pending_task_per_key() {
        let scheduler = Arc::new(Scheduler::new());
        let debouncer = UpdateDebouncer::new(Arc::clone(&scheduler), 60_000);

        debouncer.schedule_update("w1", || {});
        debouncer.schedule_update("w1", || {});
        debouncer.schedule_update("w1", || {});

        assert!(scheduler.is_registered("widget-update:w1"));
        assert_eq!(debouncer.pending.lock().unwrap().len(), 1);
    }
}
