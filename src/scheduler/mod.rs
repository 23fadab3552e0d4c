//! Task Scheduler Module
//!
//! A named-task registry driving periodic and delayed callbacks from a
//! single timer loop. Consumers register tasks under namespaced string
//! ids; the driver sleeps until the earliest due task and dispatches each
//! callback on its own spawned task, so one slow sweep never delays
//! unrelated tasks.
//!
//! The scheduler is an injected dependency (`Arc<Scheduler>`), not a
//! process-wide singleton: every consumer receives its handle explicitly,
//! which also makes it trivial to drive in tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::cache::current_timestamp_ms;

// == Task Callback ==
/// Callback invoked on each tick of a scheduled task.
///
/// Returns a future the driver awaits before the tick counts as done;
/// a task whose previous tick is still in flight is never re-dispatched.
pub type TaskCallback =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// == Time Unit ==
/// Units accepted for task intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    /// Converts an interval in this unit to milliseconds.
    pub fn to_millis(self, interval: u64) -> u64 {
        match self {
            TimeUnit::Milliseconds => interval,
            TimeUnit::Seconds => interval.saturating_mul(1000),
            TimeUnit::Minutes => interval.saturating_mul(60 * 1000),
            TimeUnit::Hours => interval.saturating_mul(60 * 60 * 1000),
        }
    }
}

// == Schedule Options ==
/// Interval and first-run settings for a registered task.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleOptions {
    /// Execution interval, in `unit`s
    pub interval: u64,
    /// Unit for `interval`
    pub unit: TimeUnit,
    /// Delay before the first run, in milliseconds (default: one interval)
    pub initial_delay_ms: Option<u64>,
    /// Run the first tick immediately instead of waiting
    pub run_immediately: bool,
}

impl ScheduleOptions {
    /// Options for a plain periodic task: first run after one interval.
    pub fn every(interval: u64, unit: TimeUnit) -> Self {
        Self {
            interval,
            unit,
            initial_delay_ms: None,
            run_immediately: false,
        }
    }

    /// Sets an explicit delay before the first run.
    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = Some(delay_ms);
        self
    }
}

// == Scheduled Task ==
struct ScheduledTask {
    callback: TaskCallback,
    interval_ms: u64,
    next_run_ms: u64,
}

#[derive(Default)]
struct SchedulerInner {
    tasks: HashMap<String, ScheduledTask>,
    /// Ids whose current tick has not yet resolved
    active: HashSet<String>,
}

// == Scheduler ==
/// Shared registry of named periodic tasks.
pub struct Scheduler {
    inner: Mutex<SchedulerInner>,
    notify: Notify,
    running: AtomicBool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    // == Constructor ==
    /// Creates a new scheduler with no registered tasks.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SchedulerInner::default()),
            notify: Notify::new(),
            running: AtomicBool::new(false),
        }
    }

    // == Register ==
    /// Registers a task under a unique id.
    ///
    /// Re-registering an existing id overwrites the previous task (with a
    /// warning). A zero interval aborts the registration.
    pub fn register(&self, id: &str, callback: TaskCallback, options: ScheduleOptions) {
        let interval_ms = options.unit.to_millis(options.interval);
        if interval_ms == 0 {
            error!(task_id = id, "Task has an invalid interval of 0ms, registration aborted");
            return;
        }

        let now = current_timestamp_ms();
        let next_run_ms = if options.run_immediately {
            now
        } else {
            match options.initial_delay_ms {
                Some(delay) => now + delay,
                None => now + interval_ms,
            }
        };

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.tasks.contains_key(id) {
                warn!(task_id = id, "Task already registered, overwriting");
            }
            inner.tasks.insert(
                id.to_string(),
                ScheduledTask {
                    callback,
                    interval_ms,
                    next_run_ms,
                },
            );
        }

        debug!(task_id = id, interval_ms, "Task registered");
        self.notify.notify_one();
    }

    // == Unregister ==
    /// Unregisters a task, preventing any future ticks.
    ///
    /// A tick already in flight is not cancelled.
    pub fn unregister(&self, id: &str) {
        let removed = self.inner.lock().unwrap().tasks.remove(id).is_some();
        if removed {
            debug!(task_id = id, "Task unregistered");
            self.notify.notify_one();
        } else {
            warn!(task_id = id, "Attempted to unregister a non-existent task");
        }
    }

    // == Is Registered ==
    /// Checks if a task id is currently registered.
    pub fn is_registered(&self, id: &str) -> bool {
        self.inner.lock().unwrap().tasks.contains_key(id)
    }

    // == Start ==
    /// Starts the driver loop. Safe to call multiple times.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running, skipping start");
            return;
        }
        debug!("Scheduler started");

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.drive().await;
        });
    }

    // == Stop ==
    /// Stops the driver loop. Registered tasks survive and resume on the
    /// next `start()`.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("Scheduler stopped");
            self.notify.notify_one();
        }
    }

    // == Driver ==
    /// Timer loop: dispatch due tasks, sleep until the next deadline or
    /// until a register/unregister/stop wakes us early.
    async fn drive(self: Arc<Self>) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let now = current_timestamp_ms();
            let mut due: Vec<(String, TaskCallback)> = Vec::new();
            let next_wake: Option<u64>;
            {
                let mut inner = self.inner.lock().unwrap();
                let SchedulerInner { tasks, active } = &mut *inner;

                for (id, task) in tasks.iter_mut() {
                    // Re-entrancy guard: at most one in-flight tick per id.
                    // A skipped task is picked up when its tick resolves.
                    if active.contains(id) {
                        continue;
                    }
                    if task.next_run_ms <= now {
                        active.insert(id.clone());
                        task.next_run_ms = now + task.interval_ms;
                        due.push((id.clone(), Arc::clone(&task.callback)));
                    }
                }

                next_wake = tasks
                    .iter()
                    .filter(|(id, _)| !active.contains(*id))
                    .map(|(_, task)| task.next_run_ms)
                    .min();
            }

            for (id, callback) in due {
                let scheduler = Arc::clone(&self);
                tokio::spawn(async move {
                    callback().await;
                    scheduler.inner.lock().unwrap().active.remove(&id);
                    // The task may have come due again while in flight
                    scheduler.notify.notify_one();
                });
            }

            match next_wake {
                Some(deadline) => {
                    let delay = deadline.saturating_sub(current_timestamp_ms());
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }
}
