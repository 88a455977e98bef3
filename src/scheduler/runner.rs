//! Scheduler background loop.
//!
//! Fires the startup trigger once, then ticks on a fixed interval and fires
//! the periodic triggers due on each tick. Every job runs in its own tokio
//! task; a job still running from an earlier tick is not started again.
//! Panics are caught at the task boundary and turned into failed runs.

use crate::notify::Notification;
use crate::scheduler::tasks::{
    BuiltinJob, Job, TaskResult, TaskRunOutcome, TaskRunRecord, TickContext, Trigger,
};
use crate::store::StartupRecord;
use crate::tasks::TaskServices;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Number of run-history entries to keep.
const DEFAULT_HISTORY_LIMIT: usize = 400;

struct Registered {
    triggers: Vec<Trigger>,
    job: Arc<dyn Job>,
}

/// Public snapshot of scheduler state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Registered job ids.
    pub jobs: Vec<String>,
    /// Jobs running now.
    pub in_flight: Vec<String>,
    /// Recent run history, oldest first.
    pub history: Vec<TaskRunRecord>,
}

#[derive(Default)]
struct Shared {
    history: VecDeque<TaskRunRecord>,
    in_flight: HashSet<String>,
}

/// Background scheduler.
pub struct Scheduler {
    services: TaskServices,
    jobs: Vec<Registered>,
    shared: Arc<Mutex<Shared>>,
    result_tx: mpsc::UnboundedSender<TaskRunRecord>,
    max_history_entries: usize,
    tick_interval: Duration,
    startup_guard: Duration,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Scheduler {
    /// Create a scheduler with no jobs. Timing comes from the `scheduler`
    /// config section.
    pub fn new(services: TaskServices, result_tx: mpsc::UnboundedSender<TaskRunRecord>) -> Self {
        let config = &services.config.scheduler;
        let tick_interval = Duration::from_secs(config.tick_secs.max(1));
        let startup_guard = Duration::from_secs(config.startup_guard_secs);
        let max_history_entries = if config.history_limit == 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            config.history_limit
        };
        Self {
            services,
            jobs: Vec::new(),
            shared: Arc::new(Mutex::new(Shared::default())),
            result_tx,
            max_history_entries,
            tick_interval,
            startup_guard,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Register every built-in job on its triggers.
    pub fn with_builtin_jobs(mut self) -> Self {
        for trigger in [
            Trigger::Startup,
            Trigger::Minute,
            Trigger::ThreeMinutes,
            Trigger::HalfHour,
        ] {
            for job in BuiltinJob::for_trigger(trigger) {
                self.register(vec![trigger], Arc::new(job));
            }
        }
        self
    }

    /// Register `job` on `triggers`. A job id registered twice is replaced.
    pub fn register(&mut self, triggers: Vec<Trigger>, job: Arc<dyn Job>) {
        let id = job.id();
        if let Some(existing) = self.jobs.iter_mut().find(|r| r.job.id() == id) {
            *existing = Registered { triggers, job };
        } else {
            self.jobs.push(Registered { triggers, job });
        }
    }

    /// Override the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Override the in-memory run-history limit.
    pub fn with_history_limit(mut self, max_entries: usize) -> Self {
        self.max_history_entries = max_entries.max(1);
        self
    }

    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current jobs, in-flight set and history.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let (in_flight, history) = match self.shared.lock() {
            Ok(shared) => (
                shared.in_flight.iter().cloned().collect(),
                shared.history.iter().cloned().collect(),
            ),
            Err(_) => (Vec::new(), Vec::new()),
        };
        SchedulerSnapshot {
            jobs: self.jobs.iter().map(|r| r.job.id()).collect(),
            in_flight,
            history,
        }
    }

    /// Start the background loop. The returned handle completes after
    /// cancellation, once every running job has finished.
    pub fn run(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("scheduler started with {} jobs", self.jobs.len());
            self.fire(Trigger::Startup);

            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            let mut tick: u64 = 0;
            loop {
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    _ = interval.tick() => {
                        tick += 1;
                        for trigger in Trigger::due_at(tick) {
                            self.fire(trigger);
                        }
                    }
                }
            }

            info!("scheduler stopping, waiting for running jobs");
            self.tracker.close();
            self.tracker.wait().await;
            info!("scheduler stopped");
        })
    }

    /// Fire one trigger now. Returns the number of jobs started.
    pub fn fire(&self, trigger: Trigger) -> usize {
        if trigger == Trigger::Startup {
            self.record_startup();
        }
        let ctx = TickContext::new(trigger, self.services.clone());
        let guard_open = ctx.startup_guard_passed(self.startup_guard);
        let mut started = 0;

        for registered in self.jobs.iter().filter(|r| r.triggers.contains(&trigger)) {
            let job = Arc::clone(&registered.job);
            let id = job.id();

            if job.needs_startup_guard() && !guard_open {
                debug!(job = %id, "startup guard not yet passed");
                self.finish(
                    &id,
                    trigger,
                    now_ms(),
                    TaskRunOutcome::Skipped,
                    "startup guard not yet passed".into(),
                );
                continue;
            }
            if !self.claim(&id) {
                debug!(job = %id, "still running from an earlier tick");
                self.finish(
                    &id,
                    trigger,
                    now_ms(),
                    TaskRunOutcome::Skipped,
                    "previous run still in flight".into(),
                );
                continue;
            }

            started += 1;
            let runner = self.runner_handle();
            let ctx = ctx.clone();
            self.tracker.spawn(async move {
                let started_at = now_ms();
                debug!(job = %id, %trigger, "job started");
                let inner = tokio::spawn({
                    let job = Arc::clone(&job);
                    async move { job.run(&ctx).await }
                });
                let (outcome, summary) = match inner.await {
                    Ok(TaskResult::Error(msg)) => {
                        runner.notify_failure(&id, &msg);
                        (TaskRunOutcome::Failed, msg)
                    }
                    Ok(result) => (result.outcome(), result.summary()),
                    Err(e) => {
                        let msg = if e.is_panic() {
                            panic_message(e.into_panic())
                        } else {
                            e.to_string()
                        };
                        error!(job = %id, "job panicked: {msg}");
                        runner.notify_failure(&id, &format!("panicked: {msg}"));
                        (TaskRunOutcome::Panicked, msg)
                    }
                };
                runner.release(&id);
                runner.finish(&id, trigger, started_at, outcome, summary);
            });
        }
        started
    }

    fn record_startup(&self) {
        let record = StartupRecord { startup: now_ms() };
        if let Err(e) = self.services.store.set(&record) {
            error!("cannot record startup time: {e}");
        }
    }

    fn claim(&self, id: &str) -> bool {
        self.runner_handle().claim(id)
    }

    fn finish(
        &self,
        id: &str,
        trigger: Trigger,
        started_at: i64,
        outcome: TaskRunOutcome,
        summary: String,
    ) {
        self.runner_handle()
            .finish(id, trigger, started_at, outcome, summary);
    }

    fn runner_handle(&self) -> RunnerHandle {
        RunnerHandle {
            shared: Arc::clone(&self.shared),
            result_tx: self.result_tx.clone(),
            services: self.services.clone(),
            max_history_entries: self.max_history_entries,
        }
    }
}

/// The part of the scheduler a running job needs to report back.
struct RunnerHandle {
    shared: Arc<Mutex<Shared>>,
    result_tx: mpsc::UnboundedSender<TaskRunRecord>,
    services: TaskServices,
    max_history_entries: usize,
}

impl RunnerHandle {
    fn claim(&self, id: &str) -> bool {
        match self.shared.lock() {
            Ok(mut shared) => shared.in_flight.insert(id.to_owned()),
            Err(_) => false,
        }
    }

    fn release(&self, id: &str) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.in_flight.remove(id);
        }
    }

    fn notify_failure(&self, id: &str, message: &str) {
        self.services.notify(
            Notification::new(format!("[dotasks] {id} 执行失败"), message.to_owned())
                .with_icon("dotasks"),
        );
    }

    fn finish(
        &self,
        id: &str,
        trigger: Trigger,
        started_at: i64,
        outcome: TaskRunOutcome,
        summary: String,
    ) {
        let record = TaskRunRecord {
            task_id: id.to_owned(),
            trigger,
            started_at,
            finished_at: now_ms(),
            outcome,
            summary,
        };
        match outcome {
            TaskRunOutcome::Success | TaskRunOutcome::Skipped => {
                debug!(job = %id, ?outcome, "{}", record.summary);
            }
            TaskRunOutcome::Failed | TaskRunOutcome::Panicked => {
                warn!(job = %id, ?outcome, "{}", record.summary);
            }
        }
        if let Ok(mut shared) = self.shared.lock() {
            shared.history.push_back(record.clone());
            while shared.history.len() > self.max_history_entries {
                shared.history.pop_front();
            }
        }
        if self.result_tx.send(record).is_err() {
            debug!("scheduler result channel closed");
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
