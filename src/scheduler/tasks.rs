//! Scheduled job definitions, the built-in job table and run records.

use crate::store::StartupRecord;
use crate::tasks::{self, SignInOutcome, TaskServices};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dotasks_sites::SignInSite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// When jobs fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Once when the daemon starts.
    Startup,
    /// Every tick.
    Minute,
    /// Every third tick.
    ThreeMinutes,
    /// Every thirtieth tick.
    HalfHour,
}

impl Trigger {
    /// Periodic triggers due on tick number `tick` (1-based).
    pub fn due_at(tick: u64) -> Vec<Trigger> {
        let mut due = vec![Self::Minute];
        if tick % 3 == 0 {
            due.push(Self::ThreeMinutes);
        }
        if tick % 30 == 0 {
            due.push(Self::HalfHour);
        }
        due
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Minute => "minute",
            Self::ThreeMinutes => "three_minutes",
            Self::HalfHour => "half_hour",
        })
    }
}

/// Outcome of executing a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Job completed with a summary message.
    Success(String),
    /// Job had nothing to do or was not started.
    Skipped(String),
    /// Job failed and has already notified the user.
    Reported(String),
    /// Job failed without notifying; the scheduler notifies.
    Error(String),
}

impl TaskResult {
    pub fn outcome(&self) -> TaskRunOutcome {
        match self {
            Self::Success(_) => TaskRunOutcome::Success,
            Self::Skipped(_) => TaskRunOutcome::Skipped,
            Self::Reported(_) | Self::Error(_) => TaskRunOutcome::Failed,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Success(s) | Self::Skipped(s) | Self::Reported(s) | Self::Error(s) => s.clone(),
        }
    }
}

/// Terminal status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunOutcome {
    Success,
    Skipped,
    Failed,
    Panicked,
}

/// One entry of the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunRecord {
    pub task_id: String,
    pub trigger: Trigger,
    /// Epoch milliseconds.
    pub started_at: i64,
    /// Epoch milliseconds.
    pub finished_at: i64,
    pub outcome: TaskRunOutcome,
    pub summary: String,
}

/// State handed to every job of one tick.
#[derive(Debug, Clone)]
pub struct TickContext {
    pub trigger: Trigger,
    pub now: DateTime<Utc>,
    /// Recorded daemon start, epoch milliseconds.
    pub startup_at: Option<i64>,
    pub services: TaskServices,
}

impl TickContext {
    /// Build a context, reading the recorded startup time from the store.
    pub fn new(trigger: Trigger, services: TaskServices) -> Self {
        let startup_at = match services.store.get::<StartupRecord>() {
            Ok(record) => record.map(|r| r.value.startup),
            Err(e) => {
                tracing::warn!("cannot read startup record: {e}");
                None
            }
        };
        Self {
            trigger,
            now: Utc::now(),
            startup_at,
            services,
        }
    }

    /// Whether at least `guard` has passed since the recorded startup.
    /// Without a record the guard is open.
    pub fn startup_guard_passed(&self, guard: Duration) -> bool {
        let Some(startup) = self.startup_at else {
            return true;
        };
        let elapsed = self.now.timestamp_millis().saturating_sub(startup);
        elapsed >= i64::try_from(guard.as_millis()).unwrap_or(i64::MAX)
    }
}

/// A unit of scheduled work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable id, also the in-flight key.
    fn id(&self) -> String;

    /// Whether the job waits for the startup guard.
    fn needs_startup_guard(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &TickContext) -> TaskResult;
}

/// Built-in jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinJob {
    SignIn(SignInSite),
    Notices,
    Anchors,
    Apps,
    AutoReply,
}

impl BuiltinJob {
    /// The job table: which built-in jobs fire on `trigger`.
    pub fn for_trigger(trigger: Trigger) -> Vec<BuiltinJob> {
        match trigger {
            Trigger::Startup => SignInSite::ALL.into_iter().map(Self::SignIn).collect(),
            Trigger::Minute => vec![Self::Notices],
            Trigger::ThreeMinutes => vec![Self::Anchors, Self::Apps],
            Trigger::HalfHour => vec![Self::AutoReply],
        }
    }

    /// Whether the job's site is enabled in config.
    pub fn enabled(&self, services: &TaskServices) -> bool {
        let sites = &services.config.sites;
        match self {
            Self::SignIn(site) => sites.sign_in(*site).enabled,
            Self::Notices => sites.nodeseek.enabled,
            Self::AutoReply => sites.sht.site.enabled,
            Self::Anchors | Self::Apps => true,
        }
    }
}

#[async_trait]
impl Job for BuiltinJob {
    fn id(&self) -> String {
        match self {
            Self::SignIn(site) => format!("sign_in:{site}"),
            Self::Notices => "notices".into(),
            Self::Anchors => "monitor:anchors".into(),
            Self::Apps => "monitor:apps".into(),
            Self::AutoReply => "auto_reply".into(),
        }
    }

    fn needs_startup_guard(&self) -> bool {
        matches!(self, Self::AutoReply)
    }

    async fn run(&self, ctx: &TickContext) -> TaskResult {
        let services = &ctx.services;
        if !self.enabled(services) {
            return TaskResult::Skipped("disabled in config".into());
        }
        match self {
            Self::SignIn(site) => match tasks::sign_in(services, *site).await {
                Ok(SignInOutcome::Signed(msg)) => TaskResult::Success(msg),
                Ok(SignInOutcome::Skipped) => TaskResult::Skipped("already signed in".into()),
                Err(failure) => TaskResult::Reported(failure.to_string()),
            },
            Self::AutoReply => match tasks::auto_reply(services).await {
                Ok(thread_id) => TaskResult::Success(format!("replied to thread {thread_id}")),
                Err(failure) => TaskResult::Reported(failure.to_string()),
            },
            Self::Notices => match tasks::check_notices(services).await {
                Ok(count) => TaskResult::Success(format!("{count} unread")),
                Err(e) => TaskResult::Reported(e.to_string()),
            },
            Self::Anchors => match tasks::monitor_anchors(services).await {
                Ok(s) => TaskResult::Success(format!(
                    "{} online, {} checked, {} failed",
                    s.active, s.checked, s.failed
                )),
                Err(e) => TaskResult::Error(format!("anchor monitor: {e}")),
            },
            Self::Apps => match tasks::monitor_apps(services).await {
                Ok(s) => TaskResult::Success(format!(
                    "{} free, {} checked, {} failed",
                    s.active, s.checked, s.failed
                )),
                Err(e) => TaskResult::Error(format!("app monitor: {e}")),
            },
        }
    }
}
