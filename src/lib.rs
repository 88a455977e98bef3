//! dotasks: unattended chores for personal site accounts.
//!
//! Signs in to forums once per day, replies to a forum thread every half
//! hour, watches followed streamers and paid apps, checks forum
//! notifications and crawls image timelines into album exports.
//!
//! # Architecture
//!
//! - **Sites** (`dotasks-sites`): HTTP clients and HTML/JSON extraction
//! - **Store**: revisioned JSON progress store shared by every task
//! - **Tasks**: one function per chore, reporting through a notification sink
//! - **Scheduler**: trigger table, in-flight and startup guards, run history

pub mod config;
pub mod dotasks_dirs;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod tasks;

pub use config::DoTasksConfig;
pub use error::{Result, TaskError};
pub use notify::{Notification, NotificationSink, SharedSink};
pub use scheduler::{Scheduler, TaskRunRecord, Trigger};
pub use store::ProgressStore;
pub use tasks::TaskServices;
