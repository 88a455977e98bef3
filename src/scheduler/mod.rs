//! Background task scheduler.
//!
//! Sign-ins run once at startup, the notice check every minute, the
//! anchor and app monitors every three minutes and the forum auto-reply
//! every half hour once the startup guard has passed.

pub mod runner;
pub mod tasks;

pub use runner::{Scheduler, SchedulerSnapshot};
pub use tasks::{
    BuiltinJob, Job, TaskResult, TaskRunOutcome, TaskRunRecord, TickContext, Trigger,
};
