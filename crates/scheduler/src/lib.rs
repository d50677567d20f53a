// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agency-scheduler: cron-driven task submitter.
//!
//! Fires jobs at 5-field cron times, routes them through the
//! director's queue when it is reachable, falls back to a direct agent
//! submission otherwise, and hot-reloads its config file without
//! losing per-job runtime state.

pub mod config;
pub mod cron;
pub mod jobs;
pub mod reload;
pub mod scheduler;
pub mod server;
pub mod submit;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{ConfigError, JobSpec, SchedulerConfig};
pub use cron::{CronError, CronExpr};
pub use jobs::{JobSnapshot, LastStatus};
pub use scheduler::Scheduler;
pub use server::{serve, AppState};
pub use submit::{AgentSubmitResult, HttpSubmitter, QueueSubmitResult, Submitter};
