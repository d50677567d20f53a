// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agency-agent: single-task-at-a-time worker wrapping a coding CLI.
//!
//! The agent accepts one task over HTTP, runs the wrapped CLI as a
//! subprocess in its own process group, streams its stdout through the
//! stream parser, persists an outline to history, and reports the
//! terminal state back to the director via a completion callback.

pub mod agency_prompt;
pub mod callback;
pub mod config;
pub mod executor;
pub mod history;
pub mod logring;
pub mod outline;
pub mod server;
pub mod workdir;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::AgentConfig;
pub use executor::{ExecError, Executor};
pub use history::{HistoryEntry, HistoryError, HistoryStore, OutlineStep, StepKind};
pub use logring::RingLog;
pub use server::{serve, AppState};
