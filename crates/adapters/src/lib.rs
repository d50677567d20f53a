// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agency-adapters: the seam between Agency and the wrapped CLIs.
//!
//! A [`Runner`] knows how to locate a CLI binary, assemble its argument
//! vector, and read its final result; the [`StreamParser`] decodes the
//! newline-delimited JSON the CLI writes while running into
//! provider-agnostic [`agency_core::ToolEvent`]s.

pub mod claude;
pub mod codex;
pub mod protocol;
pub mod runner;
pub mod stream;

pub use claude::ClaudeRunner;
pub use codex::CodexRunner;
pub use runner::{runner_for, CommandSpec, RunOutcome, Runner, RunnerError};
pub use stream::{StreamParser, MAX_LINE_LEN};
