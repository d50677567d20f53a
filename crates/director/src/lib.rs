// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agency-director: the orchestrator.
//!
//! Hosts the persisted work queue, the authoritative session store, the
//! discovery prober, and the dispatcher that moves pending tasks onto
//! idle agents and tracks their completion callbacks. Two HTTP
//! surfaces: an authenticated external one for users, and a
//! loopback-only internal one for the scheduler and agent callbacks.

pub mod agent_client;
pub mod config;
pub mod director;
pub mod discovery;
pub mod dispatcher;
pub mod queue;
pub mod server;
pub mod sessions;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent_client::{AgentClient, HttpAgentClient, SubmitResult};
pub use config::DirectorConfig;
pub use director::Director;
pub use discovery::{ComponentStatus, Discovery};
pub use dispatcher::{DispatchError, Dispatcher};
pub use queue::{QueueError, WorkQueue};
pub use server::{serve_external, serve_internal, AppState};
pub use sessions::SessionStore;
