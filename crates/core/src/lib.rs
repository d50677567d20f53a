// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agency-core: shared vocabulary for the Agency control plane.
//!
//! Ids, tiers, the task and queue state machines, session identity,
//! the provider-agnostic stream event shape, and the HTTP wire DTOs
//! exchanged between director, agents, and the scheduler.

pub mod macros;

pub mod event;
pub mod id;
pub mod queued;
pub mod session;
pub mod task;
pub mod text;
pub mod tool_input;
pub mod wire;

pub use event::{RunMetrics, ToolEvent, ToolEventKind};
pub use id::{QueueId, TaskId};
pub use queued::{QueueState, QueuedTask};
pub use session::{is_safe_session_id, Session, SessionId, SessionIdError, SessionTask};
pub use task::{
    AgentKind, ErrorKind, Task, TaskError, TaskSource, TaskState, Tier, TokenUsage,
    MAX_TURNS_RESUMES,
};
pub use text::{exceeds, preview, PREVIEW_LEN};
pub use tool_input::ToolInput;
pub use wire::{
    AgentConfigInfo, AgentPhase, AgentStatus, ApiError, CallbackPayload, QueueAccepted,
    ShutdownRequest, SubmitRequest, TaskAccepted, TaskPreview, ValidSubmit, ValidationError,
};
