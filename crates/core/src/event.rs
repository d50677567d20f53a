//! Provider-agnostic stream events.
//!
//! The stream parser in `agency-adapters` normalizes whatever the
//! wrapped CLI emits into this shape; everything downstream (event
//! logging, history outlines) consumes only these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminator for [`ToolEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEventKind {
    SessionInit,
    ToolCall,
    ToolResult,
    TextResponse,
    Complete,
}

crate::simple_display! {
    ToolEventKind {
        SessionInit => "session_init",
        ToolCall => "tool_call",
        ToolResult => "tool_result",
        TextResponse => "text_response",
        Complete => "complete",
    }
}

/// Run metrics carried only by the `Complete` event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RunMetrics {
    pub duration_ms: u64,
    pub num_turns: u32,
    pub total_cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One normalized event from the wrapped CLI's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    #[serde(rename = "type")]
    pub kind: ToolEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RunMetrics>,
}

impl ToolEvent {
    pub fn new(kind: ToolEventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp,
            tool_name: None,
            tool_id: None,
            input: None,
            output: None,
            is_error: false,
            text_length: None,
            metrics: None,
        }
    }
}
