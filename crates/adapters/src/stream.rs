//! Line-oriented decoder from raw CLI output to [`ToolEvent`]s.
//!
//! The parser is stateful only for tool-id correlation: a `tool_use`
//! records its id and name so the matching `tool_result` can carry the
//! tool name; the entry is evicted as soon as the result is emitted,
//! and the `Complete` event flushes whatever never resolved.

use agency_core::{RunMetrics, ToolEvent, ToolEventKind};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;

use crate::protocol::{ContentBlock, StreamLine};

/// Maximum accepted line length. Large enough for whole-file tool
/// results; the agent's codec enforces it and surfaces overruns as
/// scanner errors rather than crashes.
pub const MAX_LINE_LEN: usize = 10 * 1024 * 1024;

/// Stateful stream decoder. One instance per task execution.
#[derive(Debug, Default)]
pub struct StreamParser {
    /// tool_id → tool name, for correlating results to calls.
    pending: HashMap<String, String>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one raw line into zero or more events.
    ///
    /// Empty lines and malformed JSON yield no events and no error;
    /// the raw line is preserved elsewhere for debugging.
    pub fn parse_line(&mut self, line: &[u8]) -> Vec<ToolEvent> {
        let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
        if trimmed.iter().all(u8::is_ascii_whitespace) {
            return Vec::new();
        }

        let parsed: StreamLine = match serde_json::from_slice(trimmed) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(error = %err, len = trimmed.len(), "unparseable stream line");
                return Vec::new();
            }
        };

        match parsed {
            StreamLine::System {
                subtype,
                session_id,
                model,
                ..
            } => {
                if subtype.as_deref() != Some("init") {
                    return Vec::new();
                }
                let mut event = ToolEvent::new(ToolEventKind::SessionInit, Utc::now());
                event.input = Some(json!({
                    "session_id": session_id,
                    "model": model,
                }));
                vec![event]
            }
            StreamLine::Assistant { message } => {
                let mut events = Vec::new();
                for block in message.content {
                    match block {
                        ContentBlock::ToolUse { id, name, input } => {
                            self.pending.insert(id.clone(), name.clone());
                            let mut event =
                                ToolEvent::new(ToolEventKind::ToolCall, Utc::now());
                            event.tool_name = Some(name);
                            event.tool_id = Some(id);
                            event.input = Some(input);
                            events.push(event);
                        }
                        ContentBlock::Text { text } => {
                            let mut event =
                                ToolEvent::new(ToolEventKind::TextResponse, Utc::now());
                            event.text_length = Some(text.chars().count());
                            events.push(event);
                        }
                        _ => {}
                    }
                }
                events
            }
            StreamLine::User { message } => {
                let mut events = Vec::new();
                for block in message.content {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } = block
                    {
                        let tool_name = self.pending.remove(&tool_use_id);
                        if tool_name.is_none() {
                            tracing::debug!(tool_id = %tool_use_id, "tool_result for unknown call");
                        }
                        let mut event =
                            ToolEvent::new(ToolEventKind::ToolResult, Utc::now());
                        event.tool_name = tool_name;
                        event.tool_id = Some(tool_use_id);
                        event.output = content.map(|c| c.joined_text());
                        event.is_error = is_error;
                        events.push(event);
                    }
                }
                events
            }
            StreamLine::Result {
                duration_ms,
                num_turns,
                total_cost_usd,
                usage,
                is_error,
                ..
            } => {
                self.pending.clear();
                let usage = usage.unwrap_or_default();
                let mut event = ToolEvent::new(ToolEventKind::Complete, Utc::now());
                event.is_error = is_error;
                event.metrics = Some(RunMetrics {
                    duration_ms: duration_ms.unwrap_or(0),
                    num_turns: num_turns.unwrap_or(0),
                    total_cost_usd: total_cost_usd.unwrap_or(0.0),
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                });
                vec![event]
            }
            StreamLine::Other => Vec::new(),
        }
    }

    /// Number of tool calls still awaiting their result.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
