//! Outline extraction: raw stream → ordered step list for history.

use agency_core::{exceeds, preview, ToolInput, PREVIEW_LEN};
use std::collections::HashMap;

use agency_adapters::protocol::{ContentBlock, StreamLine};

use crate::history::{OutlineStep, StepKind};

/// Build the ordered outline from the buffered raw stream.
///
/// Text blocks become `text` steps, tool_use blocks become `tool_call`
/// steps, and tool_result blocks enrich the matching prior tool_call's
/// output preview. A failing result line lands as a trailing `error`
/// step. If the stream held nothing structured, the raw bytes (as one
/// truncated text step) are better than an empty outline.
pub fn extract_steps(raw: &str) -> Vec<OutlineStep> {
    let mut steps: Vec<OutlineStep> = Vec::new();
    // tool_id → index into steps, for result enrichment.
    let mut call_index: HashMap<String, usize> = HashMap::new();
    let mut saw_structured = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<StreamLine>(trimmed) else {
            continue;
        };
        if !matches!(parsed, StreamLine::Other) {
            saw_structured = true;
        }
        match parsed {
            StreamLine::Assistant { message } => {
                for block in message.content {
                    match block {
                        ContentBlock::Text { text } => {
                            let text = text.trim();
                            if text.is_empty() {
                                continue;
                            }
                            steps.push(OutlineStep {
                                kind: StepKind::Text,
                                tool: None,
                                input_preview: None,
                                output_preview: Some(preview(text, PREVIEW_LEN)),
                                truncated: exceeds(text, PREVIEW_LEN),
                            });
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            let summary = ToolInput::from_call(&name, &input).summary();
                            call_index.insert(id, steps.len());
                            steps.push(OutlineStep {
                                kind: StepKind::ToolCall,
                                tool: Some(name),
                                input_preview: Some(preview(&summary, PREVIEW_LEN)),
                                output_preview: None,
                                truncated: exceeds(&summary, PREVIEW_LEN),
                            });
                        }
                        _ => {}
                    }
                }
            }
            StreamLine::User { message } => {
                for block in message.content {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error: _,
                    } = block
                    {
                        let Some(&idx) = call_index.get(&tool_use_id) else {
                            continue;
                        };
                        let text = content.map(|c| c.joined_text()).unwrap_or_default();
                        if let Some(step) = steps.get_mut(idx) {
                            step.output_preview = Some(preview(text.trim(), PREVIEW_LEN));
                        }
                        call_index.remove(&tool_use_id);
                    }
                }
            }
            StreamLine::Result {
                is_error, result, ..
            } => {
                if is_error {
                    let message = result.unwrap_or_default();
                    steps.push(OutlineStep {
                        kind: StepKind::Error,
                        tool: None,
                        input_preview: None,
                        output_preview: Some(preview(message.trim(), PREVIEW_LEN)),
                        truncated: exceeds(message.trim(), PREVIEW_LEN),
                    });
                }
            }
            _ => {}
        }
    }

    if steps.is_empty() && !saw_structured && !raw.trim().is_empty() {
        steps.push(OutlineStep {
            kind: StepKind::Text,
            tool: None,
            input_preview: None,
            output_preview: Some(preview(raw.trim(), PREVIEW_LEN)),
            truncated: exceeds(raw.trim(), PREVIEW_LEN),
        });
    }

    steps
}

#[cfg(test)]
#[path = "outline_tests.rs"]
mod tests;
