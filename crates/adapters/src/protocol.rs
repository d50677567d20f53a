//! Raw serde shapes of the wrapped CLI's stream protocol.
//!
//! One JSON object per line. Decoding is deliberately tolerant: unknown
//! `type` discriminators map to [`StreamLine::Other`], unknown content
//! blocks to [`ContentBlock::Other`], and absent fields default, so a
//! protocol addition never breaks an older agent.

use serde::Deserialize;
use serde_json::Value;

/// One line of the stream protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamLine {
    /// `{type:"system", subtype:"init", session_id, model, tools[...]}`
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        tools: Vec<String>,
    },
    /// Assistant turn: text and tool_use content blocks.
    Assistant { message: Message },
    /// User turn: tool_result content blocks fed back to the model.
    User { message: Message },
    /// Trailing result event closing the run.
    Result {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        num_turns: Option<u32>,
        #[serde(default)]
        total_cost_usd: Option<f64>,
        #[serde(default)]
        usage: Option<Usage>,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

/// Message envelope for assistant and user lines.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// One content block within a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<ToolResultContent>,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

/// Tool-result `content`: a bare string or an array of text blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ResultBlock>),
}

/// Entry of a block-form tool result. Non-text entries decode with an
/// empty `text` and are skipped by [`ToolResultContent::joined_text`].
#[derive(Debug, Clone, Deserialize)]
pub struct ResultBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl ToolResultContent {
    /// Concatenate the texts of every text block (or the bare string).
    pub fn joined_text(&self) -> String {
        match self {
            ToolResultContent::Text(s) => s.clone(),
            ToolResultContent::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.kind == "text")
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Token usage object on the result line.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Result subtype that triggers the agent's auto-resume policy.
pub const SUBTYPE_MAX_TURNS: &str = "error_max_turns";

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
