//! Typed view over the wrapped CLI's open tool-input dictionaries.
//!
//! Known tools are a closed class with per-variant formatting; anything
//! else falls into `Unknown` and renders its raw JSON. Adding a tool
//! means adding a variant, not a reflection path.

use serde_json::Value;

/// Input of one tool call, decoded from the protocol's `input` object.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    Bash {
        command: String,
    },
    Read {
        file_path: String,
    },
    Write {
        file_path: String,
    },
    Edit {
        file_path: String,
    },
    Glob {
        pattern: String,
    },
    Grep {
        pattern: String,
        path: Option<String>,
    },
    WebSearch {
        query: String,
    },
    WebFetch {
        url: String,
    },
    Task {
        description: String,
    },
    TodoWrite {
        todos: usize,
    },
    AskUserQuestion {
        question: String,
    },
    Unknown {
        name: String,
        raw: Value,
    },
}

fn str_field(input: &Value, key: &str) -> String {
    input
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl ToolInput {
    /// Decode a tool call's input by tool name.
    pub fn from_call(name: &str, input: &Value) -> Self {
        match name {
            "Bash" => ToolInput::Bash {
                command: str_field(input, "command"),
            },
            "Read" => ToolInput::Read {
                file_path: str_field(input, "file_path"),
            },
            "Write" => ToolInput::Write {
                file_path: str_field(input, "file_path"),
            },
            "Edit" => ToolInput::Edit {
                file_path: str_field(input, "file_path"),
            },
            "Glob" => ToolInput::Glob {
                pattern: str_field(input, "pattern"),
            },
            "Grep" => ToolInput::Grep {
                pattern: str_field(input, "pattern"),
                path: input
                    .get("path")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "WebSearch" => ToolInput::WebSearch {
                query: str_field(input, "query"),
            },
            "WebFetch" => ToolInput::WebFetch {
                url: str_field(input, "url"),
            },
            "Task" => ToolInput::Task {
                description: str_field(input, "description"),
            },
            "TodoWrite" => ToolInput::TodoWrite {
                todos: input
                    .get("todos")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or(0),
            },
            "AskUserQuestion" => ToolInput::AskUserQuestion {
                question: str_field(input, "question"),
            },
            other => ToolInput::Unknown {
                name: other.to_string(),
                raw: input.clone(),
            },
        }
    }

    /// Compact `key: value` rendering for outlines and logs.
    pub fn summary(&self) -> String {
        match self {
            ToolInput::Bash { command } => format!("command: {command}"),
            ToolInput::Read { file_path } => format!("file: {file_path}"),
            ToolInput::Write { file_path } => format!("file: {file_path}"),
            ToolInput::Edit { file_path } => format!("file: {file_path}"),
            ToolInput::Glob { pattern } => format!("pattern: {pattern}"),
            ToolInput::Grep {
                pattern,
                path: Some(path),
            } => format!("pattern: {pattern} in {path}"),
            ToolInput::Grep { pattern, path: _ } => format!("pattern: {pattern}"),
            ToolInput::WebSearch { query } => format!("query: {query}"),
            ToolInput::WebFetch { url } => format!("url: {url}"),
            ToolInput::Task { description } => format!("task: {description}"),
            ToolInput::TodoWrite { todos } => format!("todos: {todos}"),
            ToolInput::AskUserQuestion { question } => format!("question: {question}"),
            ToolInput::Unknown { name, raw } => format!("{name}: {raw}"),
        }
    }
}

#[cfg(test)]
#[path = "tool_input_tests.rs"]
mod tests;
