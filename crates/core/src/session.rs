//! Session identity and the director-held session record.
//!
//! A session id is externally visible and becomes part of a filesystem
//! path on the agent, so it is constrained to a safe character set
//! before anything touches disk.

use crate::id::TaskId;
use crate::task::{TaskSource, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum session id length in bytes.
pub const SESSION_ID_MAX_LEN: usize = 128;

/// Check a session id against the safety rules: non-empty, at most 128
/// bytes, leading ASCII alphanumeric, then only `[A-Za-z0-9._-]`, and
/// never a `..` sequence. Path separators fall out of the character
/// set.
pub fn is_safe_session_id(s: &str) -> bool {
    if s.is_empty() || s.len() > SESSION_ID_MAX_LEN || s.contains("..") {
        return false;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Rejected session id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session_id: {0:?}")]
pub struct SessionIdError(pub String);

/// Validated session identifier.
///
/// Construction goes through [`SessionId::parse`] (or
/// [`SessionId::generate`] for fresh sessions), so holding one implies
/// the safety rules passed. Deserialization re-validates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(s: impl Into<String>) -> Result<Self, SessionIdError> {
        let s = s.into();
        if is_safe_session_id(&s) {
            Ok(Self(s))
        } else {
            Err(SessionIdError(s))
        }
    }

    /// Generate a fresh session id (`ses-` + nanoid). The nanoid
    /// alphabet is a subset of the safe character set.
    pub fn generate() -> Self {
        Self(format!("ses-{}", nanoid::nanoid!(12)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SessionId::parse(s).map_err(serde::de::Error::custom)
    }
}

/// One task as seen from a session's chronological list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTask {
    pub task_id: TaskId,
    pub agent_url: String,
    pub state: TaskState,
    pub prompt_preview: String,
    pub source: TaskSource,
}

/// Director-held session record: the authoritative task list for one
/// continuation handle. The agent's own session knowledge is derivative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub tasks: Vec<SessionTask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
