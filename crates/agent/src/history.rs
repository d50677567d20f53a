//! On-disk task history with bounded retention.
//!
//! One JSON outline per task plus an optional raw stream log, both
//! keyed by task id. Writes go through a temp file and rename so a
//! crash never leaves a torn outline. Pruning runs after every save:
//! oldest-by-`completed_at` outlines go first, and an outline takes its
//! debug log with it.

use agency_core::{preview, TaskError, TaskId, TaskState, TokenUsage, PREVIEW_LEN};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Retention: outlines kept on disk.
pub const DEFAULT_MAX_OUTLINES: usize = 100;
/// Retention: raw debug logs kept on disk.
pub const DEFAULT_MAX_DEBUG_LOGS: usize = 20;
/// `List` never returns more than this many entries per page.
pub const MAX_LIST_LIMIT: usize = 100;
/// Page size when the caller does not specify one.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Errors from history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Step type within a task outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Text,
    ToolCall,
    Error,
}

/// One entry of the ordered outline extracted from the raw stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Persisted record of one completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: TaskId,
    pub session_id: String,
    pub state: TaskState,
    pub prompt: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub prompt_preview: String,
    #[serde(default)]
    pub output_preview: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub steps: Vec<OutlineStep>,
    #[serde(default)]
    pub has_debug_log: bool,
}

/// Compact row for `GET /history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub task_id: TaskId,
    pub session_id: String,
    pub state: TaskState,
    pub prompt_preview: String,
    pub output_preview: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    pub has_debug_log: bool,
}

impl From<&HistoryEntry> for HistorySummary {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            task_id: entry.task_id.clone(),
            session_id: entry.session_id.clone(),
            state: entry.state,
            prompt_preview: entry.prompt_preview.clone(),
            output_preview: entry.output_preview.clone(),
            started_at: entry.started_at,
            completed_at: entry.completed_at,
            duration_seconds: entry.duration_seconds,
            exit_code: entry.exit_code,
            error: entry.error.clone(),
            has_debug_log: entry.has_debug_log,
        }
    }
}

/// One page of history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<HistorySummary>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

/// Retention-bounded store of task outlines and raw stream logs.
pub struct HistoryStore {
    dir: PathBuf,
    max_outlines: usize,
    max_debug_logs: usize,
    /// Serializes save/prune so concurrent saves cannot both skip pruning.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        Self::with_limits(dir, DEFAULT_MAX_OUTLINES, DEFAULT_MAX_DEBUG_LOGS)
    }

    pub fn with_limits(
        dir: impl Into<PathBuf>,
        max_outlines: usize,
        max_debug_logs: usize,
    ) -> Result<Self, HistoryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_outlines,
            max_debug_logs,
            write_lock: Mutex::new(()),
        })
    }

    fn outline_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.json"))
    }

    fn debug_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.jsonl"))
    }

    /// Persist an outline, computing previews, then prune.
    pub fn save(&self, mut entry: HistoryEntry) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock();
        entry.prompt_preview = preview(&entry.prompt, PREVIEW_LEN);
        entry.output_preview = entry
            .output
            .as_deref()
            .map(|o| preview(o, PREVIEW_LEN))
            .unwrap_or_default();
        write_json_atomic(&self.outline_path(entry.task_id.as_str()), &entry)?;
        self.prune_locked()
    }

    /// Persist the raw stream. Idempotent; flips `has_debug_log` on the
    /// outline when one exists.
    pub fn save_debug_log(&self, task_id: &TaskId, raw: &[u8]) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock();
        write_atomic(&self.debug_path(task_id.as_str()), raw)?;
        if let Ok(mut entry) = self.read_outline(task_id.as_str()) {
            if !entry.has_debug_log {
                entry.has_debug_log = true;
                write_json_atomic(&self.outline_path(task_id.as_str()), &entry)?;
            }
        }
        self.prune_locked()
    }

    pub fn get(&self, task_id: &str) -> Result<HistoryEntry, HistoryError> {
        self.read_outline(task_id)
    }

    pub fn get_debug_log(&self, task_id: &str) -> Result<Vec<u8>, HistoryError> {
        match std::fs::read(self.debug_path(task_id)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(HistoryError::NotFound(task_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Paginated summaries, newest `completed_at` first. Page numbering
    /// starts at zero; `limit == 0` selects the default page size, and
    /// any limit is clamped to [`MAX_LIST_LIMIT`].
    pub fn list(&self, page: usize, limit: usize) -> Result<HistoryPage, HistoryError> {
        let limit = match limit {
            0 => DEFAULT_LIST_LIMIT,
            n => n.min(MAX_LIST_LIMIT),
        };
        let entries = self.load_sorted()?;
        let total = entries.len();
        let page_entries = entries
            .iter()
            .skip(page.saturating_mul(limit))
            .take(limit)
            .map(HistorySummary::from)
            .collect();
        Ok(HistoryPage {
            entries: page_entries,
            page,
            limit,
            total,
        })
    }

    fn read_outline(&self, task_id: &str) -> Result<HistoryEntry, HistoryError> {
        let path = self.outline_path(task_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(HistoryError::NotFound(task_id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// All outlines sorted by `completed_at` desc. Unreadable files are
    /// skipped with a warning rather than failing the whole listing.
    fn load_sorted(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let mut entries = Vec::new();
        for dirent in std::fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read(&path).map_err(HistoryError::from).and_then(|b| {
                serde_json::from_slice::<HistoryEntry>(&b).map_err(HistoryError::from)
            }) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable history outline");
                }
            }
        }
        entries.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(entries)
    }

    fn prune_locked(&self) -> Result<(), HistoryError> {
        let entries = self.load_sorted()?;

        // Oldest outlines beyond the cap go, debug logs with them.
        for entry in entries.iter().skip(self.max_outlines) {
            let id = entry.task_id.as_str();
            remove_if_exists(&self.outline_path(id))?;
            remove_if_exists(&self.debug_path(id))?;
            tracing::debug!(task_id = id, "pruned history outline");
        }

        // Among surviving outlines, keep only the newest debug logs.
        let mut debug_seen = 0usize;
        for entry in entries.iter().take(self.max_outlines) {
            if !entry.has_debug_log {
                continue;
            }
            debug_seen += 1;
            if debug_seen > self.max_debug_logs {
                let id = entry.task_id.as_str();
                remove_if_exists(&self.debug_path(id))?;
                let mut updated = entry.clone();
                updated.has_debug_log = false;
                write_json_atomic(&self.outline_path(id), &updated)?;
                tracing::debug!(task_id = id, "pruned history debug log");
            }
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Write bytes to `<path>.tmp`, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), HistoryError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    Ok(write_atomic(path, &bytes)?)
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
