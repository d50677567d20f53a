//! Per-session working directories.
//!
//! Every session owns one directory under the agent's `sessions/` root;
//! the session id is validated before it ever reaches a path, so a
//! simple join is safe here.

use agency_core::SessionId;
use std::io;
use std::path::{Path, PathBuf};

/// Path of the session's working directory.
pub fn session_workdir(sessions_dir: &Path, session_id: &SessionId) -> PathBuf {
    sessions_dir.join(session_id.as_str())
}

/// Create the working directory for a task.
///
/// A fresh session purges any stale directory left by an earlier
/// session of the same name; a resumed session keeps it, since the CLI
/// state inside is the whole point of resuming.
pub fn prepare_workdir(
    sessions_dir: &Path,
    session_id: &SessionId,
    resume: bool,
) -> io::Result<PathBuf> {
    let dir = session_workdir(sessions_dir, session_id);
    if !resume && dir.exists() {
        tracing::debug!(session_id = %session_id, dir = %dir.display(), "purging stale session dir");
        std::fs::remove_dir_all(&dir)?;
    }
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Best-effort rename after the CLI reports a different session id.
///
/// The target must not already exist; on any failure the old directory
/// stays in place and the caller keeps using it.
pub fn adopt_workdir(
    sessions_dir: &Path,
    old_id: &SessionId,
    new_id: &SessionId,
) -> Option<PathBuf> {
    let old = session_workdir(sessions_dir, old_id);
    let new = session_workdir(sessions_dir, new_id);
    if new.exists() || !old.exists() {
        return None;
    }
    match std::fs::rename(&old, &new) {
        Ok(()) => Some(new),
        Err(err) => {
            tracing::debug!(error = %err, "could not rename session workdir");
            None
        }
    }
}

#[cfg(test)]
#[path = "workdir_tests.rs"]
mod tests;
