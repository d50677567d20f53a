//! Config hot reload via mtime polling.
//!
//! A change is applied only if the new file validates; a broken edit
//! leaves the running config in force.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::scheduler::Scheduler;

/// Default poll interval for the config file's mtime.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(2);

fn mtime(path: &PathBuf) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Poll the config file and apply valid changes until cancelled.
pub fn spawn_watcher(
    scheduler: Scheduler,
    path: PathBuf,
    interval: Duration,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut last_seen = mtime(&path);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let current = mtime(&path);
            if current.is_none() || current == last_seen {
                continue;
            }
            last_seen = current;

            match SchedulerConfig::load(&path) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), jobs = config.jobs.len(), "config reloaded");
                    scheduler.apply_config(config);
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "config reload failed, keeping previous config"
                    );
                }
            }
        }
    });
}

#[cfg(test)]
#[path = "reload_tests.rs"]
mod tests;
