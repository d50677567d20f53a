//! Bounded in-memory log buffer behind `GET /logs`.
//!
//! A `tracing` layer formats each event into one line and pushes it
//! into a ring; when full, the oldest line drops and the drop counter
//! advances. Nothing here touches disk.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Default ring capacity in lines.
pub const DEFAULT_RING_CAPACITY: usize = 1_000;

/// One captured log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Ring statistics for `GET /logs/stats`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RingStats {
    pub capacity: usize,
    pub stored: usize,
    pub total: u64,
    pub dropped: u64,
}

struct RingInner {
    lines: VecDeque<LogLine>,
    capacity: usize,
    total: u64,
    dropped: u64,
}

/// Shared handle to the ring buffer.
#[derive(Clone)]
pub struct RingLog {
    inner: Arc<Mutex<RingInner>>,
}

impl RingLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RingInner {
                lines: VecDeque::with_capacity(capacity),
                capacity,
                total: 0,
                dropped: 0,
            })),
        }
    }

    pub fn push(&self, line: LogLine) {
        let mut inner = self.inner.lock();
        if inner.lines.len() == inner.capacity {
            inner.lines.pop_front();
            inner.dropped += 1;
        }
        inner.lines.push_back(line);
        inner.total += 1;
    }

    /// Most recent lines, oldest first, capped at `limit`.
    pub fn tail(&self, limit: usize) -> Vec<LogLine> {
        let inner = self.inner.lock();
        let skip = inner.lines.len().saturating_sub(limit);
        inner.lines.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> RingStats {
        let inner = self.inner.lock();
        RingStats {
            capacity: inner.capacity,
            stored: inner.lines.len(),
            total: inner.total,
            dropped: inner.dropped,
        }
    }

    /// The `tracing` layer feeding this ring.
    pub fn layer(&self) -> RingLayer {
        RingLayer { ring: self.clone() }
    }
}

impl Default for RingLog {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

/// `tracing` layer that renders events into the ring.
pub struct RingLayer {
    ring: RingLog,
}

impl<S: Subscriber> Layer<S> for RingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.ring.push(LogLine {
            timestamp: Utc::now(),
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.rendered,
        });
    }
}

#[derive(Default)]
struct LineVisitor {
    rendered: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let mut msg = format!("{value:?}");
            // Debug-formatting a &str message quotes it; strip that.
            if msg.starts_with('"') && msg.ends_with('"') && msg.len() >= 2 {
                msg = msg[1..msg.len() - 1].to_string();
            }
            if self.rendered.is_empty() {
                self.rendered = msg;
            } else {
                self.rendered = format!("{msg} {}", self.rendered);
            }
        } else {
            let _ = write!(self.rendered, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            if self.rendered.is_empty() {
                self.rendered = value.to_string();
            } else {
                self.rendered = format!("{value} {}", self.rendered);
            }
        } else {
            let _ = write!(self.rendered, " {}={}", field.name(), value);
        }
    }
}

#[cfg(test)]
#[path = "logring_tests.rs"]
mod tests;
