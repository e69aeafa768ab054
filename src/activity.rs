//! Operator-facing activity log.
//!
//! Bounded, append-only stream of human-readable lines consumed by the UI.
//! Every line is also emitted through `tracing`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_ACTIVITY_CAP: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub ts: DateTime<Utc>,
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ActivityLog {
    inner: Arc<Mutex<VecDeque<LogLine>>>,
    cap: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_CAP)
    }
}

impl ActivityLog {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(cap.min(1024)))),
            cap,
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "sentinel", "{message}");
        self.push(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "sentinel", "{message}");
        self.push(Level::Warn, message);
    }

    fn push(&self, level: Level, message: String) {
        let line = LogLine {
            ts: Utc::now(),
            level,
            message,
        };
        let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.push_back(line);
        while v.len() > self.cap {
            v.pop_front();
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<LogLine> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = v.len().saturating_sub(n);
        v.iter().skip(start).cloned().collect()
    }

    /// True if any retained line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.iter().any(|l| l.message.contains(needle))
    }
}
