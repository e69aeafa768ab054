//! Bounded reply history and the latest-reply pane.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Matches the operator screen: older replies scroll off after 25.
pub const DEFAULT_HISTORY_CAP: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReplyOrigin {
    Chunk { index: usize, total: usize },
    Bulk,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub origin: ReplyOrigin,
    pub text: String,
}

#[derive(Debug)]
pub struct History {
    inner: Mutex<Vec<HistoryEntry>>,
    cap: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAP)
    }
}

impl History {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, origin: ReplyOrigin, text: &str) {
        let entry = HistoryEntry {
            ts: Utc::now(),
            origin,
            text: text.to_string(),
        };

        let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Most recent reply, replaced wholesale on every delivery.
#[derive(Debug, Default)]
pub struct ReplyPane {
    inner: Mutex<Option<String>>,
}

impl ReplyPane {
    pub fn set(&self, text: &str) {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = Some(text.to_string());
    }

    pub fn get(&self) -> Option<String> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_drops_oldest_beyond_cap() {
        let h = History::with_capacity(3);
        for i in 0..5 {
            h.push(ReplyOrigin::Bulk, &format!("r{i}"));
        }
        let last = h.snapshot_last_n(10);
        assert_eq!(last.len(), 3);
        assert_eq!(last[0].text, "r2");
        assert_eq!(last[2].text, "r4");
    }

    #[test]
    fn reply_pane_keeps_latest() {
        let p = ReplyPane::default();
        assert!(p.get().is_none());
        p.set("a");
        p.set("b");
        assert_eq!(p.get().as_deref(), Some("b"));
    }
}
