// src/ingest/seen.rs
//! Bounded set of already-accepted GUIDs.
//!
//! GUIDs are retained for a fixed window (twice the freshness window by
//! default) and the set is capped in size. Anything evicted by age is older
//! than the freshness threshold, so a dated entry cannot come back through
//! the filter; undated entries can, once their GUID has aged out.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

/// 48h: twice the freshness window.
pub const DEFAULT_RETENTION_SECS: i64 = 48 * 3600;
pub const DEFAULT_CAPACITY: usize = 200_000;

/// Fixed-size digest of a GUID, so memory per entry does not depend on GUID length.
type GuidKey = [u8; 16];

fn key_of(guid: &str) -> GuidKey {
    let digest = Sha256::digest(guid.as_bytes());
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

#[derive(Debug)]
pub struct SeenSet {
    retention: Duration,
    capacity: usize,
    keys: HashSet<GuidKey>,
    /// Insertion order with insertion time; front is oldest.
    order: VecDeque<(DateTime<Utc>, GuidKey)>,
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_RETENTION_SECS), DEFAULT_CAPACITY)
    }
}

impl SeenSet {
    /// `capacity` of 0 is treated as 1.
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            retention,
            capacity: capacity.max(1),
            keys: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.keys.contains(&key_of(guid))
    }

    /// Insert `guid` at `now`. Returns `false` if it was already present.
    pub fn insert(&mut self, guid: &str, now: DateTime<Utc>) -> bool {
        self.evict(now);
        let key = key_of(guid);
        if !self.keys.insert(key) {
            return false;
        }
        self.order.push_back((now, key));
        while self.order.len() > self.capacity {
            self.pop_oldest();
        }
        true
    }

    /// Drop GUIDs inserted more than `retention` before `now`.
    pub fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        while let Some(&(ts, _)) = self.order.front() {
            if ts > cutoff {
                break;
            }
            self.pop_oldest();
        }
    }

    fn pop_oldest(&mut self) {
        if let Some((_, key)) = self.order.pop_front() {
            self.keys.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
