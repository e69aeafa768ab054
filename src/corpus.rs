//! # Rolling Corpus
//! Per-cycle text blob assembly and the append-only rolling file read by the
//! bulk analyzer.
//!
//! The file and its `window_started_at` clock form one resource; share it as
//! [`SharedCorpus`] so appends, reads and truncation never interleave.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::ingest::types::Entry;

pub const DEFAULT_ROLLING_PATH: &str = "rolling_rss.txt";
pub const ENV_ROLLING_PATH: &str = "SENTINEL_ROLLING_PATH";

pub type SharedCorpus = Arc<tokio::sync::Mutex<RollingCorpus>>;

/// Join entry records with a blank line.
pub fn build(entries: &[Entry]) -> String {
    entries
        .iter()
        .map(Entry::to_record)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug)]
pub struct RollingCorpus {
    path: PathBuf,
    window_started_at: Option<DateTime<Utc>>,
}

impl RollingCorpus {
    /// Open the corpus at `path`. Content left over from a previous run starts
    /// the window at `now`; an empty or missing file leaves it unset until the
    /// first append.
    pub fn open(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let has_content = std::fs::metadata(&path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        Self {
            path,
            window_started_at: has_content.then_some(now),
        }
    }

    pub fn shared(self) -> SharedCorpus {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn window_started_at(&self) -> Option<DateTime<Utc>> {
        self.window_started_at
    }

    /// Append `text` plus a blank line and flush it to disk before returning.
    pub async fn append(&mut self, text: &str, now: DateTime<Utc>) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        f.write_all(format!("{text}\n\n").as_bytes())
            .await
            .with_context(|| format!("appending to {}", self.path.display()))?;
        f.sync_all().await.context("syncing rolling corpus")?;

        if self.window_started_at.is_none() {
            self.window_started_at = Some(now);
        }
        Ok(())
    }

    /// Whole corpus; a missing file reads as empty.
    pub async fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.path).await {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    pub async fn truncate(&mut self) -> Result<()> {
        let f = fs::File::create(&self.path)
            .await
            .with_context(|| format!("truncating {}", self.path.display()))?;
        f.sync_all().await.context("syncing truncated corpus")?;
        Ok(())
    }

    /// Restart the analysis window. Never moves the clock backwards.
    pub fn reset_window(&mut self, now: DateTime<Utc>) {
        self.window_started_at = Some(match self.window_started_at {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Published;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 6, 9, 0, 0).unwrap()
    }

    fn entry(title: &str) -> Entry {
        Entry {
            guid: Some(title.into()),
            published: Published::Missing,
            title: title.into(),
            summary: "s".into(),
            link: "l".into(),
        }
    }

    #[test]
    fn build_joins_records_with_blank_line() {
        let blob = build(&[entry("a"), entry("b")]);
        assert_eq!(
            blob,
            "Title: a\nPublished: (No date)\nSummary: s\nLink: l\n\nTitle: b\nPublished: (No date)\nSummary: s\nLink: l"
        );
        assert_eq!(build(&[]), "");
    }

    #[tokio::test]
    async fn first_append_starts_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = RollingCorpus::open(dir.path().join("rolling.txt"), t0());
        assert!(c.window_started_at().is_none());

        let t1 = t0() + Duration::minutes(7);
        c.append("one", t1).await.unwrap();
        c.append("two", t1 + Duration::minutes(10)).await.unwrap();
        assert_eq!(c.window_started_at(), Some(t1));
        assert_eq!(c.read().await.unwrap(), "one\n\ntwo\n\n");
    }

    #[tokio::test]
    async fn truncate_empties_and_reset_only_moves_forward() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = RollingCorpus::open(dir.path().join("rolling.txt"), t0());
        c.append("x", t0()).await.unwrap();
        c.truncate().await.unwrap();
        assert_eq!(c.read().await.unwrap(), "");

        c.reset_window(t0() + Duration::hours(1));
        c.reset_window(t0());
        assert_eq!(c.window_started_at(), Some(t0() + Duration::hours(1)));
    }

    #[tokio::test]
    async fn leftover_content_starts_window_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("rolling.txt");
        std::fs::write(&p, "from last run\n\n").unwrap();
        let c = RollingCorpus::open(&p, t0());
        assert_eq!(c.window_started_at(), Some(t0()));
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let c = RollingCorpus::open(dir.path().join("none.txt"), t0());
        assert_eq!(c.read().await.unwrap(), "");
    }
}
