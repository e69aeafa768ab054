// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One item as it came out of the feed document, before any filtering.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    /// `published`, falling back to `updated`; untouched source text.
    pub published: Option<String>,
}

impl RawEntry {
    /// Dedup key: identifier, else link. Blank values count as absent.
    pub fn guid(&self) -> Option<&str> {
        non_blank(self.id.as_deref()).or_else(|| non_blank(self.link.as_deref()))
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// A parsed feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
}

/// Publish time of an accepted entry, as far as it could be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    At { raw: String, at: DateTime<Utc> },
    Invalid(String),
    Missing,
}

impl Published {
    pub fn label(&self) -> &str {
        match self {
            Published::At { raw, .. } => raw,
            Published::Invalid(_) => "(Invalid date)",
            Published::Missing => "(No date)",
        }
    }

    pub fn at(&self) -> Option<DateTime<Utc>> {
        match self {
            Published::At { at, .. } => Some(*at),
            _ => None,
        }
    }
}

/// An entry that passed dedup and freshness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub guid: Option<String>,
    pub published: Published,
    pub title: String,
    pub summary: String,
    pub link: String,
}

impl Entry {
    /// Fixed four-line record used in the cycle blob and the rolling corpus.
    pub fn to_record(&self) -> String {
        format!(
            "Title: {}\nPublished: {}\nSummary: {}\nLink: {}",
            self.title,
            self.published.label(),
            self.summary,
            self.link
        )
    }
}

/// Retrieves and parses one feed URL.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;
    fn name(&self) -> &'static str;
}
