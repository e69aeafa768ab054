// src/ingest/filter.rs
//! Dedup-then-freshness gate for feed entries.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::seen::SeenSet;
use crate::ingest::types::{Entry, Published, RawEntry};

/// Entries published longer ago than this are dropped.
pub const FRESHNESS_WINDOW_SECS: i64 = 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(Entry),
    Duplicate,
    Stale,
}

/// Decide whether `raw` is new and recent enough.
///
/// Dedup runs first and records the GUID even when the entry is then dropped as
/// stale. Entries without any GUID are never treated as duplicates.
pub fn accept(raw: RawEntry, seen: &mut SeenSet, now: DateTime<Utc>) -> Verdict {
    let guid = raw.guid().map(str::to_string);
    match guid.as_deref() {
        Some(g) => {
            if !seen.insert(g, now) {
                return Verdict::Duplicate;
            }
        }
        None => {
            tracing::debug!(target: "ingest", title = ?raw.title, "entry has no id or link; dedup skipped");
        }
    }

    let published = match raw.published {
        Some(s) if !s.trim().is_empty() => match parse_timestamp(&s) {
            Some(at) => Published::At { raw: s, at },
            None => Published::Invalid(s),
        },
        _ => Published::Missing,
    };

    if let Some(at) = published.at() {
        if now.signed_duration_since(at) > Duration::seconds(FRESHNESS_WINDOW_SECS) {
            return Verdict::Stale;
        }
    }

    Verdict::Accepted(Entry {
        guid,
        published,
        title: raw.title.unwrap_or_else(|| "(No title)".to_string()),
        summary: raw.summary.unwrap_or_else(|| "(No summary)".to_string()),
        link: raw.link.unwrap_or_default(),
    })
}

/// Parse a feed timestamp. Offset-less forms are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822).or_else(|_| OffsetDateTime::parse(s, &Rfc3339)) {
        return DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond());
    }
    // chrono also accepts obsolete zone names (EST, PDT, ...).
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%a, %d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
