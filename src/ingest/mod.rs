// src/ingest/mod.rs
pub mod fetch;
pub mod filter;
pub mod parse;
pub mod seen;
pub mod sources;
pub mod types;

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::activity::ActivityLog;
use crate::ingest::filter::{accept, Verdict};
use crate::ingest::seen::SeenSet;
use crate::ingest::types::{Entry, FeedFetcher};

/// Longest title/summary kept per entry.
const MAX_FIELD_CHARS: usize = 2000;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total entries parsed from feeds.");
        describe_counter!("ingest_kept_total", "Entries accepted by dedup + freshness.");
        describe_counter!("ingest_dedup_total", "Entries dropped as already seen.");
        describe_counter!("ingest_stale_total", "Entries dropped as older than 24h.");
        describe_counter!("ingest_no_guid_total", "Entries without id or link.");
        describe_counter!("ingest_provider_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("ingest_seen_guids", "GUIDs currently retained for dedup.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last ran."
        );
    });
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_FIELD_CHARS {
        out = out.chars().take(MAX_FIELD_CHARS).collect();
    }
    out
}

#[derive(Debug, Default)]
pub struct CollectReport {
    pub entries: Vec<Entry>,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub duplicates: usize,
    pub stale: usize,
}

/// Fetch every source in order and run its first `items_per_feed` entries
/// through the filter. A failing source is logged and skipped.
pub async fn collect(
    fetcher: &dyn FeedFetcher,
    sources: &[String],
    items_per_feed: usize,
    seen: &Mutex<SeenSet>,
    now: DateTime<Utc>,
    log: &ActivityLog,
) -> CollectReport {
    ensure_metrics_described();
    let mut report = CollectReport::default();

    for url in sources {
        let feed = match fetcher.fetch(url).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, url = %url, provider = fetcher.name(), "feed error");
                log.warn(format!("Error fetching {url}: {e:#}"));
                counter!("ingest_provider_errors_total").increment(1);
                report.sources_failed += 1;
                continue;
            }
        };
        report.sources_ok += 1;
        log.info(format!("Checking {url}, {} entries found", feed.entries.len()));

        let mut seen = seen.lock().unwrap_or_else(|p| p.into_inner());
        for raw in feed.entries.into_iter().take(items_per_feed) {
            if raw.guid().is_none() {
                counter!("ingest_no_guid_total").increment(1);
            }
            match accept(raw, &mut seen, now) {
                Verdict::Accepted(entry) => report.entries.push(entry),
                Verdict::Duplicate => report.duplicates += 1,
                Verdict::Stale => report.stale += 1,
            }
        }
        gauge!("ingest_seen_guids").set(seen.len() as f64);
    }

    counter!("ingest_kept_total").increment(report.entries.len() as u64);
    counter!("ingest_dedup_total").increment(report.duplicates as u64);
    counter!("ingest_stale_total").increment(report.stale as u64);
    gauge!("ingest_pipeline_last_run_ts").set(now.timestamp() as f64);

    log.info(format!("Collected {} items", report.entries.len()));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp;<b>world</b></p>\n\n next  ";
        assert_eq!(clean_text(s), "Hello, world next");
    }

    #[test]
    fn clean_text_caps_length() {
        let long = "x".repeat(MAX_FIELD_CHARS + 10);
        assert_eq!(clean_text(&long).chars().count(), MAX_FIELD_CHARS);
    }
}
