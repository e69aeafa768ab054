// tests/fetch_cycle.rs
//
// End-to-end fetch cycles over in-memory feeds: dedup across cycles, the
// freshness window, per-feed caps, token truncation, source fault isolation
// and fan-out into history.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};

use feed_sentinel::activity::ActivityLog;
use feed_sentinel::analyze::{AnalysisRequest, Backend};
use feed_sentinel::config::{Settings, SettingsHandle};
use feed_sentinel::cycle::run_fetch_cycle;
use feed_sentinel::ingest::fetch::FixtureFetcher;
use feed_sentinel::notify::{Notifier, NullNotifier};
use feed_sentinel::prompt::PromptTemplate;
use feed_sentinel::{Sentinel, SentinelConfig};

const FEED_A: &str = "https://feeds.example.org/a.rss";
const FEED_B: &str = "https://feeds.example.org/b.atom";
const MISSING: &str = "https://feeds.example.org/gone.rss";

const RSS_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>A</title>
  <item><title>First</title><link>https://a.example/1</link><guid>a1</guid>
    <pubDate>Sun, 01 Mar 2026 10:00:00 +0000</pubDate><description>Flooding reported</description></item>
  <item><title>Second</title><link>https://a.example/2</link><guid>a2</guid>
    <pubDate>Sun, 01 Mar 2026 09:00:00 +0000</pubDate><description>Storm warning</description></item>
  <item><title>Old news</title><link>https://a.example/0</link><guid>a0</guid>
    <pubDate>Thu, 26 Feb 2026 10:00:00 +0000</pubDate><description>Stale</description></item>
</channel></rss>"#;

const ATOM_B: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>B</title>
  <entry><id>urn:b:1</id><title>Quake M4.9</title>
    <link rel="alternate" href="https://b.example/q1"/>
    <updated>2026-03-01T11:30:00Z</updated><summary>Offshore event</summary></entry>
</feed>"#;

struct RecordingBackend {
    prompts: Mutex<Vec<String>>,
}

impl Backend for RecordingBackend {
    fn complete<'a>(
        &'a self,
        req: &'a AnalysisRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move {
            let n = {
                let mut p = self.prompts.lock().unwrap();
                p.push(req.prompt.clone());
                p.len()
            };
            Ok(Some(format!("analysis {n}")))
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct Rig {
    dir: tempfile::TempDir,
    sentinel: Arc<Sentinel>,
    backend: Arc<RecordingBackend>,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn rig(sources: &[&str], settings: Settings, prompt: &str) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = SentinelConfig::new(dir.path().join("rolling.txt"));
    cfg.settings = settings;
    cfg.sources = sources.iter().map(|s| s.to_string()).collect();
    cfg.topics = vec!["floods".into(), "earthquakes".into()];
    cfg.prompt = PromptTemplate::new(prompt);

    let fetcher = Arc::new(
        FixtureFetcher::new()
            .with_feed(FEED_A, RSS_A)
            .with_feed(FEED_B, ATOM_B),
    );
    let backend = Arc::new(RecordingBackend {
        prompts: Mutex::new(Vec::new()),
    });
    let null = |_: &SettingsHandle| -> Arc<dyn Notifier> { Arc::new(NullNotifier) };
    let (sentinel, _sink) =
        Sentinel::start(cfg, fetcher, backend.clone(), null, ActivityLog::default());
    Rig {
        dir,
        sentinel,
        backend,
    }
}

fn unchunked() -> Settings {
    Settings {
        use_chunked_mode: false,
        ..Settings::default()
    }
}

#[tokio::test]
async fn same_guid_is_delivered_once_across_cycles() {
    let r = rig(&[FEED_A, FEED_B], unchunked(), "{CHUNK}");

    let first = run_fetch_cycle(&r.sentinel, now()).await;
    assert_eq!(first.collected, 3);
    assert_eq!(first.stale, 1);
    assert_eq!(first.dispatch.delivered, 1);

    let second = run_fetch_cycle(&r.sentinel, now()).await;
    assert_eq!(second.collected, 0);
    assert_eq!(second.duplicates, 4);
    assert_eq!(second.chunks, 0);
    assert!(r.sentinel.log.contains("No new items."));
    assert_eq!(r.backend.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn stale_entry_never_reaches_the_backend() {
    let r = rig(&[FEED_A], unchunked(), "{CHUNK}");
    run_fetch_cycle(&r.sentinel, now()).await;

    let prompts = r.backend.prompts.lock().unwrap();
    assert!(prompts[0].contains("Title: First"));
    assert!(prompts[0].contains("Title: Second"));
    assert!(!prompts[0].contains("Old news"));
}

#[tokio::test]
async fn items_per_feed_caps_before_filtering() {
    let settings = Settings {
        items_per_feed: 1,
        ..unchunked()
    };
    let r = rig(&[FEED_A], settings, "{CHUNK}");
    let report = run_fetch_cycle(&r.sentinel, now()).await;

    assert_eq!(report.collected, 1);
    let prompts = r.backend.prompts.lock().unwrap();
    assert!(prompts[0].contains("Title: First"));
    assert!(!prompts[0].contains("Title: Second"));
}

#[tokio::test]
async fn max_tokens_truncates_to_one_forty_char_chunk() {
    let settings = Settings {
        max_tokens: 10,
        ..unchunked()
    };
    let r = rig(&[FEED_A], settings, "{CHUNK}");
    let report = run_fetch_cycle(&r.sentinel, now()).await;

    assert_eq!(report.chunks, 1);
    let prompts = r.backend.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].chars().count(), 40);
    assert!(prompts[0].starts_with("Title: First"));
}

#[tokio::test]
async fn chunked_mode_sends_every_piece_in_order() {
    let settings = Settings {
        use_chunked_mode: true,
        chunk_size_chars: 50,
        ..Settings::default()
    };
    let r = rig(&[FEED_A], settings, "{CHUNK}");
    let report = run_fetch_cycle(&r.sentinel, now()).await;

    assert!(report.chunks > 1);
    assert_eq!(report.dispatch.sent, report.chunks);
    let prompts = r.backend.prompts.lock().unwrap();
    assert!(prompts.iter().all(|p| p.chars().count() <= 50));
    assert!(prompts.concat().starts_with("Title: First"));
}

#[tokio::test]
async fn failing_source_is_skipped_and_others_proceed() {
    let r = rig(&[MISSING, FEED_B], unchunked(), "{TOPICS}|{CHUNK}");
    let report = run_fetch_cycle(&r.sentinel, now()).await;

    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.collected, 1);
    assert!(r.sentinel.log.contains(&format!("Error fetching {MISSING}")));
    let prompts = r.backend.prompts.lock().unwrap();
    assert!(prompts[0].starts_with("floods, earthquakes|Title: Quake M4.9"));
}

#[tokio::test]
async fn new_items_are_appended_to_rolling_corpus() {
    let r = rig(&[FEED_B], unchunked(), "{CHUNK}");
    let report = run_fetch_cycle(&r.sentinel, now()).await;
    assert!(report.appended);

    let text = std::fs::read_to_string(r.dir.path().join("rolling.txt")).unwrap();
    assert!(text.contains("Title: Quake M4.9"));
    assert!(text.contains("Link: https://b.example/q1"));
    assert!(text.ends_with("\n\n"));
    assert_eq!(r.sentinel.corpus.lock().await.window_started_at(), Some(now()));
}

#[tokio::test]
async fn replies_land_in_history_and_reply_pane() {
    let r = rig(&[FEED_A], unchunked(), "{CHUNK}");
    run_fetch_cycle(&r.sentinel, now()).await;

    for _ in 0..50 {
        if !r.sentinel.history.is_empty() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    assert_eq!(r.sentinel.history.len(), 1);
    assert_eq!(r.sentinel.reply.get().as_deref(), Some("analysis 1"));
}

#[tokio::test]
async fn cycle_after_shutdown_does_nothing() {
    let r = rig(&[FEED_A], unchunked(), "{CHUNK}");
    r.sentinel.shutdown.trigger();
    let report = run_fetch_cycle(&r.sentinel, now()).await;
    assert!(report.shutting_down);
    assert_eq!(report.collected, 0);
    assert!(r.backend.prompts.lock().unwrap().is_empty());
}
