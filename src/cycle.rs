//! One fetch cycle: collect, record to the rolling corpus, give the bulk
//! analyzer a chance, then chunk and dispatch the fresh items.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};

use crate::analyze::{BulkOutcome, DispatchSummary};
use crate::app::Sentinel;
use crate::chunk::{chunk, truncate_to_tokens};
use crate::corpus;
use crate::ingest::collect;
use crate::prompt::topics_string;

#[derive(Debug, Default)]
pub struct CycleReport {
    pub collected: usize,
    pub duplicates: usize,
    pub stale: usize,
    pub sources_failed: usize,
    pub appended: bool,
    pub bulk: Option<BulkOutcome>,
    pub chunks: usize,
    pub dispatch: DispatchSummary,
    pub shutting_down: bool,
}

pub async fn run_fetch_cycle(s: &Sentinel, now: DateTime<Utc>) -> CycleReport {
    let mut report = CycleReport::default();
    if s.shutdown.is_set() {
        report.shutting_down = true;
        return report;
    }
    let t0 = std::time::Instant::now();
    counter!("cycle_runs_total").increment(1);

    let settings = s.settings.snapshot();
    let sources = s.sources();
    s.log.info("Fetching feeds...");

    let collected = collect(
        s.fetcher.as_ref(),
        &sources,
        settings.items_per_feed,
        &s.seen,
        now,
        &s.log,
    )
    .await;
    report.collected = collected.entries.len();
    report.duplicates = collected.duplicates;
    report.stale = collected.stale;
    report.sources_failed = collected.sources_failed;

    let blob = corpus::build(&collected.entries);
    if blob.is_empty() {
        s.log.info("No new items.");
        histogram!("cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        return report;
    }

    if settings.write_rolling_file {
        let mut rolling = s.corpus.lock().await;
        match rolling.append(&blob, now).await {
            Ok(()) => {
                report.appended = true;
                s.log.info(format!(
                    "Appended {} chars to {}",
                    blob.chars().count(),
                    rolling.path().display()
                ));
            }
            Err(e) => s.log.warn(format!("Failed to write rolling file: {e:#}")),
        }
    }

    report.bulk = Some(s.bulk.check(now).await);

    if s.shutdown.is_set() {
        report.shutting_down = true;
        return report;
    }

    let text = truncate_to_tokens(&blob, settings.max_tokens);
    let topics = topics_string(&s.topics());
    s.log.info(format!("Topics sent to backend: {topics}"));

    let chunks = chunk(text, settings.use_chunked_mode, settings.chunk_size_chars);
    report.chunks = chunks.len();
    s.log.info(format!("{} chunk(s) prepared", chunks.len()));

    let template = s.prompt();
    report.dispatch = s
        .dispatcher
        .dispatch_chunks(&template, &chunks, &topics, &settings)
        .await;
    report.shutting_down = s.shutdown.is_set();

    histogram!("cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    report
}
