//! Periodic triggers for the fetch cycle and the bulk window check.
//!
//! Each loop re-reads its interval from settings on every tick, so a settings
//! change takes effect after the current sleep. Both loops exit on shutdown.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::app::Sentinel;
use crate::cycle::run_fetch_cycle;

/// Start a fetch cycle in the background. Returns false (and starts nothing)
/// if one is already running or shutdown has begun.
pub fn trigger_fetch(s: &Arc<Sentinel>) -> bool {
    if s.shutdown.is_set() {
        return false;
    }
    let Some(in_flight) = s.fetch_guard.try_acquire() else {
        s.log.info("Fetch already in progress; skipping.");
        metrics::counter!("cycle_skipped_total").increment(1);
        return false;
    };
    let s = s.clone();
    tokio::spawn(async move {
        let _in_flight = in_flight;
        run_fetch_cycle(&s, Utc::now()).await;
    });
    true
}

pub struct SchedulerHandles {
    pub fetch: JoinHandle<()>,
    pub bulk: JoinHandle<()>,
}

/// Spawn the fetch loop (first cycle immediately) and the bulk check loop,
/// which ticks every analysis window.
pub fn spawn_scheduler(s: Arc<Sentinel>) -> SchedulerHandles {
    let fs = s.clone();
    let fetch = tokio::spawn(async move {
        loop {
            trigger_fetch(&fs);
            let interval = fs.settings.snapshot().fetch_interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = fs.shutdown.wait() => break,
            }
        }
        tracing::info!(target: "sentinel", "fetch scheduler stopped");
    });

    let bs = s;
    let bulk = tokio::spawn(async move {
        loop {
            let window = bs.settings.snapshot().analysis_window();
            tokio::select! {
                _ = tokio::time::sleep(window) => {}
                _ = bs.shutdown.wait() => break,
            }
            bs.bulk.check(Utc::now()).await;
        }
        tracing::info!(target: "sentinel", "bulk scheduler stopped");
    });

    SchedulerHandles { fetch, bulk }
}
