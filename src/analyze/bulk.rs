//! Rolling-window bulk analyzer.
//!
//! Idle until `analysis_window_secs` have passed since the window started and
//! the rolling corpus has content; then drains the corpus and sends one
//! trend-report request. Every attempt that gets past the window gate clears
//! the corpus and restarts the window, whatever the backend does.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::activity::ActivityLog;
use crate::analyze::backend::AnalysisRequest;
use crate::analyze::dispatch::{Dispatcher, Outcome};
use crate::chunk::truncate_to_tokens;
use crate::config::SettingsHandle;
use crate::corpus::SharedCorpus;
use crate::guard::CycleGuard;
use crate::history::ReplyOrigin;
use crate::prompt::bulk_prompt;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkState {
    Idle,
    Analyzing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    Disabled,
    ShuttingDown,
    /// Another check or analysis holds the analyzer.
    Busy,
    /// Nothing has been appended yet, so no window is running.
    NoContentYet,
    Waiting { remaining_secs: i64 },
    /// Window elapsed with nothing to analyze; window restarted, no request.
    SkippedEmpty,
    Analyzed(Outcome),
}

pub struct BulkAnalyzer {
    corpus: SharedCorpus,
    settings: SettingsHandle,
    dispatcher: Dispatcher,
    log: ActivityLog,
    shutdown: Shutdown,
    guard: CycleGuard,
    /// Held only while a trend-report request is in flight.
    analyzing: CycleGuard,
}

impl BulkAnalyzer {
    pub fn new(
        corpus: SharedCorpus,
        settings: SettingsHandle,
        dispatcher: Dispatcher,
        log: ActivityLog,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            corpus,
            settings,
            dispatcher,
            log,
            shutdown,
            guard: CycleGuard::new(),
            analyzing: CycleGuard::new(),
        }
    }

    pub fn state(&self) -> BulkState {
        if self.analyzing.is_busy() {
            BulkState::Analyzing
        } else {
            BulkState::Idle
        }
    }

    /// Run one gate check at `now`, analyzing if the window has elapsed.
    pub async fn check(&self, now: DateTime<Utc>) -> BulkOutcome {
        if self.shutdown.is_set() {
            return BulkOutcome::ShuttingDown;
        }
        let settings = self.settings.snapshot();
        if !settings.bulk_analysis_enabled {
            return BulkOutcome::Disabled;
        }
        let Some(_in_flight) = self.guard.try_acquire() else {
            self.log.info("Bulk analysis already in progress; skipping check.");
            return BulkOutcome::Busy;
        };

        // Read, clear and restart the window under one lock so an ingest
        // append can not land between the read and the truncation.
        let corpus_text = {
            let mut corpus = self.corpus.lock().await;
            let Some(started) = corpus.window_started_at() else {
                self.log.info("[Analysis Check] rolling corpus has no content yet");
                return BulkOutcome::NoContentYet;
            };

            let window = settings.analysis_window_secs as i64;
            let elapsed = now.signed_duration_since(started).num_seconds().max(0);
            self.log.info(format!("[Analysis Check] window={window}s elapsed={elapsed}s"));
            if elapsed < window {
                let remaining_secs = window - elapsed;
                self.log.info(format!("Next bulk analysis in {remaining_secs}s"));
                return BulkOutcome::Waiting { remaining_secs };
            }

            let text = match corpus.read().await {
                Ok(t) => t,
                Err(e) => {
                    counter!("bulk_corpus_errors_total").increment(1);
                    self.log.warn(format!("Failed reading rolling file: {e:#}"));
                    String::new()
                }
            };
            match corpus.truncate().await {
                Ok(()) => self.log.info("Rolling file cleared for bulk analysis."),
                Err(e) => {
                    counter!("bulk_corpus_errors_total").increment(1);
                    self.log.warn(format!("Failed to clear rolling file: {e:#}"));
                }
            }
            corpus.reset_window(now);
            text
        };

        let text = corpus_text.trim();
        if text.is_empty() {
            self.log.info("Rolling file empty, skipping analysis.");
            return BulkOutcome::SkippedEmpty;
        }

        let text = truncate_to_tokens(text, settings.max_tokens_bulk);
        self.log.info(format!(
            "Performing bulk analysis over rolling file ({} chars)...",
            text.chars().count()
        ));
        let req = AnalysisRequest {
            endpoint: settings.backend_url.clone(),
            model: settings.model.clone(),
            prompt: bulk_prompt(text),
            max_tokens: settings.max_tokens_bulk,
        };
        counter!("bulk_runs_total").increment(1);
        let _analyzing = self.analyzing.try_acquire();
        BulkOutcome::Analyzed(self.dispatcher.dispatch(&req, ReplyOrigin::Bulk).await)
    }
}
