//! Sequential submission of prompts to the backend and fan-out of replies.

use metrics::{counter, histogram};

use crate::activity::ActivityLog;
use crate::analyze::backend::{AnalysisRequest, DynBackend};
use crate::config::Settings;
use crate::history::ReplyOrigin;
use crate::prompt::PromptTemplate;
use crate::shutdown::Shutdown;
use crate::sink::FanOut;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// 200 with no content: dropped without fan-out.
    Empty,
    Failed,
    /// Reply arrived after shutdown started.
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub delivered: usize,
    pub empty: usize,
    pub failed: usize,
    /// Template error or shutdown stopped the remaining chunks.
    pub aborted: bool,
}

fn origin_label(origin: ReplyOrigin) -> String {
    match origin {
        ReplyOrigin::Chunk { index, total } => format!("chunk {index}/{total}"),
        ReplyOrigin::Bulk => "bulk analysis".to_string(),
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    backend: DynBackend,
    fanout: FanOut,
    log: ActivityLog,
    shutdown: Shutdown,
}

impl Dispatcher {
    pub fn new(backend: DynBackend, fanout: FanOut, log: ActivityLog, shutdown: Shutdown) -> Self {
        Self {
            backend,
            fanout,
            log,
            shutdown,
        }
    }

    /// Submit one request and fan out a non-empty reply. Never fails: errors
    /// are logged and reported as [`Outcome::Failed`].
    pub async fn dispatch(&self, req: &AnalysisRequest, origin: ReplyOrigin) -> Outcome {
        let label = origin_label(origin);
        let t0 = std::time::Instant::now();
        let res = self.backend.complete(req).await;
        histogram!("backend_call_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Err(e) => {
                counter!("backend_errors_total").increment(1);
                tracing::warn!(target: "backend", error = ?e, provider = self.backend.name(), %label, "backend call failed");
                self.log.warn(format!("Backend call failed for {label}: {e:#}"));
                Outcome::Failed
            }
            Ok(None) => {
                counter!("backend_empty_total").increment(1);
                tracing::debug!(target: "backend", %label, "empty reply dropped");
                Outcome::Empty
            }
            Ok(Some(reply)) => {
                counter!("backend_replies_total").increment(1);
                if self.fanout.deliver(origin, reply).await {
                    Outcome::Delivered
                } else {
                    Outcome::Discarded
                }
            }
        }
    }

    /// Render and submit each chunk in order. A failed chunk is skipped; a
    /// template error aborts the remaining sends.
    pub async fn dispatch_chunks(
        &self,
        template: &PromptTemplate,
        chunks: &[&str],
        topics: &str,
        settings: &Settings,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let total = chunks.len();

        for (i, chunk) in chunks.iter().enumerate() {
            if self.shutdown.is_set() {
                summary.aborted = true;
                break;
            }
            let prompt = match template.render(chunk, topics) {
                Ok(p) => p,
                Err(e) => {
                    counter!("prompt_template_errors_total").increment(1);
                    self.log.warn(format!("Prompt template error: {e}; send aborted"));
                    summary.aborted = true;
                    break;
                }
            };

            let index = i + 1;
            self.log.info(format!(
                "Sending chunk {index}/{total} ({} chars)...",
                chunk.chars().count()
            ));
            let req = AnalysisRequest {
                endpoint: settings.backend_url.clone(),
                model: settings.model.clone(),
                prompt,
                max_tokens: settings.max_tokens,
            };
            summary.sent += 1;
            match self.dispatch(&req, ReplyOrigin::Chunk { index, total }).await {
                Outcome::Delivered => summary.delivered += 1,
                Outcome::Empty => summary.empty += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Discarded => {
                    summary.aborted = true;
                    break;
                }
            }
        }
        summary
    }
}
