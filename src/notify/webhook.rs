use std::time::Duration;

use anyhow::{bail, Context, Result};
use metrics::counter;
use reqwest::Client;

use super::Notifier;
use crate::activity::ActivityLog;
use crate::config::SettingsHandle;

/// Posts `{"text": ...}` to the webhook configured in settings (Slack-style).
/// The URL is read on every send so settings changes apply immediately.
pub struct WebhookNotifier {
    settings: SettingsHandle,
    client: Client,
    timeout: Duration,
    log: ActivityLog,
}

impl WebhookNotifier {
    pub fn new(settings: SettingsHandle, log: ActivityLog) -> Self {
        Self {
            settings,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            log,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let url = self.settings.snapshot().notify_webhook_url;
        if url.trim().is_empty() {
            self.log.info("Webhook URL is empty, skipping notification.");
            return Ok(());
        }

        let body = serde_json::json!({ "text": text });
        let resp = match self
            .client
            .post(url.trim())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                counter!("notify_errors_total").increment(1);
                return Err(e).context("webhook post");
            }
        };

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            counter!("notify_errors_total").increment(1);
            let detail = resp.text().await.unwrap_or_default();
            bail!("webhook returned HTTP {}: {}", status.as_u16(), detail.trim());
        }
        counter!("notify_sent_total").increment(1);
        Ok(())
    }
}
