pub mod webhook;

use anyhow::Result;

pub use webhook::WebhookNotifier;

/// Outbound notification channel for backend replies.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Discards everything; for runs without a notification channel.
pub struct NullNotifier;

#[async_trait::async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}
