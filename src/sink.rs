//! Fan-out of successful backend replies: webhook notification (sent from the
//! cycle task), then an ordered channel into the UI-facing reply pane and
//! history, drained by a single sink task.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::activity::ActivityLog;
use crate::history::{History, ReplyOrigin, ReplyPane};
use crate::notify::Notifier;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Reply { origin: ReplyOrigin, text: String },
}

/// Cycle-side handle of the fan-out.
#[derive(Clone)]
pub struct FanOut {
    tx: mpsc::UnboundedSender<SinkEvent>,
    notifier: Arc<dyn Notifier>,
    shutdown: Shutdown,
    log: ActivityLog,
}

impl FanOut {
    pub fn new(
        tx: mpsc::UnboundedSender<SinkEvent>,
        notifier: Arc<dyn Notifier>,
        shutdown: Shutdown,
        log: ActivityLog,
    ) -> Self {
        Self {
            tx,
            notifier,
            shutdown,
            log,
        }
    }

    /// Deliver one reply. Returns false if it was discarded because of shutdown.
    pub async fn deliver(&self, origin: ReplyOrigin, text: String) -> bool {
        if self.shutdown.is_set() {
            return false;
        }
        if let Err(e) = self.notifier.send(&text).await {
            self.log.warn(format!("Notification error: {e:#}"));
        }
        if self.shutdown.is_set() {
            return false;
        }
        counter!("fanout_replies_total").increment(1);
        self.tx.send(SinkEvent::Reply { origin, text }).is_ok()
    }
}

/// Drain sink events in order into the reply pane and history.
pub fn spawn_sink(
    mut rx: mpsc::UnboundedReceiver<SinkEvent>,
    reply: Arc<ReplyPane>,
    history: Arc<History>,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            if shutdown.is_set() {
                continue;
            }
            match ev {
                SinkEvent::Reply { origin, text } => {
                    reply.set(&text);
                    history.push(origin, &text);
                }
            }
        }
    })
}
