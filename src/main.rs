//! feed-sentinel binary entrypoint.
//! Boots the polling pipeline and serves the operator UI routes over Axum.

use std::path::PathBuf;
use std::sync::Arc;

use feed_sentinel::activity::ActivityLog;
use feed_sentinel::analyze::HttpBackend;
use feed_sentinel::config::{state, SettingsHandle};
use feed_sentinel::corpus::{DEFAULT_ROLLING_PATH, ENV_ROLLING_PATH};
use feed_sentinel::ingest::fetch::HttpFeedFetcher;
use feed_sentinel::metrics::Metrics;
use feed_sentinel::notify::{Notifier, WebhookNotifier};
use feed_sentinel::scheduler::spawn_scheduler;
use feed_sentinel::{router, Sentinel, SentinelConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_sentinel=info,sentinel=info,warn"));

    // The Shuttle runtime may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let log = ActivityLog::default();
    let state_path = state::state_path();
    let rolling_path = std::env::var(ENV_ROLLING_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ROLLING_PATH));

    let mut cfg = SentinelConfig::new(rolling_path);
    match state::load(&state_path) {
        Ok(Some(st)) => {
            cfg = cfg.with_persisted(st, &log);
            log.info(format!("App state loaded from {}", state_path.display()));
        }
        Ok(None) => log.info("No saved app state; using defaults."),
        Err(e) => log.warn(format!("Failed to load app state: {e:#}")),
    }
    cfg.settings.apply_env();
    if let Err(e) = cfg.settings.validate() {
        log.warn(format!("Environment overrides rejected: {e:#}"));
        cfg.settings = Default::default();
    }

    let metrics = Metrics::init()?;
    let fetcher = Arc::new(HttpFeedFetcher::new()?);
    let backend = Arc::new(HttpBackend::new()?);

    let hook_log = log.clone();
    let webhook = move |settings: &SettingsHandle| -> Arc<dyn Notifier> {
        Arc::new(WebhookNotifier::new(settings.clone(), hook_log))
    };
    let (sentinel, _sink) = Sentinel::start(cfg, fetcher, backend, webhook, log);

    let _scheduler = spawn_scheduler(sentinel.clone());

    let on_exit = sentinel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_exit.log.info("Shutting down...");
            on_exit.shutdown.trigger();
            let _ = on_exit.save_state(&state_path);
        }
    });

    let app = router(sentinel).merge(metrics.router());
    Ok(app.into())
}
