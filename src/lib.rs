// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod activity;
pub mod analyze;
pub mod api;
pub mod app;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod cycle;
pub mod guard;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod prompt;
pub mod scheduler;
pub mod shutdown;
pub mod sink;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::app::{Sentinel, SentinelConfig};
