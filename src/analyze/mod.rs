//! Backend analysis: chunk dispatch and the rolling-window bulk analyzer.

pub mod backend;
pub mod bulk;
pub mod dispatch;

pub use backend::{AnalysisRequest, Backend, DynBackend, HttpBackend};
pub use bulk::{BulkAnalyzer, BulkOutcome, BulkState};
pub use dispatch::{DispatchSummary, Dispatcher, Outcome};
