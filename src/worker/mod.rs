//! Extraction worker pool
//!
//! A fixed number of tokio tasks pull jobs from the shared queue and run them
//! through an [`Extractor`](crate::extractor::Extractor). Progress reported by
//! the extractor is folded into the [`ProgressLedger`](crate::ledger::ProgressLedger)
//! by a per-task [`ProgressBridge`]. Jobs beyond the pool size wait in the
//! queue with status `queued`.

mod pool;
mod progress;
mod runner;

pub use pool::{WorkerContext, WorkerPool};
pub use progress::{ProgressBridge, normalize_percent};
pub use runner::run_job;
