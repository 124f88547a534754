//! In-memory progress ledger for download tasks
//!
//! The ledger is the only shared mutable state in audiobox. The dispatcher
//! creates a `Queued` record per submitted URL, the worker pool's progress
//! bridge merges status changes into it, and the HTTP layer reads snapshots.
//!
//! ## Lifecycle rules
//!
//! - Stages only move forward (`Queued -> Starting -> Downloading ->
//!   Processing -> Finished`), or divert to `Failed` from any live stage.
//! - `Finished` and `Failed` records are frozen.
//! - Reads never fail: unknown ids yield a sentinel record.
//!
//! ## Retention
//!
//! Records live for the whole process by default. When a TTL is configured,
//! [`spawn_reaper`] periodically drops terminal records that have not changed
//! for that long.
//!
//! ## Usage
//!
//! ```rust
//! use audiobox::ledger::{ProgressLedger, TaskStatus, TaskUpdate};
//!
//! let ledger = ProgressLedger::new();
//! ledger.create("task-1", "https://example.com/a", TaskStatus::Queued).unwrap();
//! ledger.update("task-1", TaskUpdate::downloading(Some(42))).unwrap();
//! assert_eq!(ledger.get("task-1").progress, 42);
//! ```

pub mod error;
pub mod models;
pub mod pruning;
pub mod store;

pub use error::{LedgerError, Result};
pub use models::{TaskRecord, TaskStatus, TaskUpdate};
pub use pruning::{PruneStats, spawn_reaper};
pub use store::{LedgerStats, ProgressLedger};
