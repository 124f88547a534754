//! Request and response bodies for the HTTP API.
//!
//! Submission bodies are read as loose JSON (see `services`) so that a
//! batch with a few malformed entries is still accepted. Task records are
//! returned as [`TaskRecord`](crate::ledger::TaskRecord) directly.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::ledger::LedgerStats;
use crate::observability::MetricsSnapshot;

/// `202` body for `POST /api/download`
#[derive(Debug, Serialize, Clone)]
pub struct TaskAcceptedResponse {
    pub task_id: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AcceptedTask {
    pub url: String,
}

/// `202` body for `POST /api/downloads`
#[derive(Debug, Serialize, Clone)]
pub struct BatchAcceptedResponse {
    pub tasks: BTreeMap<String, AcceptedTask>,
}

impl From<BTreeMap<String, String>> for BatchAcceptedResponse {
    fn from(accepted: BTreeMap<String, String>) -> Self {
        Self {
            tasks: accepted
                .into_iter()
                .map(|(task_id, url)| (task_id, AcceptedTask { url }))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
    pub pool_size: usize,
    pub queue_pending: usize,
    pub tasks: LedgerStats,
    pub metrics: MetricsSnapshot,
}
