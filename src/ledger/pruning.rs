/// Retention policy for finished and failed task records
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::models::{TaskRecord, TaskStatus};
use super::store::ProgressLedger;

/// Pruning statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneStats {
    pub finished_pruned: usize,
    pub failed_pruned: usize,
}

impl PruneStats {
    pub fn total(&self) -> usize {
        self.finished_pruned + self.failed_pruned
    }
}

/// Remove terminal records whose last update is older than `ttl` relative to `now`.
///
/// Queued and running tasks are never touched, however old.
pub fn prune_expired(
    tasks: &mut HashMap<String, TaskRecord>,
    ttl: Duration,
    now: DateTime<Utc>,
) -> PruneStats {
    let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
    let mut stats = PruneStats::default();

    tasks.retain(|_, record| {
        if !record.status.is_terminal() {
            return true;
        }
        let expired = now.signed_duration_since(record.updated_at) >= ttl;
        if expired {
            match record.status {
                TaskStatus::Finished => stats.finished_pruned += 1,
                _ => stats.failed_pruned += 1,
            }
        }
        !expired
    });

    stats
}

/// Spawn a background task that prunes the ledger every `interval`
pub fn spawn_reaper(
    ledger: Arc<ProgressLedger>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    info!(?ttl, ?interval, "Starting task record reaper");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so fresh servers don't prune at boot
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let stats = ledger.prune_expired(ttl);
            debug!(pruned = stats.total(), remaining = ledger.len(), "Reaper pass complete");
        }
    })
}
