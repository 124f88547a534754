use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::error::{LedgerError, Result};
use super::models::{TaskRecord, TaskStatus, TaskUpdate};
use super::pruning::{PruneStats, prune_expired};

/// In-memory store of task status records.
///
/// One coarse lock guards the whole map. Every critical section is a short
/// synchronous field merge, so the lock is never held across an `.await`
/// and is safe to take from progress callbacks running on worker tasks.
#[derive(Debug, Default)]
pub struct ProgressLedger {
    tasks: RwLock<HashMap<String, TaskRecord>>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record for `task_id`
    pub fn create(
        &self,
        task_id: &str,
        url: &str,
        initial_status: TaskStatus,
    ) -> Result<TaskRecord> {
        let mut tasks = self.write();
        if tasks.contains_key(task_id) {
            return Err(LedgerError::DuplicateTask(task_id.to_string()));
        }

        let record = TaskRecord::new(task_id, url, initial_status);
        tasks.insert(task_id.to_string(), record.clone());
        debug!(task_id, status = %initial_status, "Created task record");
        Ok(record)
    }

    /// Merge `update` into the record for `task_id` and return the result.
    ///
    /// Terminal records are frozen and status never moves backwards, except
    /// into `Failed`. While downloading, progress only grows; entering
    /// `Processing` or `Finished` pins it to 100 and entering `Failed`
    /// keeps the last known value.
    pub fn update(&self, task_id: &str, update: TaskUpdate) -> Result<TaskRecord> {
        let mut tasks = self.write();
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| LedgerError::UnknownTask(task_id.to_string()))?;

        if record.status.is_terminal() {
            return Err(LedgerError::TerminalTask {
                task_id: task_id.to_string(),
                status: record.status,
            });
        }

        let next = update.status.unwrap_or(record.status);
        if !record.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                task_id: task_id.to_string(),
                from: record.status,
                to: next,
            });
        }

        let requested = update.progress.map(|p| p.min(100));
        record.progress = match next {
            TaskStatus::Processing | TaskStatus::Finished => 100,
            TaskStatus::Failed => record.progress,
            TaskStatus::Downloading if record.status == TaskStatus::Downloading => {
                requested.map_or(record.progress, |p| p.max(record.progress))
            }
            _ => requested.unwrap_or(record.progress),
        };

        if next == TaskStatus::Downloading {
            if update.speed.is_some() {
                record.speed = update.speed;
            }
            if update.eta.is_some() {
                record.eta = update.eta;
            }
        } else {
            record.speed = None;
            record.eta = None;
        }

        match next {
            TaskStatus::Finished => record.filename = update.filename,
            TaskStatus::Failed => {
                record.error = Some(update.error.unwrap_or_else(|| "unknown error".to_string()))
            }
            _ => {}
        }

        record.status = next;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// Snapshot of one record, or the unknown sentinel
    pub fn get(&self, task_id: &str) -> TaskRecord {
        self.try_get(task_id)
            .unwrap_or_else(|| TaskRecord::unknown(task_id))
    }

    pub fn try_get(&self, task_id: &str) -> Option<TaskRecord> {
        self.read().get(task_id).cloned()
    }

    /// Snapshot of every record, keyed by task id.
    ///
    /// Task ids are UUIDv7 so the ordered map lists tasks in submission order.
    pub fn get_all(&self) -> BTreeMap<String, TaskRecord> {
        self.read()
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop terminal records that have not changed for `ttl`
    pub fn prune_expired(&self, ttl: Duration) -> PruneStats {
        let stats = prune_expired(&mut self.write(), ttl, Utc::now());
        if stats.total() > 0 {
            info!(
                finished = stats.finished_pruned,
                failed = stats.failed_pruned,
                "Pruned expired task records"
            );
        }
        stats
    }

    /// Count records per lifecycle stage (for health reporting)
    pub fn stats(&self) -> LedgerStats {
        let tasks = self.read();
        let mut stats = LedgerStats {
            total: tasks.len(),
            ..Default::default()
        };

        for record in tasks.values() {
            match record.status {
                TaskStatus::Queued => stats.queued += 1,
                TaskStatus::Finished => stats.finished += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Starting | TaskStatus::Downloading | TaskStatus::Processing => {
                    stats.active += 1
                }
                TaskStatus::Unknown => {}
            }
        }

        stats
    }

    // A panic while holding the lock cannot leave a half-merged record
    // behind: every mutation above completes before the guard drops.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TaskRecord>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TaskRecord>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total: usize,
    pub queued: usize,
    pub active: usize,
    pub finished: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ledger_with(task_id: &str) -> ProgressLedger {
        let ledger = ProgressLedger::new();
        ledger
            .create(task_id, "https://example.com/a", TaskStatus::Queued)
            .unwrap();
        ledger
    }

    #[test]
    fn test_create_and_get() {
        let ledger = ledger_with("t1");

        let record = ledger.get("t1");
        assert_eq!(record.status, TaskStatus::Queued);
        assert_eq!(record.progress, 0);
        assert_eq!(record.url, "https://example.com/a");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_create_duplicate() {
        let ledger = ledger_with("t1");
        let err = ledger.create("t1", "other", TaskStatus::Queued).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateTask("t1".to_string()));
        assert_eq!(ledger.get("t1").url, "https://example.com/a");
    }

    #[test]
    fn test_get_unknown_returns_sentinel() {
        let ledger = ProgressLedger::new();
        let record = ledger.get("nope");
        assert!(record.is_unknown());
        assert_eq!(record.progress, 0);
        assert!(ledger.try_get("nope").is_none());
    }

    #[test]
    fn test_update_unknown_task() {
        let ledger = ProgressLedger::new();
        let err = ledger.update("ghost", TaskUpdate::starting()).unwrap_err();
        assert_eq!(err, LedgerError::UnknownTask("ghost".to_string()));
    }

    #[test]
    fn test_full_lifecycle() {
        let ledger = ledger_with("t1");

        ledger.update("t1", TaskUpdate::starting()).unwrap();
        let record = ledger.update("t1", TaskUpdate::downloading(Some(42))).unwrap();
        assert_eq!(record.status, TaskStatus::Downloading);
        assert_eq!(record.progress, 42);

        let record = ledger.update("t1", TaskUpdate::processing()).unwrap();
        assert_eq!(record.progress, 100);

        let record = ledger.update("t1", TaskUpdate::finished("song.mp3")).unwrap();
        assert_eq!(record.status, TaskStatus::Finished);
        assert_eq!(record.progress, 100);
        assert_eq!(record.filename.as_deref(), Some("song.mp3"));
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_download_progress_never_decreases() {
        let ledger = ledger_with("t1");
        ledger.update("t1", TaskUpdate::downloading(Some(60))).unwrap();

        let record = ledger.update("t1", TaskUpdate::downloading(Some(20))).unwrap();
        assert_eq!(record.progress, 60);

        let record = ledger.update("t1", TaskUpdate::downloading(None)).unwrap();
        assert_eq!(record.progress, 60);

        let record = ledger.update("t1", TaskUpdate::downloading(Some(250))).unwrap();
        assert_eq!(record.progress, 100);
    }

    #[test]
    fn test_rate_only_kept_while_downloading() {
        let ledger = ledger_with("t1");
        let rate = |speed: &str, eta: &str| {
            TaskUpdate::downloading(Some(10)).with_rate(Some(speed.to_string()), Some(eta.to_string()))
        };

        let record = ledger.update("t1", rate("1.00MiB/s", "00:30")).unwrap();
        assert_eq!(record.speed.as_deref(), Some("1.00MiB/s"));
        assert_eq!(record.eta.as_deref(), Some("00:30"));

        // a report without a rate keeps the last known one
        let record = ledger.update("t1", TaskUpdate::downloading(Some(20))).unwrap();
        assert_eq!(record.speed.as_deref(), Some("1.00MiB/s"));

        let record = ledger.update("t1", rate("2.50MiB/s", "00:05")).unwrap();
        assert_eq!(record.eta.as_deref(), Some("00:05"));

        let record = ledger.update("t1", TaskUpdate::processing()).unwrap();
        assert!(record.speed.is_none());
        assert!(record.eta.is_none());

        let record = ledger.update("t1", TaskUpdate::finished("a.mp3")).unwrap();
        assert!(record.speed.is_none());
    }

    #[test]
    fn test_failure_clears_rate() {
        let ledger = ledger_with("t1");
        ledger
            .update(
                "t1",
                TaskUpdate::downloading(Some(5)).with_rate(Some("80KiB/s".to_string()), None),
            )
            .unwrap();

        let record = ledger.update("t1", TaskUpdate::failed("reset by peer")).unwrap();
        assert!(record.speed.is_none());
        assert_eq!(record.progress, 5);
    }

    #[test]
    fn test_finished_forces_full_progress() {
        let ledger = ledger_with("t1");
        ledger.update("t1", TaskUpdate::downloading(Some(12))).unwrap();

        let update = TaskUpdate {
            progress: Some(3),
            ..TaskUpdate::finished("a.mp3")
        };
        assert_eq!(ledger.update("t1", update).unwrap().progress, 100);
    }

    #[test]
    fn test_failure_keeps_progress() {
        let ledger = ledger_with("t1");
        ledger.update("t1", TaskUpdate::downloading(Some(37))).unwrap();

        let record = ledger.update("t1", TaskUpdate::failed("network down")).unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.progress, 37);
        assert_eq!(record.error.as_deref(), Some("network down"));
        assert!(record.filename.is_none());
    }

    #[test]
    fn test_terminal_records_are_frozen() {
        let ledger = ledger_with("t1");
        ledger.update("t1", TaskUpdate::finished("a.mp3")).unwrap();

        let err = ledger.update("t1", TaskUpdate::failed("late")).unwrap_err();
        assert!(matches!(err, LedgerError::TerminalTask { status: TaskStatus::Finished, .. }));
        assert_eq!(ledger.get("t1").filename.as_deref(), Some("a.mp3"));
    }

    #[test]
    fn test_backward_transition_rejected() {
        let ledger = ledger_with("t1");
        ledger.update("t1", TaskUpdate::processing()).unwrap();

        let err = ledger.update("t1", TaskUpdate::downloading(Some(5))).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: TaskStatus::Processing,
                to: TaskStatus::Downloading,
                ..
            }
        ));
        assert_eq!(ledger.get("t1").status, TaskStatus::Processing);
    }

    #[test]
    fn test_get_all_is_a_copy() {
        let ledger = ledger_with("t1");
        let mut snapshot = ledger.get_all();
        snapshot.get_mut("t1").unwrap().progress = 99;
        snapshot.remove("t1");

        assert_eq!(ledger.get("t1").progress, 0);
        assert_eq!(ledger.get_all().len(), 1);
    }

    #[test]
    fn test_stats() {
        let ledger = ProgressLedger::new();
        for id in ["a", "b", "c", "d"] {
            ledger.create(id, "u", TaskStatus::Queued).unwrap();
        }
        ledger.update("b", TaskUpdate::downloading(Some(1))).unwrap();
        ledger.update("c", TaskUpdate::finished("c.mp3")).unwrap();
        ledger.update("d", TaskUpdate::failed("boom")).unwrap();

        let stats = ledger.stats();
        assert_eq!(
            stats,
            LedgerStats {
                total: 4,
                queued: 1,
                active: 1,
                finished: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_concurrent_updates_do_not_interfere() {
        let ledger = Arc::new(ProgressLedger::new());
        for i in 0..8 {
            ledger.create(&format!("t{i}"), "u", TaskStatus::Queued).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    let id = format!("t{i}");
                    for pct in 0..=100u8 {
                        ledger.update(&id, TaskUpdate::downloading(Some(pct))).unwrap();
                        let _ = ledger.get_all();
                    }
                    ledger.update(&id, TaskUpdate::finished(format!("{id}.mp3"))).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for (id, record) in ledger.get_all() {
            assert_eq!(record.status, TaskStatus::Finished);
            assert_eq!(record.filename, Some(format!("{id}.mp3")));
        }
    }
}
