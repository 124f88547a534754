//! Task dispatcher - turns submitted URLs into queued jobs

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ledger::{LedgerError, ProgressLedger, TaskStatus, TaskUpdate};
use crate::observability::Metrics;
use crate::queue::{Job, QueueError};
use crate::worker::WorkerPool;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Registers tasks in the ledger and hands them to the worker pool.
///
/// Submission returns as soon as the job is queued.
pub struct TaskDispatcher {
    ledger: Arc<ProgressLedger>,
    pool: Arc<WorkerPool>,
    metrics: Arc<Metrics>,
}

impl TaskDispatcher {
    pub fn new(ledger: Arc<ProgressLedger>, pool: Arc<WorkerPool>, metrics: Arc<Metrics>) -> Self {
        Self {
            ledger,
            pool,
            metrics,
        }
    }

    /// Submit a single URL and return its task id
    pub fn submit_one(&self, url: &str) -> Result<String, DispatchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DispatchError::Validation("url must not be empty".to_string()));
        }

        let task_id = Uuid::now_v7().to_string();
        self.ledger.create(&task_id, url, TaskStatus::Queued)?;

        let job = Job {
            task_id: task_id.clone(),
            url: url.to_string(),
        };
        if let Err(e) = self.pool.submit(job) {
            // Keep the record observable instead of leaving it queued forever
            let _ = self
                .ledger
                .update(&task_id, TaskUpdate::failed(e.to_string()));
            return Err(e.into());
        }

        self.metrics.task_submitted();
        info!(task_id = %task_id, url, "Task queued");
        Ok(task_id)
    }

    /// Submit every non-empty string in `urls`, skipping anything else.
    ///
    /// Returns task id to URL for the accepted entries.
    pub fn submit_many(&self, urls: &[Value]) -> BTreeMap<String, String> {
        let mut accepted = BTreeMap::new();

        for (index, entry) in urls.iter().enumerate() {
            let Some(url) = entry.as_str() else {
                debug!(index, "Skipping non-string entry");
                continue;
            };

            match self.submit_one(url) {
                Ok(task_id) => {
                    accepted.insert(task_id, url.trim().to_string());
                }
                Err(e) => debug!(index, error = %e, "Skipping entry"),
            }
        }

        info!(submitted = urls.len(), accepted = accepted.len(), "Batch queued");
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractError, ExtractRequest, Extractor, ProgressSink};
    use crate::worker::WorkerContext;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Never finishes, so submitted tasks stay queued or starting
    struct StalledExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Extractor for StalledExtractor {
        async fn extract(
            &self,
            _request: ExtractRequest,
            _progress: &dyn ProgressSink,
        ) -> Result<String, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    fn dispatcher() -> (TaskDispatcher, Arc<ProgressLedger>, Arc<Metrics>) {
        let ledger = Arc::new(ProgressLedger::new());
        let metrics = Arc::new(Metrics::new());
        let pool = WorkerPool::start(
            1,
            WorkerContext {
                ledger: ledger.clone(),
                extractor: Arc::new(StalledExtractor {
                    calls: AtomicUsize::new(0),
                }),
                metrics: metrics.clone(),
                output_dir: PathBuf::from("downloads"),
            },
        );
        let dispatcher = TaskDispatcher::new(ledger.clone(), Arc::new(pool), metrics.clone());
        (dispatcher, ledger, metrics)
    }

    #[tokio::test]
    async fn test_submit_one_registers_task() {
        let (dispatcher, ledger, metrics) = dispatcher();

        let task_id = dispatcher.submit_one("  https://example.com/a  ").unwrap();
        // Workers have not been polled yet on this single-threaded runtime
        let record = ledger.get(&task_id);
        assert_eq!(record.status, TaskStatus::Queued);
        assert_eq!(record.progress, 0);
        assert_eq!(record.url, "https://example.com/a");
        assert_eq!(metrics.snapshot().tasks_submitted, 1);
    }

    #[tokio::test]
    async fn test_submit_one_rejects_empty() {
        let (dispatcher, ledger, _) = dispatcher();

        assert!(matches!(
            dispatcher.submit_one("   "),
            Err(DispatchError::Validation(_))
        ));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_marks_task_failed() {
        let (dispatcher, ledger, metrics) = dispatcher();
        dispatcher.pool.shutdown();

        let err = dispatcher.submit_one("https://example.com/late").unwrap_err();
        assert!(matches!(err, DispatchError::Queue(QueueError::Closed(_))));

        let all = ledger.get_all();
        assert_eq!(all.len(), 1);
        let record = all.values().next().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.url, "https://example.com/late");
        assert!(record.error.as_deref().unwrap().contains("queue is closed"));
        assert_eq!(metrics.snapshot().tasks_submitted, 0);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (dispatcher, _, _) = dispatcher();

        let a = dispatcher.submit_one("https://example.com/same").unwrap();
        let b = dispatcher.submit_one("https://example.com/same").unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_submit_many_skips_malformed() {
        let (dispatcher, ledger, _) = dispatcher();

        let links = json!(["u1", "u2", "", 123]);
        let accepted = dispatcher.submit_many(links.as_array().unwrap());

        assert_eq!(accepted.len(), 2);
        let mut urls: Vec<&str> = accepted.values().map(String::as_str).collect();
        urls.sort();
        assert_eq!(urls, vec!["u1", "u2"]);
        assert_eq!(ledger.len(), 2);
        for task_id in accepted.keys() {
            assert!(!ledger.get(task_id).is_unknown());
        }
    }

    #[tokio::test]
    async fn test_submit_many_empty_input() {
        let (dispatcher, _, _) = dispatcher();
        assert!(dispatcher.submit_many(&[]).is_empty());
    }
}
