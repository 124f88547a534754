use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::runner::run_job;
use crate::extractor::Extractor;
use crate::ledger::{ProgressLedger, TaskUpdate};
use crate::observability::Metrics;
use crate::queue::{Job, JobReceiver, QueueError, TaskBroker};

/// Shared handles every worker needs to run a job
#[derive(Clone)]
pub struct WorkerContext {
    pub ledger: Arc<ProgressLedger>,
    pub extractor: Arc<dyn Extractor>,
    pub metrics: Arc<Metrics>,
    pub output_dir: PathBuf,
}

/// Fixed-size pool of extraction workers.
///
/// At most `size` jobs call into the extractor at once; further submissions
/// wait in the broker queue. Dropping the pool (or calling [`shutdown`])
/// does not wait for in-flight jobs.
///
/// [`shutdown`]: WorkerPool::shutdown
pub struct WorkerPool {
    broker: TaskBroker,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers on the current tokio runtime
    pub fn start(size: usize, ctx: WorkerContext) -> Self {
        let (broker, receiver) = TaskBroker::new();

        let workers = (0..size)
            .map(|worker_id| tokio::spawn(worker_loop(worker_id, receiver.clone(), ctx.clone())))
            .collect();

        info!(
            pool_size = size,
            extractor = ctx.extractor.name(),
            output_dir = %ctx.output_dir.display(),
            "Worker pool started"
        );

        Self { broker, workers }
    }

    /// Queue a job without waiting for a free worker
    pub fn submit(&self, job: Job) -> Result<u64, QueueError> {
        self.broker.enqueue(job)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting for a worker
    pub fn pending(&self) -> usize {
        self.broker.pending()
    }

    /// True while the queue is open and at least one worker is alive
    pub fn is_healthy(&self) -> bool {
        self.broker.health_check() && self.workers.iter().any(|w| !w.is_finished())
    }

    /// Stop taking jobs and abort the workers. In-flight extractions are
    /// detached and left to finish or die with the process.
    pub fn shutdown(&self) {
        info!(pending = self.broker.pending(), "Shutting down worker pool");
        self.broker.close();
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn worker_loop(worker_id: usize, receiver: JobReceiver, ctx: WorkerContext) {
    debug!(worker_id, "Worker started");

    while let Some(envelope) = receiver.recv().await {
        let task_id = envelope.job.task_id.clone();
        let job_ctx = ctx.clone();

        // Run in a separate task so a panicking extractor only takes the job down.
        let handle = tokio::spawn(async move { run_job(&job_ctx, worker_id, envelope).await });

        if let Err(e) = handle.await {
            error!(worker_id, task_id = %task_id, error = %e, "Job aborted");
            let message = if e.is_panic() {
                "internal error: extraction panicked"
            } else {
                "internal error: extraction cancelled"
            };
            if ctx.ledger.update(&task_id, TaskUpdate::failed(message)).is_ok() {
                ctx.metrics.task_failed();
            }
        }
    }

    debug!(worker_id, "Worker stopped, queue closed");
}
