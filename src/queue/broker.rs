use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job queue is closed, task {0} was not enqueued")]
    Closed(String),
}

/// Work item for one submitted URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub task_id: String,
    pub url: String,
}

/// Job plus its position in submission order
#[derive(Clone, Debug)]
pub struct JobEnvelope {
    pub seq: u64,
    pub job: Job,
}

/// TaskBroker hands submitted jobs to the worker pool
///
/// Architecture:
/// 1. Dispatcher calls `broker.enqueue(job)`
/// 2. Broker stamps a sequence number and pushes onto an unbounded channel
/// 3. Every worker pulls from the same [`JobReceiver`], so an idle worker
///    always takes the oldest waiting job
///
/// Enqueueing never blocks: a saturated pool only makes the queue longer.
pub struct TaskBroker {
    sender: mpsc::UnboundedSender<JobEnvelope>,
    next_seq: AtomicU64,
    pending: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl TaskBroker {
    /// Create a broker and the receiving half shared by all workers
    pub fn new() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        info!("Creating TaskBroker with shared job queue");

        let broker = Self {
            sender,
            next_seq: AtomicU64::new(0),
            pending: pending.clone(),
            closed: AtomicBool::new(false),
        };
        let receiver = JobReceiver {
            inner: Arc::new(Mutex::new(receiver)),
            pending,
        };

        (broker, receiver)
    }

    /// Queue a job and return its sequence number
    pub fn enqueue(&self, job: Job) -> Result<u64, QueueError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let task_id = job.task_id.clone();

        if self.closed.load(Ordering::Acquire) {
            warn!(seq, task_id = %task_id, "Job queue closed, job refused");
            return Err(QueueError::Closed(task_id));
        }

        self.pending.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(JobEnvelope { seq, job }) {
            Ok(()) => {
                debug!(seq, task_id = %task_id, "Job queued");
                Ok(seq)
            }
            Err(_) => {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                warn!(seq, task_id = %task_id, "Job queue closed, job dropped");
                Err(QueueError::Closed(task_id))
            }
        }
    }

    /// Jobs queued but not yet picked up by a worker
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Refuse every later `enqueue`. Jobs already queued stay queued.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(pending = self.pending(), "Job queue closed");
        }
    }

    /// False once the broker is closed or every worker is gone
    pub fn health_check(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.sender.is_closed()
    }
}

/// Receiving end of the job queue, cloned into every worker
#[derive(Clone)]
pub struct JobReceiver {
    inner: Arc<Mutex<mpsc::UnboundedReceiver<JobEnvelope>>>,
    pending: Arc<AtomicUsize>,
}

impl JobReceiver {
    /// Wait for the next job; `None` once the broker is dropped and drained
    pub async fn recv(&self) -> Option<JobEnvelope> {
        let envelope = self.inner.lock().await.recv().await?;
        self.pending.fetch_sub(1, Ordering::Relaxed);
        Some(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> Job {
        Job {
            task_id: id.to_string(),
            url: format!("https://example.com/{id}"),
        }
    }

    #[tokio::test]
    async fn test_enqueue_in_order() {
        let (broker, receiver) = TaskBroker::new();

        assert_eq!(broker.enqueue(job("a")).unwrap(), 0);
        assert_eq!(broker.enqueue(job("b")).unwrap(), 1);
        assert_eq!(broker.pending(), 2);

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(first.job, job("a"));
        assert_eq!(broker.pending(), 1);

        let second = receiver.clone().recv().await.unwrap();
        assert_eq!(second.job.task_id, "b");
        assert_eq!(broker.pending(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_never_blocks() {
        let (broker, _receiver) = TaskBroker::new();
        for i in 0..10_000 {
            broker.enqueue(job(&format!("t{i}"))).unwrap();
        }
        assert_eq!(broker.pending(), 10_000);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (broker, receiver) = TaskBroker::new();
        drop(receiver);

        assert!(!broker.health_check());
        let err = broker.enqueue(job("lost")).unwrap_err();
        assert!(matches!(err, QueueError::Closed(id) if id == "lost"));
        assert_eq!(broker.pending(), 0);
    }

    #[tokio::test]
    async fn test_close_refuses_new_jobs() {
        let (broker, _receiver) = TaskBroker::new();
        broker.enqueue(job("early")).unwrap();
        broker.close();
        broker.close();

        assert!(!broker.health_check());
        let err = broker.enqueue(job("late")).unwrap_err();
        assert!(matches!(err, QueueError::Closed(id) if id == "late"));
        assert_eq!(broker.pending(), 1);
    }

    #[tokio::test]
    async fn test_receiver_ends_after_broker_drop() {
        let (broker, receiver) = TaskBroker::new();
        broker.enqueue(job("last")).unwrap();
        drop(broker);

        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_none());
    }
}
