//! Job runner - executes a single extraction job against the ledger

use tracing::{info, warn};

use super::pool::WorkerContext;
use super::progress::ProgressBridge;
use crate::extractor::ExtractRequest;
use crate::ledger::TaskUpdate;
use crate::queue::JobEnvelope;

/// Run one job to a terminal ledger state.
///
/// Extractor errors end the task as `Failed` with the error's message and
/// never escape this function.
pub async fn run_job(ctx: &WorkerContext, worker_id: usize, envelope: JobEnvelope) {
    let JobEnvelope { seq, job } = envelope;
    let bridge = ProgressBridge::new(job.task_id.clone(), ctx.ledger.clone(), ctx.metrics.clone());

    if bridge.apply(TaskUpdate::starting()).is_none() {
        warn!(worker_id, seq, task_id = %job.task_id, "Task no longer tracked, skipping job");
        return;
    }

    info!(
        worker_id,
        seq,
        task_id = %job.task_id,
        url = %job.url,
        extractor = ctx.extractor.name(),
        "Processing task"
    );

    let request = ExtractRequest {
        task_id: job.task_id.clone(),
        url: job.url.clone(),
        output_dir: ctx.output_dir.clone(),
    };

    match ctx.extractor.extract(request, &bridge).await {
        Ok(filename) => {
            bridge.apply(TaskUpdate::finished(filename.clone()));
            ctx.metrics.task_finished();
            info!(worker_id, seq, task_id = %job.task_id, filename = %filename, "Task finished");
        }
        Err(e) => {
            bridge.apply(TaskUpdate::failed(e.to_string()));
            ctx.metrics.task_failed();
            warn!(worker_id, seq, task_id = %job.task_id, url = %job.url, error = %e, "Task failed");
        }
    }
}
