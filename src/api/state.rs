use std::sync::Arc;

use crate::config::Config;
use crate::dispatcher::TaskDispatcher;
use crate::extractor::Extractor;
use crate::ledger::ProgressLedger;
use crate::observability::Metrics;
use crate::worker::{WorkerContext, WorkerPool};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger: Arc<ProgressLedger>,
    pub dispatcher: Arc<TaskDispatcher>,
    pub pool: Arc<WorkerPool>,
    pub metrics: Arc<Metrics>,
    pub extractor_name: &'static str,
}

impl AppState {
    /// Build the ledger, worker pool and dispatcher around `extractor`.
    ///
    /// Spawns the pool's workers, so it must run inside a tokio runtime.
    pub fn new(config: Config, extractor: Arc<dyn Extractor>) -> Self {
        let ledger = Arc::new(ProgressLedger::new());
        let metrics = Arc::new(Metrics::new());
        let extractor_name = extractor.name();

        let pool = Arc::new(WorkerPool::start(
            config.worker.pool_size,
            WorkerContext {
                ledger: ledger.clone(),
                extractor,
                metrics: metrics.clone(),
                output_dir: config.server.downloads_dir.clone(),
            },
        ));
        let dispatcher = Arc::new(TaskDispatcher::new(
            ledger.clone(),
            pool.clone(),
            metrics.clone(),
        ));

        Self {
            config: Arc::new(config),
            ledger,
            dispatcher,
            pool,
            metrics,
            extractor_name,
        }
    }
}
