use std::sync::Arc;

use tracing::{debug, warn};

use crate::extractor::{ProgressEvent, ProgressSink, ProgressStage, RawPercent};
use crate::ledger::{ProgressLedger, TaskRecord, TaskUpdate};
use crate::observability::Metrics;

/// Normalize a tool-reported percentage to `0..=100`.
///
/// Everything but digits and `.` is stripped before parsing, the result is
/// clamped and truncated. Returns `None` when nothing numeric is left.
pub fn normalize_percent(raw: &RawPercent) -> Option<u8> {
    let value = match raw {
        RawPercent::Number(n) => *n,
        RawPercent::Text(text) => {
            let cleaned: String = text
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            cleaned.parse::<f64>().ok()?
        }
    };

    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(0.0, 100.0) as u8)
}

/// Routes extractor callbacks for one task into the ledger.
///
/// Ledger refusals are logged and counted, never surfaced to the extractor.
pub struct ProgressBridge {
    task_id: String,
    ledger: Arc<ProgressLedger>,
    metrics: Arc<Metrics>,
}

impl ProgressBridge {
    pub fn new(task_id: impl Into<String>, ledger: Arc<ProgressLedger>, metrics: Arc<Metrics>) -> Self {
        Self {
            task_id: task_id.into(),
            ledger,
            metrics,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Apply `update`, swallowing ledger errors
    pub fn apply(&self, update: TaskUpdate) -> Option<TaskRecord> {
        match self.ledger.update(&self.task_id, update) {
            Ok(record) => Some(record),
            Err(e) => {
                self.metrics.ledger_rejection();
                warn!(task_id = %self.task_id, error = %e, "Ledger rejected update");
                None
            }
        }
    }
}

impl ProgressSink for ProgressBridge {
    fn on_progress(&self, event: ProgressEvent) {
        let update = match event.stage {
            ProgressStage::Downloading => {
                let percent = event.percent.as_ref().and_then(normalize_percent);
                if percent.is_none() {
                    debug!(task_id = %self.task_id, raw = ?event.percent, "Unparseable progress value");
                }
                TaskUpdate::downloading(percent).with_rate(event.speed, event.eta)
            }
            ProgressStage::Finished => TaskUpdate::processing(),
            ProgressStage::Other(stage) => {
                debug!(task_id = %self.task_id, stage = %stage, "Ignoring progress stage");
                return;
            }
        };
        self.apply(update);
    }
}
