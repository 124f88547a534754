//! Task records held by the progress ledger and their wire representation.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a task.
///
/// Stages are ordered `Queued -> Starting -> Downloading -> Processing -> Finished`.
/// `Failed` may be entered from any non-terminal stage. `Unknown` never lives
/// in the ledger; it only labels the sentinel returned for ids that were
/// never submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Starting,
    Downloading,
    Processing,
    Finished,
    Failed,
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Starting => "starting",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Processing => "processing",
            TaskStatus::Finished => "finished",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Unknown | TaskStatus::Queued => 0,
            TaskStatus::Starting => 1,
            TaskStatus::Downloading => 2,
            TaskStatus::Processing => 3,
            TaskStatus::Finished => 4,
            TaskStatus::Failed => 5,
        }
    }

    /// Whether a record in this stage may move to `next`.
    ///
    /// Staying in the same stage is allowed so repeated progress reports
    /// can land while `Downloading`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() || next == TaskStatus::Unknown {
            return false;
        }
        next == TaskStatus::Failed || next.rank() >= self.rank()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one task.
///
/// Serialized as the polling payload:
///
/// ```json
/// {"url": "https://example.com/a", "status": "finished", "progress": 100,
///  "filename": "song_0192.mp3", "created_at": 1760860800, "updated_at": 1760860842}
/// ```
///
/// While downloading, `"speed"` and `"eta"` carry yt-dlp's rate strings when
/// known. A failed task reports `"status": "error: <message>"` and repeats the
/// message under `"error"`. The unknown sentinel serializes to
/// `{"status": "unknown", "progress": 0}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub task_id: String,
    pub url: String,
    pub status: TaskStatus,
    pub progress: u8,
    /// Only set while `Downloading`
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(task_id: impl Into<String>, url: impl Into<String>, status: TaskStatus) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            url: url.into(),
            status,
            progress: 0,
            speed: None,
            eta: None,
            filename: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record handed out for ids the ledger has never seen.
    pub fn unknown(task_id: impl Into<String>) -> Self {
        Self::new(task_id, String::new(), TaskStatus::Unknown)
    }

    pub fn is_unknown(&self) -> bool {
        self.status == TaskStatus::Unknown
    }

    /// Status string as reported to polling clients.
    pub fn status_label(&self) -> String {
        match self.status {
            TaskStatus::Failed => format!(
                "error: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
            other => other.as_str().to_string(),
        }
    }
}

impl Serialize for TaskRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        if self.is_unknown() {
            map.serialize_entry("status", self.status.as_str())?;
            map.serialize_entry("progress", &0u8)?;
            return map.end();
        }

        map.serialize_entry("url", &self.url)?;
        map.serialize_entry("status", &self.status_label())?;
        map.serialize_entry("progress", &self.progress)?;
        if let Some(speed) = &self.speed {
            map.serialize_entry("speed", speed)?;
        }
        if let Some(eta) = &self.eta {
            map.serialize_entry("eta", eta)?;
        }
        if let Some(filename) = &self.filename {
            map.serialize_entry("filename", filename)?;
        }
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
        }
        map.serialize_entry("created_at", &self.created_at.timestamp())?;
        map.serialize_entry("updated_at", &self.updated_at.timestamp())?;
        map.end()
    }
}

/// Partial set of fields merged into a record by [`ProgressLedger::update`].
///
/// [`ProgressLedger::update`]: super::ProgressLedger::update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn starting() -> Self {
        Self {
            status: Some(TaskStatus::Starting),
            ..Default::default()
        }
    }

    /// `None` keeps whatever percentage was last recorded.
    pub fn downloading(progress: Option<u8>) -> Self {
        Self {
            status: Some(TaskStatus::Downloading),
            progress,
            ..Default::default()
        }
    }

    pub fn with_rate(mut self, speed: Option<String>, eta: Option<String>) -> Self {
        self.speed = speed;
        self.eta = eta;
        self
    }

    pub fn processing() -> Self {
        Self {
            status: Some(TaskStatus::Processing),
            progress: Some(100),
            ..Default::default()
        }
    }

    pub fn finished(filename: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Finished),
            progress: Some(100),
            filename: Some(filename.into()),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            error: Some(message.into()),
            ..Default::default()
        }
    }
}
