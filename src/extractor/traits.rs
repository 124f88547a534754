use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Extraction failures. Every variant ends the task as `Failed`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{tool} not found: {hint}")]
    MissingBinary { tool: &'static str, hint: String },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    ToolFailed(String),

    #[error("Postprocessing failed: {0}")]
    PostProcessing(String),

    #[error("Download completed but output file is missing: {0}")]
    MissingOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stage reported by the extraction tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStage {
    Downloading,
    /// The fetch finished and transcoding is about to start
    Finished,
    Other(String),
}

impl ProgressStage {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "downloading" => ProgressStage::Downloading,
            "finished" => ProgressStage::Finished,
            other => ProgressStage::Other(other.to_string()),
        }
    }
}

/// Percentage as emitted by the tool, before normalization.
///
/// yt-dlp hands out values like `" 13.8%"`, `"100%"`, `"N/A"` or a bare float,
/// so nothing about the shape is trusted.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPercent {
    Text(String),
    Number(f64),
}

impl From<&str> for RawPercent {
    fn from(value: &str) -> Self {
        RawPercent::Text(value.to_string())
    }
}

impl From<String> for RawPercent {
    fn from(value: String) -> Self {
        RawPercent::Text(value)
    }
}

impl From<f64> for RawPercent {
    fn from(value: f64) -> Self {
        RawPercent::Number(value)
    }
}

/// Incremental status notification emitted while a task runs
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub percent: Option<RawPercent>,
    /// Human-readable transfer rate, e.g. `"1.21MiB/s"`
    pub speed: Option<String>,
    /// Human-readable time remaining, e.g. `"00:42"`
    pub eta: Option<String>,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, percent: Option<RawPercent>) -> Self {
        Self {
            stage,
            percent,
            speed: None,
            eta: None,
        }
    }

    pub fn downloading(percent: impl Into<RawPercent>) -> Self {
        Self::new(ProgressStage::Downloading, Some(percent.into()))
    }

    pub fn finished() -> Self {
        Self::new(ProgressStage::Finished, None)
    }

    pub fn with_rate(mut self, speed: Option<String>, eta: Option<String>) -> Self {
        self.speed = speed;
        self.eta = eta;
        self
    }
}

/// Receiver for progress events of a single task.
///
/// Implementations must not panic or block for long: they are called inline
/// from the extractor's output loop.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// Everything an extractor needs to process one task
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub task_id: String,
    pub url: String,
    pub output_dir: PathBuf,
}

/// Download-and-transcode backend.
///
/// One call is one attempt. Any retry policy lives inside the implementation.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch `request.url`, convert it to audio inside `request.output_dir`
    /// and return the basename of the produced file.
    async fn extract(
        &self,
        request: ExtractRequest,
        progress: &dyn ProgressSink,
    ) -> Result<String, ExtractError>;

    fn name(&self) -> &'static str;
}
