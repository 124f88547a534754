use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Flat directory where converted audio files are written and served from
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    /// Optional frontend directory served for any non-API path
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            downloads_dir: default_downloads_dir(),
            static_dir: None,
            max_body_bytes: default_max_body_bytes(),
            cors: true,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize(1024 * 1024) // 1 MB
}

fn default_true() -> bool {
    true
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Number of extractions allowed to run at the same time
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

fn default_pool_size() -> usize {
    3
}

/// yt-dlp / ffmpeg toolchain configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Explicit yt-dlp binary; `PATH` is searched when unset or missing
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,
    /// Directory containing ffmpeg/ffprobe (also read from `FFMPEG_LOCATION`)
    #[serde(default)]
    pub ffmpeg_location: Option<PathBuf>,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
    /// Use aria2c for fetching when it is installed
    #[serde(default = "default_true")]
    pub use_aria2c: bool,
    #[serde(default = "default_aria2c_args")]
    pub aria2c_args: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_location: None,
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            use_aria2c: true,
            aria2c_args: default_aria2c_args(),
        }
    }
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "192K".to_string()
}

fn default_aria2c_args() -> String {
    "-x16 -s16 -k1M".to_string()
}

/// Retention of finished and failed task records
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Evict terminal records older than this; records are kept forever when unset
    #[serde(default)]
    pub task_ttl: Option<HumanDuration>,
    #[serde(default = "default_prune_interval")]
    pub prune_interval: HumanDuration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            task_ttl: None,
            prune_interval: default_prune_interval(),
        }
    }
}

fn default_prune_interval() -> HumanDuration {
    HumanDuration::from_secs(300)
}
