//! Extraction adapters
//!
//! An extractor turns a media URL into an audio file on local disk and
//! reports progress while doing so. The worker pool only depends on the
//! [`Extractor`] trait; the built-in implementation shells out to yt-dlp.
//!
//! ## Key Components
//!
//! - [`Extractor`] - Trait implemented by download/transcode backends
//! - [`ProgressSink`] - Per-task receiver of [`ProgressEvent`]s
//! - [`YtDlpExtractor`] - yt-dlp + ffmpeg subprocess backend
//! - [`Toolchain`] - Discovery of yt-dlp, ffmpeg/ffprobe and aria2c
//!
//! ## Example
//!
//! ```rust,ignore
//! use audiobox::extractor::{ExtractRequest, Extractor, YtDlpExtractor};
//!
//! let extractor = YtDlpExtractor::from_config(&config.extractor);
//! let filename = extractor.extract(request, &sink).await?;
//! ```

pub mod output;
mod toolchain;
mod traits;
mod ytdlp;

pub use toolchain::Toolchain;
pub use traits::{
    ExtractError, ExtractRequest, Extractor, ProgressEvent, ProgressSink, ProgressStage,
    RawPercent,
};
pub use ytdlp::YtDlpExtractor;
