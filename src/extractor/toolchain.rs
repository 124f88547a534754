//! Discovery of the external binaries used by the yt-dlp extractor

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ExtractorConfig;

/// Resolved locations of the external toolchain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
    pub yt_dlp: Option<PathBuf>,
    /// Directory (or binary) passed to yt-dlp as `--ffmpeg-location`
    pub ffmpeg_location: Option<PathBuf>,
    pub aria2c: Option<PathBuf>,
}

impl Toolchain {
    /// Resolve binaries using the configured overrides and the system `PATH`
    pub fn discover(config: &ExtractorConfig) -> Self {
        let toolchain = Self::discover_with(config, |name| which::which(name).ok());
        toolchain.log_summary();
        toolchain
    }

    /// Same as [`Toolchain::discover`] with an injectable `PATH` lookup
    pub fn discover_with<F>(config: &ExtractorConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let yt_dlp = match &config.yt_dlp_path {
            Some(path) if path.exists() => Some(path.clone()),
            Some(path) => {
                warn!(path = %path.display(), "Configured yt-dlp path does not exist, searching PATH");
                lookup("yt-dlp")
            }
            None => lookup("yt-dlp"),
        };

        let ffmpeg_location = match &config.ffmpeg_location {
            Some(path) if path.exists() => Some(path.clone()),
            Some(path) => {
                warn!(path = %path.display(), "Configured ffmpeg location does not exist, searching PATH");
                ffmpeg_dir_from_path(&lookup)
            }
            None => ffmpeg_dir_from_path(&lookup),
        };

        let aria2c = if config.use_aria2c {
            lookup("aria2c")
        } else {
            None
        };

        Self {
            yt_dlp,
            ffmpeg_location,
            aria2c,
        }
    }

    fn log_summary(&self) {
        info!(
            yt_dlp = ?self.yt_dlp,
            ffmpeg_location = ?self.ffmpeg_location,
            aria2c = ?self.aria2c,
            "Resolved extraction toolchain"
        );
        if self.yt_dlp.is_none() {
            warn!("yt-dlp not found; every download will fail until it is installed");
        }
        if self.ffmpeg_location.is_none() {
            warn!("ffmpeg/ffprobe not found; audio conversion will fail. Install ffmpeg or set FFMPEG_LOCATION");
        }
    }
}

/// Both ffmpeg and ffprobe must be present; yt-dlp gets their directory
fn ffmpeg_dir_from_path<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let ffmpeg = lookup("ffmpeg")?;
    lookup("ffprobe")?;
    ffmpeg.parent().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_path(name: &str) -> Option<PathBuf> {
        match name {
            "yt-dlp" => Some(PathBuf::from("/opt/bin/yt-dlp")),
            "ffmpeg" => Some(PathBuf::from("/usr/local/bin/ffmpeg")),
            "ffprobe" => Some(PathBuf::from("/usr/local/bin/ffprobe")),
            "aria2c" => Some(PathBuf::from("/usr/bin/aria2c")),
            _ => None,
        }
    }

    #[test]
    fn test_discover_from_path() {
        let config = ExtractorConfig::default();
        let toolchain = Toolchain::discover_with(&config, fake_path);

        assert_eq!(toolchain.yt_dlp, Some(PathBuf::from("/opt/bin/yt-dlp")));
        assert_eq!(toolchain.ffmpeg_location, Some(PathBuf::from("/usr/local/bin")));
        assert_eq!(toolchain.aria2c, Some(PathBuf::from("/usr/bin/aria2c")));
    }

    #[test]
    fn test_ffmpeg_requires_ffprobe() {
        let config = ExtractorConfig::default();
        let toolchain = Toolchain::discover_with(&config, |name| match name {
            "ffmpeg" => Some(PathBuf::from("/usr/bin/ffmpeg")),
            _ => None,
        });

        assert_eq!(toolchain.ffmpeg_location, None);
        assert_eq!(toolchain.yt_dlp, None);
    }

    #[test]
    fn test_existing_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        let config = ExtractorConfig {
            ffmpeg_location: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        let toolchain = Toolchain::discover_with(&config, fake_path);
        assert_eq!(toolchain.ffmpeg_location, Some(temp_dir.path().to_path_buf()));
    }

    #[test]
    fn test_missing_override_falls_back_to_path() {
        let config = ExtractorConfig {
            ffmpeg_location: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };

        let toolchain = Toolchain::discover_with(&config, fake_path);
        assert_eq!(toolchain.ffmpeg_location, Some(PathBuf::from("/usr/local/bin")));
    }

    #[test]
    fn test_aria2c_disabled() {
        let config = ExtractorConfig {
            use_aria2c: false,
            ..Default::default()
        };

        let toolchain = Toolchain::discover_with(&config, fake_path);
        assert!(toolchain.aria2c.is_none());
    }
}
