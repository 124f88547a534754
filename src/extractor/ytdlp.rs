//! yt-dlp backed extractor
//!
//! Runs the `yt-dlp` binary as a subprocess, converting the best available
//! audio stream with ffmpeg. Progress comes from tagged stdout lines (see
//! [`super::output`]) and is forwarded to the task's [`ProgressSink`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::BufReader;
use tokio::process::Command;
use tracing::{debug, warn};

use super::output::{self, FIELD_SEP, FILE_TAG, OutputLine, PROGRESS_TAG, STDERR_TAIL};
use super::toolchain::Toolchain;
use super::traits::{ExtractError, ExtractRequest, Extractor, ProgressSink};
use crate::config::ExtractorConfig;

const TOOL: &str = "yt-dlp";

pub struct YtDlpExtractor {
    toolchain: Toolchain,
    audio_format: String,
    audio_quality: String,
    aria2c_args: String,
}

impl YtDlpExtractor {
    pub fn new(toolchain: Toolchain, config: &ExtractorConfig) -> Self {
        Self {
            toolchain,
            audio_format: config.audio_format.clone(),
            audio_quality: config.audio_quality.clone(),
            aria2c_args: config.aria2c_args.clone(),
        }
    }

    /// Discover the toolchain on this host and build an extractor from it
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(Toolchain::discover(config), config)
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Command-line arguments for one request.
    ///
    /// Output names always carry the task id so two sources with the same
    /// title never overwrite each other.
    pub fn build_args(&self, request: &ExtractRequest) -> Vec<OsString> {
        let template = request
            .output_dir
            .join(format!("%(title)s_{}.%(ext)s", request.task_id));

        let mut args: Vec<OsString> = [
            "--format",
            "bestaudio/best",
            "--extract-audio",
            "--audio-format",
            self.audio_format.as_str(),
            "--audio-quality",
            self.audio_quality.as_str(),
            "--no-playlist",
            "--continue",
            "--quiet",
            "--no-warnings",
            "--progress",
            "--newline",
            "--color",
            "no_color",
            "--no-simulate",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push("--progress-template".into());
        args.push(
            format!(
                "download:{PROGRESS_TAG} %(progress.status)s{FIELD_SEP}%(progress._percent_str)s\
                 {FIELD_SEP}%(progress._speed_str)s{FIELD_SEP}%(progress._eta_str)s"
            )
            .into(),
        );
        args.push("--print".into());
        args.push(format!("after_move:{FILE_TAG} %(filepath)s").into());
        args.push("--output".into());
        args.push(template.into_os_string());

        if let Some(location) = &self.toolchain.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.clone().into_os_string());
        }

        if let Some(aria2c) = &self.toolchain.aria2c {
            args.push("--downloader".into());
            args.push(aria2c.clone().into_os_string());
            args.push("--downloader-args".into());
            args.push(format!("aria2c:{}", self.aria2c_args).into());
        }

        // Stop option parsing so URLs starting with '-' stay positional
        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    /// Locate the produced file when yt-dlp did not print its path
    async fn find_artifact(&self, dir: &Path, task_id: &str) -> Result<Option<String>, ExtractError> {
        let suffix = format!("_{task_id}.{}", self.audio_format);
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(&suffix) {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(
        &self,
        request: ExtractRequest,
        progress: &dyn ProgressSink,
    ) -> Result<String, ExtractError> {
        let binary = self
            .toolchain
            .yt_dlp
            .as_ref()
            .ok_or_else(|| ExtractError::MissingBinary {
                tool: TOOL,
                hint: "install yt-dlp or set extractor.yt_dlp_path".to_string(),
            })?;

        tokio::fs::create_dir_all(&request.output_dir).await?;

        let mut child = Command::new(binary)
            .args(self.build_args(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractError::Spawn { tool: TOOL, source })?;

        // `--print` implies quiet mode, in which yt-dlp writes progress to
        // stderr. Both streams are scanned for tagged lines.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let read_stdout = async {
            let mut artifact: Option<PathBuf> = None;
            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout);
                let mut buf = Vec::new();
                while let Some(line) = output::read_line_lossy(&mut reader, &mut buf).await? {
                    match output::parse_line(&line) {
                        OutputLine::Progress(event) => progress.on_progress(event),
                        OutputLine::Artifact(path) => artifact = Some(path),
                        OutputLine::Other => {}
                    }
                }
            }
            Ok::<_, std::io::Error>(artifact)
        };

        let read_stderr = async {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL);
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                loop {
                    let line = match output::read_line_lossy(&mut reader, &mut buf).await {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(task_id = %request.task_id, error = %e, "stopped reading yt-dlp stderr");
                            break;
                        }
                    };
                    if let OutputLine::Progress(event) = output::parse_line(&line) {
                        progress.on_progress(event);
                        continue;
                    }
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            Vec::from(tail)
        };

        let (artifact, stderr_lines) = tokio::join!(read_stdout, read_stderr);
        let artifact = artifact?;
        let status = child.wait().await?;

        if !status.success() {
            return Err(output::classify_failure(&stderr_lines, status.code()));
        }

        let filename = match artifact
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
        {
            Some(name) => Some(name),
            None => self.find_artifact(&request.output_dir, &request.task_id).await?,
        };

        let filename = filename.ok_or_else(|| {
            ExtractError::MissingOutput(
                "yt-dlp reported success without producing a file. Ensure ffmpeg/ffprobe are installed"
                    .to_string(),
            )
        })?;

        if !tokio::fs::try_exists(request.output_dir.join(&filename)).await? {
            return Err(ExtractError::MissingOutput(filename));
        }

        debug!(task_id = %request.task_id, filename = %filename, "yt-dlp produced artifact");
        Ok(filename)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ProgressEvent;

    struct NullSink;

    impl ProgressSink for NullSink {
        fn on_progress(&self, _event: ProgressEvent) {}
    }

    fn request() -> ExtractRequest {
        ExtractRequest {
            task_id: "0192-abc".to_string(),
            url: "https://example.com/watch?v=1".to_string(),
            output_dir: PathBuf::from("/srv/downloads"),
        }
    }

    fn args_as_strings(extractor: &YtDlpExtractor) -> Vec<String> {
        extractor
            .build_args(&request())
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_build_args_minimal_toolchain() {
        let extractor = YtDlpExtractor::new(Toolchain::default(), &ExtractorConfig::default());
        let args = args_as_strings(&extractor);

        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"/srv/downloads/%(title)s_0192-abc.%(ext)s".to_string()));
        assert!(!args.contains(&"--ffmpeg-location".to_string()));
        assert!(!args.contains(&"--downloader".to_string()));

        let color = args.iter().position(|a| a == "--color").unwrap();
        assert_eq!(args[color + 1], "no_color");

        let tpl = args.iter().position(|a| a == "--progress-template").unwrap();
        assert_eq!(
            args[tpl + 1],
            "download:[audiobox:progress] %(progress.status)s|%(progress._percent_str)s\
             |%(progress._speed_str)s|%(progress._eta_str)s"
        );

        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "https://example.com/watch?v=1");

        let fmt = args.iter().position(|a| a == "--audio-format").unwrap();
        assert_eq!(args[fmt + 1], "mp3");
    }

    #[test]
    fn test_build_args_full_toolchain() {
        let toolchain = Toolchain {
            yt_dlp: Some(PathBuf::from("/usr/bin/yt-dlp")),
            ffmpeg_location: Some(PathBuf::from("/opt/ffmpeg/bin")),
            aria2c: Some(PathBuf::from("/usr/bin/aria2c")),
        };
        let extractor = YtDlpExtractor::new(toolchain, &ExtractorConfig::default());
        let args = args_as_strings(&extractor);

        let loc = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
        assert_eq!(args[loc + 1], "/opt/ffmpeg/bin");

        let dl = args.iter().position(|a| a == "--downloader-args").unwrap();
        assert_eq!(args[dl + 1], "aria2c:-x16 -s16 -k1M");
    }

    #[tokio::test]
    async fn test_extract_without_binary_fails() {
        let extractor = YtDlpExtractor::new(Toolchain::default(), &ExtractorConfig::default());
        let err = extractor.extract(request(), &NullSink).await.unwrap_err();
        assert!(matches!(err, ExtractError::MissingBinary { tool: "yt-dlp", .. }));
    }
}
