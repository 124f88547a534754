//! Parsing of yt-dlp stdout/stderr
//!
//! yt-dlp is started with a progress template and a print template that tag
//! the lines we care about, so everything else on stdout can be ignored:
//!
//! ```text
//! [audiobox:progress] downloading| 42.3%|  1.21MiB/s|00:42
//! [audiobox:progress] finished|100.0%|NA|NA
//! [audiobox:file] /srv/downloads/Song Title_0192f3c1-....mp3
//! ```

use std::io;
use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::traits::{ExtractError, ProgressEvent, ProgressStage, RawPercent};

pub const PROGRESS_TAG: &str = "[audiobox:progress]";
pub const FILE_TAG: &str = "[audiobox:file]";

/// Separates status, percent, speed and ETA in a progress line
pub const FIELD_SEP: char = '|';

/// Keep at most this many stderr lines for error reporting
pub const STDERR_TAIL: usize = 50;

const FFMPEG_HINT: &str = "ffprobe and ffmpeg not found. Install ffmpeg (https://ffmpeg.org/) \
     or set FFMPEG_LOCATION to the directory containing the ffmpeg binaries";

/// One classified output line
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressEvent),
    Artifact(PathBuf),
    Other,
}

pub fn parse_line(line: &str) -> OutputLine {
    let line = strip_ansi(line.trim_end_matches(['\r', '\n']));

    if let Some(rest) = line.strip_prefix(PROGRESS_TAG) {
        let mut fields = rest.split(FIELD_SEP).map(str::trim);
        let status = fields.next().unwrap_or_default();
        if status.is_empty() {
            return OutputLine::Other;
        }

        let percent = fields.next().and_then(known).map(RawPercent::from);
        let speed = fields.next().and_then(known).map(str::to_string);
        let eta = fields.next().and_then(known).map(str::to_string);

        return OutputLine::Progress(
            ProgressEvent::new(ProgressStage::parse(status), percent).with_rate(speed, eta),
        );
    }

    if let Some(path) = line.strip_prefix(FILE_TAG) {
        let path = path.trim();
        if !path.is_empty() {
            return OutputLine::Artifact(PathBuf::from(path));
        }
    }

    OutputLine::Other
}

/// yt-dlp renders missing template fields as `NA` and unknown rates as
/// `Unknown B/s` / `Unknown`.
fn known(field: &str) -> Option<&str> {
    if field.is_empty() || field == "NA" || field == "N/A" || field.starts_with("Unknown") {
        None
    } else {
        Some(field)
    }
}

/// Drop CSI escape sequences (`ESC [ ... <letter>`) from a line
fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Read one `\n`-terminated line, replacing invalid UTF-8.
///
/// Returns `None` at end of stream.
pub async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Turn a failed yt-dlp run into an error carrying the most useful message
pub fn classify_failure(stderr: &[String], exit_code: Option<i32>) -> ExtractError {
    let joined = stderr.join("\n").to_lowercase();
    if joined.contains("ffprobe and ffmpeg not found")
        || (joined.contains("ffmpeg") && joined.contains("not found"))
    {
        return ExtractError::PostProcessing(FFMPEG_HINT.to_string());
    }

    let message = stderr
        .iter()
        .rev()
        .find_map(|line| line.trim().strip_prefix("ERROR:").map(str::trim))
        .or_else(|| stderr.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| match exit_code {
            Some(code) => format!("yt-dlp exited with status {code}"),
            None => "yt-dlp was terminated by a signal".to_string(),
        });

    ExtractError::ToolFailed(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_downloading_line() {
        let line = "[audiobox:progress] downloading| 42.3%|  1.21MiB/s|00:42";
        assert_eq!(
            parse_line(line),
            OutputLine::Progress(
                ProgressEvent::downloading("42.3%")
                    .with_rate(Some("1.21MiB/s".to_string()), Some("00:42".to_string()))
            )
        );
    }

    #[test]
    fn test_parse_unknown_rate() {
        let line = "[audiobox:progress] downloading|  0.0%|Unknown B/s|Unknown";
        assert_eq!(
            parse_line(line),
            OutputLine::Progress(ProgressEvent::downloading("0.0%"))
        );
    }

    #[test]
    fn test_parse_colored_line() {
        let line = "[audiobox:progress] downloading|\u{1b}[0;94m 42.3%\u{1b}[0m|\u{1b}[0;32m  1.21MiB/s\u{1b}[0m|NA";
        match parse_line(line) {
            OutputLine::Progress(event) => {
                assert_eq!(event.percent, Some(RawPercent::from("42.3%")));
                assert_eq!(event.speed.as_deref(), Some("1.21MiB/s"));
                assert_eq!(event.eta, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_finished_line() {
        match parse_line("[audiobox:progress] finished|100.0%|NA|NA\r") {
            OutputLine::Progress(event) => {
                assert_eq!(event.stage, ProgressStage::Finished);
                assert_eq!(event.speed, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_progress_without_percent() {
        assert_eq!(
            parse_line("[audiobox:progress] downloading"),
            OutputLine::Progress(ProgressEvent::new(ProgressStage::Downloading, None))
        );
        assert_eq!(parse_line("[audiobox:progress]   "), OutputLine::Other);
    }

    #[tokio::test]
    async fn test_read_line_lossy() {
        let mut input: &[u8] = b"[audiobox:file] /tmp/Caf\xe9_1.mp3\r\nnext\nlast";
        let mut buf = Vec::new();

        let first = read_line_lossy(&mut input, &mut buf).await.unwrap().unwrap();
        assert_eq!(first, "[audiobox:file] /tmp/Caf\u{fffd}_1.mp3");
        assert_eq!(read_line_lossy(&mut input, &mut buf).await.unwrap().as_deref(), Some("next"));
        assert_eq!(read_line_lossy(&mut input, &mut buf).await.unwrap().as_deref(), Some("last"));
        assert_eq!(read_line_lossy(&mut input, &mut buf).await.unwrap(), None);
    }

    #[test]
    fn test_parse_artifact_line() {
        assert_eq!(
            parse_line("[audiobox:file] /tmp/out/My Song_abc.mp3"),
            OutputLine::Artifact(PathBuf::from("/tmp/out/My Song_abc.mp3"))
        );
    }

    #[test]
    fn test_parse_noise() {
        assert_eq!(parse_line("[youtube] abc: Downloading webpage"), OutputLine::Other);
        assert_eq!(parse_line(""), OutputLine::Other);
    }

    #[test]
    fn test_classify_error_line() {
        let stderr = vec![
            "WARNING: something minor".to_string(),
            "ERROR: Unsupported URL: https://example.com/a".to_string(),
        ];
        let err = classify_failure(&stderr, Some(1));
        assert_eq!(err.to_string(), "Unsupported URL: https://example.com/a");
    }

    #[test]
    fn test_classify_missing_ffmpeg() {
        let stderr = vec![
            "ERROR: Postprocessing: ffprobe and ffmpeg not found. Please install or provide the path using --ffmpeg-location".to_string(),
        ];
        let err = classify_failure(&stderr, Some(1));
        assert!(matches!(err, ExtractError::PostProcessing(_)));
        assert!(err.to_string().contains("FFMPEG_LOCATION"));
    }

    #[test]
    fn test_classify_silent_failure() {
        assert_eq!(
            classify_failure(&[], Some(2)).to_string(),
            "yt-dlp exited with status 2"
        );
        assert_eq!(
            classify_failure(&[], None).to_string(),
            "yt-dlp was terminated by a signal"
        );
    }
}
