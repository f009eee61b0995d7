//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds (0.0 when the container does not report one)
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Video codec
    pub codec: String,
    /// Whether at least one audio stream is present
    pub has_audio: bool,
    /// Codec of the first audio stream
    pub audio_codec: Option<String>,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe a video file for information.
///
/// Runs under `runner`'s timeout and cancellation.
pub async fn probe_video(runner: &FfmpegRunner, path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let args: Vec<String> = ["-v", "error", "-print_format", "json", "-show_format", "-show_streams"]
        .iter()
        .map(|a| a.to_string())
        .chain(std::iter::once(path.to_string_lossy().to_string()))
        .collect();
    let output = runner.probe_output(&args).await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe could not read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Interpret ffprobe's JSON document.
fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    // Container duration first, then the video stream's own duration.
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_duration)
        .or_else(|| video_stream.duration.as_deref().and_then(parse_duration))
        .unwrap_or(0.0);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        has_audio: audio_stream.is_some(),
        audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
    })
}

fn parse_duration(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_with_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "125.400000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!((info.duration - 125.4).abs() < 0.001);
        assert_eq!(info.width, 1920);
        assert!(info.has_audio);
        assert_eq!(info.audio_codec.as_deref(), Some("aac"));
    }

    #[test]
    fn test_parse_probe_without_audio_falls_back_to_stream_duration() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "vp9", "duration": "7.5"}
            ],
            "format": {"duration": "N/A"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!((info.duration - 7.5).abs() < 0.001);
        assert!(!info.has_audio);
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_not_found() {
        let runner = FfmpegRunner::new();
        assert!(matches!(
            probe_video(&runner, "/nonexistent/clip.mp4").await,
            Err(MediaError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_parse_probe_audio_only_is_invalid() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidVideo(_))
        ));
    }
}
