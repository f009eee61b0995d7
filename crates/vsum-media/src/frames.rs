//! Still-frame extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Default upper bound on extracted frame width in pixels.
pub const DEFAULT_FRAME_MAX_WIDTH: u32 = 768;

/// JPEG quality passed to `-q:v`.
pub const FRAME_JPEG_QUALITY: u8 = 4;

/// Distance kept from the end of the stream when seeking.
///
/// Seeking exactly to the reported duration yields no decodable frame.
const END_MARGIN_SECS: f64 = 0.5;

/// Scale filter bounding width while keeping aspect ratio and an even height.
pub fn frame_scale_filter(max_width: u32) -> String {
    format!("scale='min({},iw)':-2", max_width.max(2))
}

/// Seek position for a capture time, clamped just inside the stream.
pub fn seek_position(at_secs: f64, duration: f64) -> f64 {
    if duration > 0.0 && at_secs > duration - END_MARGIN_SECS {
        (duration - END_MARGIN_SECS).max(0.0)
    } else {
        at_secs.max(0.0)
    }
}

/// Extract one scaled JPEG frame at `at_secs`.
///
/// The image is written to a sibling `.partial.jpg` file and renamed into
/// place, so an interrupted extraction never leaves a truncated frame under
/// the final name.
pub async fn extract_frame(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    at_secs: f64,
    output_path: impl AsRef<Path>,
    max_width: u32,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();
    let partial = output_path.with_extension("partial.jpg");

    let cmd = FfmpegCommand::new(video_path, &partial)
        .seek(at_secs)
        .single_frame()
        .video_filter(frame_scale_filter(max_width))
        .jpeg_quality(FRAME_JPEG_QUALITY)
        .log_level("error");

    runner.run(&cmd).await?;

    let written = tokio::fs::metadata(&partial)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    if written == 0 {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(MediaError::EmptyOutput(output_path.to_path_buf()));
    }

    tokio::fs::rename(&partial, output_path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_scale_filter() {
        assert_eq!(frame_scale_filter(768), "scale='min(768,iw)':-2");
    }

    #[test]
    fn test_seek_position_clamps_to_stream_end() {
        assert_eq!(seek_position(0.0, 20.0), 0.0);
        assert_eq!(seek_position(10.0, 20.0), 10.0);
        assert_eq!(seek_position(20.0, 20.0), 19.5);
        assert_eq!(seek_position(0.0, 0.2), 0.0);
        // Unknown duration: trust the requested time.
        assert_eq!(seek_position(30.0, 0.0), 30.0);
    }
}
