//! Media toolkit seam used by the pipeline.
//!
//! The worker only talks to media through [`MediaToolkit`], so tests can
//! substitute an in-memory implementation and count extraction calls.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::audio::extract_audio;
use crate::command::{check_ffmpeg, check_ffprobe, FfmpegRunner};
use crate::error::MediaResult;
use crate::frames::{extract_frame, DEFAULT_FRAME_MAX_WIDTH};
use crate::probe::{probe_video, VideoInfo};

#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Verify required external binaries are installed.
    fn check_tools(&self) -> MediaResult<()>;

    /// Probe duration and stream layout.
    async fn probe(&self, video: &Path) -> MediaResult<VideoInfo>;

    /// Write one scaled still frame captured at `at_secs` to `output`.
    async fn extract_frame(&self, video: &Path, at_secs: f64, output: &Path) -> MediaResult<()>;

    /// Write the audio track as a mono low-rate waveform to `output`.
    async fn extract_audio(&self, video: &Path, output: &Path) -> MediaResult<()>;
}

/// [`MediaToolkit`] backed by the ffmpeg/ffprobe CLIs.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    runner: FfmpegRunner,
    frame_max_width: u32,
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self {
            runner: FfmpegRunner::new(),
            frame_max_width: DEFAULT_FRAME_MAX_WIDTH,
        }
    }
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the width of extracted frames.
    pub fn with_frame_max_width(mut self, width: u32) -> Self {
        self.frame_max_width = width;
        self
    }

    /// Kill running ffmpeg processes once the flag flips.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }

    /// Per-invocation timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    fn check_tools(&self) -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }

    async fn probe(&self, video: &Path) -> MediaResult<VideoInfo> {
        probe_video(&self.runner, video).await
    }

    async fn extract_frame(&self, video: &Path, at_secs: f64, output: &Path) -> MediaResult<()> {
        extract_frame(&self.runner, video, at_secs, output, self.frame_max_width).await
    }

    async fn extract_audio(&self, video: &Path, output: &Path) -> MediaResult<()> {
        extract_audio(&self.runner, video, output).await
    }
}
