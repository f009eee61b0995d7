//! Audio track extraction for speech-to-text.

use std::path::Path;

use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Sample rate of extracted waveforms.
pub const AUDIO_SAMPLE_RATE: u32 = 16000;

/// Size of a canonical PCM WAV header; a file this small holds no samples.
pub const WAV_HEADER_BYTES: u64 = 44;

/// Extract the first audio track as mono 16 kHz 16-bit PCM WAV.
///
/// Written through a `.partial.wav` sibling and renamed on success.
pub async fn extract_audio(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();
    let partial = output_path.with_extension("partial.wav");

    let cmd = FfmpegCommand::new(video_path, &partial)
        .no_video()
        .audio_channels(1)
        .audio_sample_rate(AUDIO_SAMPLE_RATE)
        .audio_codec("pcm_s16le")
        .log_level("error");

    runner.run(&cmd).await?;

    if !is_usable_waveform(&partial).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(MediaError::EmptyOutput(output_path.to_path_buf()));
    }

    tokio::fs::rename(&partial, output_path).await?;
    debug!(path = %output_path.display(), "Extracted audio waveform");
    Ok(())
}

/// A waveform is usable when it exists and carries samples past the header.
pub async fn is_usable_waveform(path: impl AsRef<Path>) -> bool {
    tokio::fs::metadata(path.as_ref())
        .await
        .map(|m| m.is_file() && m.len() > WAV_HEADER_BYTES)
        .unwrap_or(false)
}
