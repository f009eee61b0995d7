//! Frame and audio extraction into the Work Unit.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, warn};
use vsum_media::{is_usable_waveform, seek_position, MediaError, MediaToolkit, VideoInfo};
use vsum_models::{Frame, SamplingPlan, VideoRef};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::shutdown::CancelToken;
use crate::work_unit::{SourceStamp, UnitManifest, WorkUnit};

/// Frames available for description.
#[derive(Debug, Clone)]
pub struct FrameSet {
    pub frames: Vec<Frame>,
    /// Frames the plan asked for
    pub expected: u32,
    /// Frames written during this run
    pub extracted: u32,
}

/// Probe the video, mapping unreadable media to an extraction failure.
pub async fn probe(toolkit: &dyn MediaToolkit, video: &VideoRef) -> WorkerResult<VideoInfo> {
    toolkit.probe(&video.path).await.map_err(|e| match e {
        MediaError::Cancelled => WorkerError::Interrupted,
        e if e.is_missing_tool() => WorkerError::Media(e),
        e => WorkerError::extraction_failed(format!(
            "cannot read {}: {}",
            video.path.display(),
            e
        )),
    })
}

/// Make sure the unit holds every frame `plan` expects for `info.duration`.
///
/// A complete set on disk is reused without touching ffmpeg. A partial set
/// or a set sampled under different parameters is discarded and extracted
/// again in full. A unit built from a different source file is reset
/// entirely.
pub async fn prepare_frames(
    toolkit: &dyn MediaToolkit,
    video: &VideoRef,
    info: &VideoInfo,
    unit: &WorkUnit,
    plan: &SamplingPlan,
    cancel: &CancelToken,
) -> WorkerResult<FrameSet> {
    let expected = plan.expected_count(info.duration);

    let source = SourceStamp::read(&video.path).await?;
    let manifest = UnitManifest::new(video, source, plan);
    match unit.read_manifest().await {
        Some(previous) if !previous.same_source(&manifest) => {
            info!(
                previous = %previous.video.display(),
                "Work unit belongs to another source file, resetting it"
            );
            unit.reset().await?;
        }
        Some(previous) if !previous.same_sampling(&manifest) => {
            info!(
                old_interval = previous.interval_secs,
                old_max_frames = previous.max_frames,
                "Sampling parameters changed, discarding frames, ledger and summary"
            );
            unit.clear_frames().await?;
            unit.clear_ledger().await?;
            unit.clear_summary().await?;
        }
        _ => {}
    }

    let existing = unit.existing_frames(plan, expected).await?;
    if existing.len() as u32 >= expected {
        debug!(frames = existing.len(), "Reusing extracted frames");
        unit.write_manifest(&manifest).await?;
        return Ok(FrameSet {
            frames: existing,
            expected,
            extracted: 0,
        });
    }

    if !existing.is_empty() {
        info!(
            found = existing.len(),
            expected, "Incomplete frame set, extracting again"
        );
        unit.clear_frames().await?;
    }
    unit.write_manifest(&manifest).await?;

    let started = Instant::now();
    let mut frames = Vec::with_capacity(expected as usize);
    for (index, time_seconds) in plan.samples(info.duration) {
        if cancel.is_cancelled() {
            return Err(WorkerError::Interrupted);
        }

        let path = unit.frame_path(index);
        let seek = seek_position(f64::from(time_seconds), info.duration);
        match toolkit.extract_frame(&video.path, seek, &path).await
        {
            Ok(()) => frames.push(Frame::new(index, time_seconds, path)),
            Err(MediaError::Cancelled) => return Err(WorkerError::Interrupted),
            Err(e) if e.is_missing_tool() => return Err(e.into()),
            Err(e) => warn!(
                frame = index,
                timecode = %vsum_models::format_timecode(time_seconds),
                stage = "extract",
                "Frame extraction failed, skipping: {}", e
            ),
        }
    }

    metrics::record_frames_extracted(frames.len() as u32);
    metrics::record_stage_duration("extract_frames", started.elapsed().as_secs_f64());

    if frames.is_empty() {
        return Err(WorkerError::extraction_failed(format!(
            "no frames could be extracted from {}",
            video.path.display()
        )));
    }

    info!(
        extracted = frames.len(),
        expected,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Frames extracted"
    );

    let extracted = frames.len() as u32;
    Ok(FrameSet {
        frames,
        expected,
        extracted,
    })
}

/// Extract the audio track, returning the waveform path when it is usable.
///
/// Every failure here disables audio for the run instead of failing it.
pub async fn prepare_audio(
    toolkit: &dyn MediaToolkit,
    video: &VideoRef,
    unit: &WorkUnit,
    cancel: &CancelToken,
) -> Option<PathBuf> {
    let path = unit.audio_path();
    if is_usable_waveform(&path).await {
        debug!(path = %path.display(), "Reusing extracted audio");
        return Some(path);
    }
    if cancel.is_cancelled() {
        return None;
    }

    if let Err(e) = toolkit.extract_audio(&video.path, &path).await {
        warn!(stage = "audio", "Audio extraction failed, continuing without audio: {}", e);
        return None;
    }

    if !is_usable_waveform(&path).await {
        warn!(stage = "audio", "Extracted audio is empty, continuing without audio");
        return None;
    }
    Some(path)
}
