//! Sampled frames and the sampling plan that produces them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::timestamp::format_timecode;

/// How frames are sampled from a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPlan {
    /// Seconds between consecutive samples
    pub interval_secs: u32,
    /// Upper bound on the number of frames
    pub max_frames: u32,
}

impl SamplingPlan {
    /// Create a validated plan.
    pub fn new(interval_secs: u32, max_frames: u32) -> ModelResult<Self> {
        if interval_secs == 0 {
            return Err(ModelError::invalid_plan("interval must be at least 1 second"));
        }
        if max_frames == 0 {
            return Err(ModelError::invalid_plan("max frames must be at least 1"));
        }
        Ok(Self {
            interval_secs,
            max_frames,
        })
    }

    /// Number of frames a video of `duration_secs` should yield:
    /// `min(floor(duration / interval) + 1, max_frames)`.
    ///
    /// Unknown, negative or non-finite durations are treated as zero, so
    /// every readable video yields at least the frame at `t = 0`.
    pub fn expected_count(&self, duration_secs: f64) -> u32 {
        let duration = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            0.0
        };
        let slots = (duration / self.interval_secs as f64).floor();
        let slots = if slots >= u32::MAX as f64 {
            u32::MAX
        } else {
            slots as u32
        };
        slots.saturating_add(1).min(self.max_frames)
    }

    /// Capture time of the frame with the given 1-based index.
    pub fn time_for_index(&self, index: u32) -> u32 {
        index.saturating_sub(1).saturating_mul(self.interval_secs)
    }

    /// `(index, time_seconds)` pairs for every expected frame, in capture order.
    pub fn samples(&self, duration_secs: f64) -> impl Iterator<Item = (u32, u32)> + '_ {
        (1..=self.expected_count(duration_secs)).map(move |i| (i, self.time_for_index(i)))
    }
}

/// One sampled still image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// 1-based sequence index
    pub index: u32,
    /// Capture timestamp in whole seconds
    pub time_seconds: u32,
    /// `HH:MM:SS` form of `time_seconds`
    pub timecode: String,
    /// Image file inside the Work Unit
    pub path: PathBuf,
}

impl Frame {
    pub fn new(index: u32, time_seconds: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            time_seconds,
            timecode: format_timecode(time_seconds),
            path: path.into(),
        }
    }

    /// Canonical image file name for a frame index.
    pub fn file_name(index: u32) -> String {
        format!("frame_{:04}.jpg", index)
    }

    /// Inverse of [`Frame::file_name`].
    pub fn parse_file_name(name: &str) -> Option<u32> {
        let index: u32 = name
            .strip_prefix("frame_")?
            .strip_suffix(".jpg")?
            .parse()
            .ok()?;
        (index > 0).then_some(index)
    }
}
