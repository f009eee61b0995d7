//! Per-frame description records (the ledger format).

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::timestamp::parse_timecode;

/// One ledger entry: the model's description of a single frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDescription {
    pub frame: u32,
    pub timecode: String,
    pub time_seconds: u32,
    pub description: String,
}

impl FrameDescription {
    /// Build a record for `frame`, trimming the model output.
    pub fn for_frame(frame: &Frame, description: impl AsRef<str>) -> Self {
        Self {
            frame: frame.index,
            timecode: frame.timecode.clone(),
            time_seconds: frame.time_seconds,
            description: description.as_ref().trim().to_string(),
        }
    }

    /// A record counts toward completion only with a non-blank description.
    pub fn is_described(&self) -> bool {
        !self.description.trim().is_empty()
    }

    /// Timecode and seconds agree and the index is 1-based.
    pub fn is_consistent(&self) -> bool {
        self.frame > 0 && parse_timecode(&self.timecode) == Some(self.time_seconds)
    }

    /// Prompt line used when summarizing.
    pub fn prompt_line(&self) -> String {
        format!("[{}] {}", self.timecode, self.description.trim())
    }
}

/// Sort records by capture time, breaking ties by frame index.
pub fn sort_by_time(records: &mut [FrameDescription]) {
    records.sort_by_key(|r| (r.time_seconds, r.frame));
}
