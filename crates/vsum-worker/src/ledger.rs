//! Append-only frame description ledger.
//!
//! Records are partitioned by frame index, one file each, so concurrent
//! description tasks never share a writer. A described record is never
//! rewritten; a missing or blank record is backfilled.

use std::path::PathBuf;

use tracing::warn;
use vsum_models::{sort_by_time, Frame, FrameDescription};

use crate::error::WorkerResult;
use crate::work_unit::write_atomic;

#[derive(Debug, Clone)]
pub struct Ledger {
    dir: PathBuf,
}

impl Ledger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("frame_{:04}.json", index))
    }

    /// Described record for `index`.
    ///
    /// Unreadable, blank or inconsistent records (index or timecode not
    /// matching the stored seconds) read as missing.
    pub async fn get(&self, index: u32) -> Option<FrameDescription> {
        let path = self.record_path(index);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<FrameDescription>(&bytes) {
            Ok(record) if record.frame == index && record.is_described() && record.is_consistent() => {
                Some(record)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(frame = index, path = %path.display(), "Ignoring corrupt ledger record: {}", e);
                None
            }
        }
    }

    pub async fn contains(&self, index: u32) -> bool {
        self.get(index).await.is_some()
    }

    /// Append a record. Returns `false` when the index already holds a
    /// described record, which is left untouched.
    pub async fn append(&self, record: &FrameDescription) -> WorkerResult<bool> {
        if !record.is_described() || self.contains(record.frame).await {
            return Ok(false);
        }
        let json = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.record_path(record.frame), &json).await?;
        Ok(true)
    }

    /// Frames of `frames` without a described record.
    pub async fn missing<'a>(&self, frames: &'a [Frame]) -> Vec<&'a Frame> {
        let mut missing = Vec::new();
        for frame in frames {
            if !self.contains(frame.index).await {
                missing.push(frame);
            }
        }
        missing
    }

    /// Described records for `frames`, sorted by capture time.
    pub async fn load(&self, frames: &[Frame]) -> Vec<FrameDescription> {
        let mut records = Vec::with_capacity(frames.len());
        for frame in frames {
            if let Some(record) = self.get(frame.index).await {
                records.push(record);
            }
        }
        sort_by_time(&mut records);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u32) -> Frame {
        Frame::new(index, (index - 1) * 10, format!("/w/{}", Frame::file_name(index)))
    }

    #[tokio::test]
    async fn test_append_never_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());

        let first = FrameDescription::for_frame(&frame(1), "A cat sits on a mat.");
        assert!(ledger.append(&first).await.unwrap());

        let second = FrameDescription::for_frame(&frame(1), "Something else.");
        assert!(!ledger.append(&second).await.unwrap());
        assert_eq!(ledger.get(1).await.unwrap().description, "A cat sits on a mat.");
    }

    #[tokio::test]
    async fn test_blank_record_counts_as_missing_and_is_backfilled() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());
        let blank = serde_json::json!({
            "frame": 2, "timecode": "00:00:10", "timeSeconds": 10, "description": "  "
        });
        tokio::fs::write(ledger.record_path(2), blank.to_string()).await.unwrap();

        assert!(!ledger.contains(2).await);
        let frames = vec![frame(1), frame(2)];
        assert_eq!(ledger.missing(&frames).await.len(), 2);

        let record = FrameDescription::for_frame(&frame(2), "A red car parks.");
        assert!(ledger.append(&record).await.unwrap());
        assert!(ledger.contains(2).await);
    }

    #[tokio::test]
    async fn test_blank_description_is_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());
        let record = FrameDescription::for_frame(&frame(1), "   ");
        assert!(!ledger.append(&record).await.unwrap());
        assert!(!ledger.record_path(1).exists());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());
        tokio::fs::write(ledger.record_path(1), b"{not json").await.unwrap();
        assert!(ledger.get(1).await.is_none());
    }

    #[tokio::test]
    async fn test_record_with_mismatched_timecode_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());
        let skewed = serde_json::json!({
            "frame": 3, "timecode": "00:00:25", "timeSeconds": 20, "description": "A bus."
        });
        tokio::fs::write(ledger.record_path(3), skewed.to_string()).await.unwrap();
        assert!(!ledger.contains(3).await);

        let record = FrameDescription::for_frame(&frame(3), "A bus stops.");
        assert!(ledger.append(&record).await.unwrap());
        assert_eq!(ledger.get(3).await.unwrap().timecode, "00:00:20");
    }

    #[tokio::test]
    async fn test_load_sorts_by_time() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());
        let frames = vec![frame(1), frame(2), frame(3)];
        for f in [&frames[2], &frames[0]] {
            let record = FrameDescription::for_frame(f, format!("frame {}", f.index));
            ledger.append(&record).await.unwrap();
        }

        let records = ledger.load(&frames).await;
        let times: Vec<u32> = records.iter().map(|r| r.time_seconds).collect();
        assert_eq!(times, vec![0, 20]);
        let missing: Vec<u32> = ledger.missing(&frames).await.iter().map(|f| f.index).collect();
        assert_eq!(missing, vec![2]);
    }
}
