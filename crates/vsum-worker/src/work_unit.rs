//! On-disk Work Unit for one video.
//!
//! Layout under `<work_dir>/<unit key>/`:
//!
//! ```text
//! frames/frame_NNNN.jpg   sampled stills
//! audio/audio.wav         mono 16 kHz waveform
//! ledger/frame_NNNN.json  one description record per frame
//! transcript.txt          speech-to-text output
//! summary.json            validated summary
//! unit.json               source and sampling manifest
//! interrupt.log           JSON lines written on cancellation
//! ```

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vsum_models::{Frame, SamplingPlan, Summary, VideoRef};

use crate::error::WorkerResult;
use crate::ledger::Ledger;

/// Diagnostic log appended to when a run is interrupted.
pub const INTERRUPT_LOG: &str = "interrupt.log";

/// Size and modification time of the source file a unit was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStamp {
    pub size_bytes: u64,
    /// Seconds since the Unix epoch, 0 when the filesystem does not report it
    pub modified_secs: u64,
}

impl SourceStamp {
    pub async fn read(path: &Path) -> WorkerResult<Self> {
        let meta = tokio::fs::metadata(path).await?;
        let modified_secs = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(Self {
            size_bytes: meta.len(),
            modified_secs,
        })
    }
}

/// Which video, and which sampling parameters, the unit contents belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitManifest {
    pub video: PathBuf,
    #[serde(default)]
    pub source: SourceStamp,
    pub interval_secs: u32,
    pub max_frames: u32,
}

impl UnitManifest {
    pub fn new(video: &VideoRef, source: SourceStamp, plan: &SamplingPlan) -> Self {
        Self {
            video: video.path.clone(),
            source,
            interval_secs: plan.interval_secs,
            max_frames: plan.max_frames,
        }
    }

    /// Both manifests describe the same version of the same file.
    ///
    /// Different files can share a unit key, so the path is compared as well.
    pub fn same_source(&self, other: &UnitManifest) -> bool {
        self.video == other.video && self.source == other.source
    }

    /// Frames were sampled with exactly the same parameters.
    pub fn same_sampling(&self, other: &UnitManifest) -> bool {
        self.interval_secs == other.interval_secs && self.max_frames == other.max_frames
    }
}

#[derive(Debug, Clone)]
pub struct WorkUnit {
    root: PathBuf,
}

impl WorkUnit {
    /// Open (creating if needed) the unit for `video` under `work_dir`.
    pub async fn open(work_dir: &Path, video: &VideoRef) -> WorkerResult<Self> {
        let unit = Self {
            root: work_dir.join(video.unit_key()),
        };
        unit.ensure_dirs().await?;
        debug!(unit = %unit.root.display(), "Opened work unit");
        Ok(unit)
    }

    async fn ensure_dirs(&self) -> WorkerResult<()> {
        tokio::fs::create_dir_all(self.frames_dir()).await?;
        tokio::fs::create_dir_all(self.audio_dir()).await?;
        tokio::fs::create_dir_all(self.ledger_dir()).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.root.join("ledger")
    }

    pub fn audio_path(&self) -> PathBuf {
        self.audio_dir().join("audio.wav")
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.root.join("transcript.txt")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("unit.json")
    }

    pub fn interrupt_log_path(&self) -> PathBuf {
        self.root.join(INTERRUPT_LOG)
    }

    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.frames_dir().join(Frame::file_name(index))
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.ledger_dir())
    }

    /// Frames already on disk that belong to `plan`, in index order.
    ///
    /// Empty files and indices beyond `expected` are ignored.
    pub async fn existing_frames(&self, plan: &SamplingPlan, expected: u32) -> WorkerResult<Vec<Frame>> {
        let mut frames = Vec::new();
        let mut entries = tokio::fs::read_dir(self.frames_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(index) = name.to_str().and_then(Frame::parse_file_name) else {
                continue;
            };
            if index > expected {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() && meta.len() > 0 {
                frames.push(Frame::new(index, plan.time_for_index(index), entry.path()));
            }
        }
        frames.sort_by_key(|f| f.index);
        Ok(frames)
    }

    /// Remove every sampled frame.
    pub async fn clear_frames(&self) -> WorkerResult<()> {
        remove_dir_if_exists(&self.frames_dir()).await?;
        tokio::fs::create_dir_all(self.frames_dir()).await?;
        Ok(())
    }

    /// Remove all ledger records.
    pub async fn clear_ledger(&self) -> WorkerResult<()> {
        remove_dir_if_exists(&self.ledger_dir()).await?;
        tokio::fs::create_dir_all(self.ledger_dir()).await?;
        Ok(())
    }

    pub async fn read_manifest(&self) -> Option<UnitManifest> {
        let bytes = tokio::fs::read(self.manifest_path()).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(path = %self.manifest_path().display(), "Ignoring unreadable manifest: {}", e);
                None
            }
        }
    }

    pub async fn write_manifest(&self, manifest: &UnitManifest) -> WorkerResult<()> {
        let json = serde_json::to_vec_pretty(manifest)?;
        write_atomic(&self.manifest_path(), &json).await?;
        Ok(())
    }

    /// Cached transcript, if a non-blank one exists.
    pub async fn load_transcript(&self) -> Option<String> {
        let text = tokio::fs::read_to_string(self.transcript_path()).await.ok()?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub async fn store_transcript(&self, text: &str) -> WorkerResult<()> {
        write_atomic(&self.transcript_path(), format!("{}\n", text.trim()).as_bytes()).await?;
        Ok(())
    }

    /// Cached summary, if present and still valid.
    pub async fn load_summary(&self) -> Option<Summary> {
        let bytes = tokio::fs::read(self.summary_path()).await.ok()?;
        let parsed = serde_json::from_slice::<Summary>(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|s| s.revalidate().map_err(|e| e.to_string()));
        match parsed {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(path = %self.summary_path().display(), "Ignoring cached summary: {}", e);
                None
            }
        }
    }

    pub async fn clear_summary(&self) -> WorkerResult<()> {
        remove_file_if_exists(&self.summary_path()).await
    }

    /// Drop everything derived from the source video: frames, audio,
    /// transcript, ledger and summary.
    pub async fn reset(&self) -> WorkerResult<()> {
        self.clear_frames().await?;
        self.clear_ledger().await?;
        remove_dir_if_exists(&self.audio_dir()).await?;
        tokio::fs::create_dir_all(self.audio_dir()).await?;
        remove_file_if_exists(&self.transcript_path()).await?;
        self.clear_summary().await
    }

    pub async fn store_summary(&self, summary: &Summary) -> WorkerResult<()> {
        let json = serde_json::to_vec_pretty(summary)?;
        write_atomic(&self.summary_path(), &json).await?;
        Ok(())
    }

    /// Delete the whole unit.
    pub async fn remove(self) -> WorkerResult<()> {
        remove_dir_if_exists(&self.root).await
    }
}

async fn remove_dir_if_exists(path: &Path) -> WorkerResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn remove_file_if_exists(path: &Path) -> WorkerResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (tempfile::TempDir, VideoRef, WorkUnit) {
        let dir = tempfile::tempdir().unwrap();
        let video_path = dir.path().join("My Holiday (1).mp4");
        tokio::fs::write(&video_path, b"video").await.unwrap();
        let video = VideoRef::from_path(&video_path).unwrap();
        let unit = WorkUnit::open(&dir.path().join("work"), &video).await.unwrap();
        (dir, video, unit)
    }

    #[tokio::test]
    async fn test_open_creates_layout() {
        let (dir, _video, unit) = setup().await;
        assert_eq!(unit.root(), dir.path().join("work").join("My_Holiday__1_"));
        assert!(unit.frames_dir().is_dir());
        assert!(unit.audio_dir().is_dir());
        assert!(unit.ledger_dir().is_dir());
    }

    #[tokio::test]
    async fn test_existing_frames_skips_empty_and_foreign_files() {
        let (_dir, _video, unit) = setup().await;
        let plan = SamplingPlan::new(10, 50).unwrap();
        tokio::fs::write(unit.frame_path(1), b"jpg").await.unwrap();
        tokio::fs::write(unit.frame_path(2), b"").await.unwrap();
        tokio::fs::write(unit.frame_path(3), b"jpg").await.unwrap();
        tokio::fs::write(unit.frame_path(9), b"jpg").await.unwrap();
        tokio::fs::write(unit.frames_dir().join("notes.txt"), b"x").await.unwrap();

        let frames = unit.existing_frames(&plan, 4).await.unwrap();
        let indices: Vec<u32> = frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(frames[1].time_seconds, 20);
        assert_eq!(frames[1].timecode, "00:00:20");
    }

    #[tokio::test]
    async fn test_manifest_round_trip_and_match() {
        let (_dir, video, unit) = setup().await;
        let plan = SamplingPlan::new(5, 20).unwrap();
        let stamp = SourceStamp::read(&video.path).await.unwrap();
        assert_eq!(stamp.size_bytes, 5);
        assert!(unit.read_manifest().await.is_none());

        let current = UnitManifest::new(&video, stamp, &plan);
        unit.write_manifest(&current).await.unwrap();
        let manifest = unit.read_manifest().await.unwrap();
        assert!(manifest.same_source(&current));
        assert!(manifest.same_sampling(&current));

        let resampled = UnitManifest::new(&video, stamp, &SamplingPlan::new(10, 20).unwrap());
        assert!(manifest.same_source(&resampled));
        assert!(!manifest.same_sampling(&resampled));
    }

    #[tokio::test]
    async fn test_manifest_distinguishes_source_files() {
        let (dir, video, _unit) = setup().await;
        let plan = SamplingPlan::new(10, 50).unwrap();
        let stamp = SourceStamp::read(&video.path).await.unwrap();
        let current = UnitManifest::new(&video, stamp, &plan);

        let other_dir = dir.path().join("other");
        std::fs::create_dir(&other_dir).unwrap();
        let other_path = other_dir.join("My Holiday (1).mp4");
        std::fs::write(&other_path, b"video").unwrap();
        let other = VideoRef::from_path(&other_path).unwrap();
        assert_eq!(other.unit_key(), video.unit_key());
        assert!(!current.same_source(&UnitManifest::new(&other, stamp, &plan)));

        let edited = SourceStamp {
            size_bytes: stamp.size_bytes + 1,
            ..stamp
        };
        assert!(!current.same_source(&UnitManifest::new(&video, edited, &plan)));
    }

    #[tokio::test]
    async fn test_reset_clears_derived_data() {
        let (_dir, _video, unit) = setup().await;
        tokio::fs::write(unit.frame_path(1), b"jpg").await.unwrap();
        tokio::fs::write(unit.audio_path(), b"wav").await.unwrap();
        tokio::fs::write(unit.ledger().record_path(1), b"{}").await.unwrap();
        unit.store_transcript("hello").await.unwrap();

        unit.reset().await.unwrap();
        assert!(!unit.frame_path(1).exists());
        assert!(!unit.audio_path().exists());
        assert!(!unit.ledger().record_path(1).exists());
        assert!(unit.load_transcript().await.is_none());
        assert!(unit.frames_dir().is_dir() && unit.audio_dir().is_dir() && unit.ledger_dir().is_dir());
    }

    #[tokio::test]
    async fn test_invalid_cached_summary_is_ignored() {
        let (_dir, _video, unit) = setup().await;
        tokio::fs::write(unit.summary_path(), br#"{"title":"","description":"x"}"#)
            .await
            .unwrap();
        assert!(unit.load_summary().await.is_none());

        let summary = Summary::new(
            "Beach walk",
            "A person walks a dog along a beach at sunset while waves roll in.",
        )
        .unwrap();
        unit.store_summary(&summary).await.unwrap();
        assert_eq!(unit.load_summary().await, Some(summary));
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let (_dir, _video, unit) = setup().await;
        tokio::fs::write(unit.frame_path(1), b"jpg").await.unwrap();
        unit.clear_frames().await.unwrap();
        assert!(unit.frames_dir().is_dir());
        assert!(!unit.frame_path(1).exists());

        let root = unit.root().to_path_buf();
        unit.remove().await.unwrap();
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        write_atomic(&path, b"# Title\n").await.unwrap();
        write_atomic(&path, b"# Other\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Other\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
