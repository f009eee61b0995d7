//! Scripted collaborators for pipeline tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vsum_ai::{AiError, AiResult, SpeechToText, TextModel, VisionModel};
use vsum_media::{MediaError, MediaResult, MediaToolkit, VideoInfo};
use vsum_worker::{CancelToken, PipelineServices, WorkerConfig};

pub const VALID_SUMMARY: &str = r#"{"title": "A walk on the beach", "description": "A person walks a dog along a sandy beach at sunset while waves roll in and gulls circle overhead."}"#;

/// Toolkit that writes placeholder files instead of running ffmpeg.
pub struct FakeToolkit {
    pub duration: f64,
    pub has_audio: bool,
    pub tools_missing: bool,
    /// Capture times (whole seconds) whose extraction fails
    pub failing_times: Vec<u32>,
    pub probe_calls: AtomicU32,
    pub frame_calls: AtomicU32,
    pub audio_calls: AtomicU32,
    /// Seek positions requested, in call order
    pub seeks: Mutex<Vec<f64>>,
}

impl FakeToolkit {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            has_audio: false,
            tools_missing: false,
            failing_times: Vec::new(),
            probe_calls: AtomicU32::new(0),
            frame_calls: AtomicU32::new(0),
            audio_calls: AtomicU32::new(0),
            seeks: Mutex::new(Vec::new()),
        }
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn with_audio(mut self) -> Self {
        self.has_audio = true;
        self
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    fn check_tools(&self) -> MediaResult<()> {
        if self.tools_missing {
            Err(MediaError::FfmpegNotFound)
        } else {
            Ok(())
        }
    }

    async fn probe(&self, _video: &Path) -> MediaResult<VideoInfo> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(VideoInfo {
            duration: self.duration,
            width: 1280,
            height: 720,
            codec: "h264".to_string(),
            has_audio: self.has_audio,
            audio_codec: self.has_audio.then(|| "aac".to_string()),
        })
    }

    async fn extract_frame(&self, _video: &Path, at_secs: f64, output: &Path) -> MediaResult<()> {
        self.frame_calls.fetch_add(1, Ordering::SeqCst);
        self.seeks.lock().unwrap().push(at_secs);
        // Like ffmpeg, nothing decodes at or past the end of the stream.
        if at_secs >= self.duration {
            return Err(MediaError::EmptyOutput(output.to_path_buf()));
        }
        if self.failing_times.contains(&(at_secs as u32)) {
            return Err(MediaError::ffmpeg_failed("decode error", None, Some(1)));
        }
        tokio::fs::write(output, format!("jpeg@{}", at_secs)).await?;
        Ok(())
    }

    async fn extract_audio(&self, _video: &Path, output: &Path) -> MediaResult<()> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(output, vec![1u8; 256]).await?;
        Ok(())
    }
}

/// How [`FakeVision`] answers a frame.
#[derive(Clone, Copy)]
pub enum FrameBehavior {
    /// Fail the first `n` requests for the frame, then succeed
    FailTimes(u32),
    AlwaysFail,
}

pub struct FakeVision {
    pub calls: AtomicU32,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    delay: Duration,
    /// Keyed by timecode as it appears in the prompt
    behaviors: HashMap<String, FrameBehavior>,
    failures: Mutex<HashMap<String, u32>>,
    fail_all: bool,
    /// Cancel this token on the first call and never answer
    hang_with: Option<CancelToken>,
}

impl FakeVision {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
            behaviors: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            fail_all: false,
            hang_with: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_frame(mut self, timecode: &str, behavior: FrameBehavior) -> Self {
        self.behaviors.insert(timecode.to_string(), behavior);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }

    pub fn hanging(cancel: CancelToken) -> Self {
        Self {
            hang_with: Some(cancel),
            ..Self::new()
        }
    }

    fn timecode_of(prompt: &str) -> String {
        prompt
            .split_whitespace()
            .find(|w| w.len() == 8 && w.as_bytes()[2] == b':' && w.as_bytes()[5] == b':')
            .unwrap_or_default()
            .to_string()
    }

    fn should_fail(&self, timecode: &str) -> bool {
        if self.fail_all {
            return true;
        }
        match self.behaviors.get(timecode) {
            Some(FrameBehavior::AlwaysFail) => true,
            Some(FrameBehavior::FailTimes(n)) => {
                let mut failures = self.failures.lock().unwrap();
                let count = failures.entry(timecode.to_string()).or_insert(0);
                if *count < *n {
                    *count += 1;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }
}

#[async_trait]
impl VisionModel for FakeVision {
    async fn describe_image(&self, image: &[u8], mime_type: &str, prompt: &str) -> AiResult<String> {
        assert_eq!(mime_type, "image/jpeg");
        assert!(!image.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(cancel) = &self.hang_with {
            cancel.cancel();
            std::future::pending::<()>().await;
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let timecode = Self::timecode_of(prompt);
        if self.should_fail(&timecode) {
            return Err(AiError::from_http_status(503, "model overloaded"));
        }
        Ok(format!("A quiet street scene at {}.", timecode))
    }
}

/// Text model replaying scripted answers, then repeating `fallback`.
pub struct FakeText {
    pub calls: AtomicU32,
    script: Mutex<VecDeque<String>>,
    fallback: String,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeText {
    pub fn new(script: &[&str], fallback: &str) -> Self {
        Self {
            calls: AtomicU32::new(0),
            script: Mutex::new(script.iter().map(|s| s.to_string()).collect()),
            fallback: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn valid() -> Self {
        Self::new(&[], VALID_SUMMARY)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextModel for FakeText {
    async fn generate(&self, prompt: &str, json_output: bool) -> AiResult<String> {
        assert!(json_output);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

pub struct FakeStt {
    pub calls: AtomicU32,
    text: String,
}

impl FakeStt {
    pub fn new(text: &str) -> Self {
        Self {
            calls: AtomicU32::new(0),
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn transcribe(&self, audio: &Path) -> AiResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(audio.exists());
        Ok(self.text.clone())
    }
}

/// Temp layout: a placeholder video plus work and output directories.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub video: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        Self { dir, video }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("summaries")
    }

    pub fn unit_dir(&self) -> PathBuf {
        self.work_dir().join("clip")
    }

    pub fn config(&self) -> WorkerConfig {
        WorkerConfig {
            work_dir: self.work_dir(),
            summaries_dir: Some(self.out_dir()),
            summary_backoff: Duration::from_millis(1),
            heartbeat_interval: Duration::from_secs(1),
            ..WorkerConfig::default()
        }
    }

    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.out_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

pub struct Fakes {
    pub toolkit: Arc<FakeToolkit>,
    pub vision: Arc<FakeVision>,
    pub text: Arc<FakeText>,
    pub stt: Arc<FakeStt>,
}

impl Fakes {
    pub fn new(toolkit: FakeToolkit, vision: FakeVision, text: FakeText) -> Self {
        Self {
            toolkit: Arc::new(toolkit),
            vision: Arc::new(vision),
            text: Arc::new(text),
            stt: Arc::new(FakeStt::new("hello and welcome to the beach")),
        }
    }

    pub fn services(&self) -> PipelineServices {
        PipelineServices {
            toolkit: self.toolkit.clone(),
            vision: self.vision.clone(),
            text: self.text.clone(),
            stt: Some(self.stt.clone()),
        }
    }

    /// Calls made to any external collaborator.
    pub fn external_calls(&self) -> u32 {
        self.toolkit.frame_calls.load(Ordering::SeqCst)
            + self.toolkit.audio_calls.load(Ordering::SeqCst)
            + self.vision.calls.load(Ordering::SeqCst)
            + self.text.calls.load(Ordering::SeqCst)
            + self.stt.calls.load(Ordering::SeqCst)
    }
}
