//! Work Unit orchestrator.
//!
//! Drives one video through extraction, description, transcription,
//! summarization and output. Every stage persists into the Work Unit before
//! the next one starts, so a re-run picks up where the last one stopped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn, Instrument};
use vsum_ai::{SpeechToText, TextModel, VisionModel};
use vsum_media::{MediaToolkit, VideoInfo};
use vsum_models::{Frame, Summary, VideoRef};

use crate::config::WorkerConfig;
use crate::describe::{DescribeEngine, DescribeReport};
use crate::error::{WorkerError, WorkerResult};
use crate::extract::{self, FrameSet};
use crate::logging::RunLogger;
use crate::metrics;
use crate::shutdown::{append_snapshot, CancelToken, RunTracker};
use crate::summarize::Summarizer;
use crate::transcribe::{transcript_snippet, Transcriber};
use crate::work_unit::{write_atomic, WorkUnit};

/// Lifecycle of a Work Unit within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Fresh,
    FramesReady,
    Described,
    AudioReady,
    Summarized,
    Done,
    Failed,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Fresh => "fresh",
            UnitState::FramesReady => "frames_ready",
            UnitState::Described => "described",
            UnitState::AudioReady => "audio_ready",
            UnitState::Summarized => "summarized",
            UnitState::Done => "done",
            UnitState::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct PipelineServices {
    pub toolkit: Arc<dyn MediaToolkit>,
    pub vision: Arc<dyn VisionModel>,
    pub text: Arc<dyn TextModel>,
    /// `None` disables transcription
    pub stt: Option<Arc<dyn SpeechToText>>,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub state: UnitState,
    pub video: PathBuf,
    pub frames: usize,
    /// Frames written by ffmpeg during this run
    pub frames_extracted: u32,
    pub described: usize,
    pub missing_frames: Vec<u32>,
    pub description_requests: u32,
    /// Zero when a cached summary was reused
    pub summary_attempts: u32,
    pub summary_cached: bool,
    pub summary: Summary,
    pub summary_path: PathBuf,
    pub transcript_path: Option<PathBuf>,
    pub unit_dir: PathBuf,
    pub unit_retained: bool,
}

pub struct Pipeline {
    config: WorkerConfig,
    services: PipelineServices,
    cancel: CancelToken,
    tracker: RunTracker,
}

impl Pipeline {
    pub fn new(config: WorkerConfig, services: PipelineServices) -> Self {
        Self {
            config,
            services,
            cancel: CancelToken::new(),
            tracker: RunTracker::new(),
        }
    }

    /// Share an externally owned cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_tracker(mut self, tracker: RunTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn tracker(&self) -> RunTracker {
        self.tracker.clone()
    }

    /// Process one video to completion.
    ///
    /// On interruption a diagnostic snapshot is appended to the unit's
    /// `interrupt.log` before the error is returned.
    pub async fn run(&self, video_path: &Path) -> WorkerResult<RunReport> {
        self.config.validate()?;
        let video = VideoRef::from_path(video_path)?;
        let display_name = video
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| video.base_name.clone());
        let logger = RunLogger::new(&display_name);

        let result = self
            .run_video(&video, &logger)
            .instrument(logger.create_span())
            .await;

        match &result {
            Ok(report) => logger.log_completion(&format!(
                "{} ({} of {} frames described)",
                report.summary_path.display(),
                report.described,
                report.frames
            )),
            Err(e) if e.is_interrupted() => {
                self.record_interrupt(&logger);
                logger.log_error("interrupted by signal");
            }
            Err(e) => {
                self.tracker.set_stage(UnitState::Failed.as_str());
                logger.log_error(&e.to_string());
            }
        }
        result
    }

    async fn run_video(&self, video: &VideoRef, logger: &RunLogger) -> WorkerResult<RunReport> {
        logger.log_start(&video.path.display().to_string());
        let services = &self.services;
        services.toolkit.check_tools()?;

        let plan = self.config.sampling_plan()?;
        let unit = WorkUnit::open(&self.config.work_dir, video).await?;
        self.tracker.set_snapshot_path(unit.interrupt_log_path());
        let mut state = UnitState::Fresh;

        // Fresh -> FramesReady
        self.enter(logger, "extract", "Extracting frames")?;
        let info = extract::probe(services.toolkit.as_ref(), video).await?;
        let frame_set = extract::prepare_frames(
            services.toolkit.as_ref(),
            video,
            &info,
            &unit,
            &plan,
            &self.cancel,
        )
        .await?;
        state = self.advance(logger, state, UnitState::FramesReady);

        // FramesReady -> Described, with audio alongside
        let cached_summary = unit.load_summary().await;
        self.enter(logger, "describe", "Describing frames")?;
        let started = Instant::now();
        let (described, transcript) = if cached_summary.is_some() {
            info!("Cached summary found, skipping description and transcription");
            (
                self.ledger_report(&unit, &frame_set.frames).await,
                unit.load_transcript().await,
            )
        } else {
            let (described, transcript) = tokio::join!(
                self.describe(&unit, &frame_set),
                self.audio_stage(video, &info, &unit)
            );
            (described?, transcript)
        };
        metrics::record_stage_duration("describe", started.elapsed().as_secs_f64());
        self.checkpoint()?;

        if described.described == 0 {
            return Err(WorkerError::NoDescriptions {
                frames: frame_set.frames.len(),
            });
        }
        state = self.advance(logger, state, UnitState::Described);
        if transcript.is_some() {
            state = self.advance(logger, state, UnitState::AudioReady);
        }

        // -> Summarized
        self.enter(logger, "summarize", "Summarizing")?;
        let (summary, summary_attempts, summary_cached) = match cached_summary {
            Some(summary) => (summary, 0, true),
            None => {
                let started = Instant::now();
                let descriptions = unit.ledger().load(&frame_set.frames).await;
                let snippet = transcript
                    .as_deref()
                    .map(|t| transcript_snippet(t, self.config.transcript_snippet_chars));
                let summarizer = Summarizer::new(
                    Arc::clone(&services.text),
                    self.config.summary_retry(),
                    self.cancel.clone(),
                );
                let outcome = summarizer.summarize(&descriptions, snippet).await?;
                unit.store_summary(&outcome.summary).await?;
                metrics::record_stage_duration("summarize", started.elapsed().as_secs_f64());
                (outcome.summary, outcome.attempts, false)
            }
        };
        state = self.advance(logger, state, UnitState::Summarized);

        // Summarized -> Done
        self.enter(logger, "output", "Writing outputs")?;
        let summaries_dir = self
            .config
            .summaries_dir
            .clone()
            .unwrap_or_else(|| video.parent_dir().to_path_buf());
        let (summary_path, transcript_path) = self
            .write_outputs(&summaries_dir, video, &summary, transcript.as_deref())
            .await?;
        state = self.advance(logger, state, UnitState::Done);

        let unit_dir = unit.root().to_path_buf();
        let unit_retained = if self.config.keep_work {
            true
        } else {
            match unit.remove().await {
                Ok(()) => false,
                Err(e) => {
                    logger.log_warning("output", &format!("Failed to remove work unit: {}", e));
                    true
                }
            }
        };

        Ok(RunReport {
            run_id: logger.run_id().to_string(),
            state,
            video: video.path.clone(),
            frames: frame_set.frames.len(),
            frames_extracted: frame_set.extracted,
            described: described.described,
            missing_frames: described.missing,
            description_requests: described.requests,
            summary_attempts,
            summary_cached,
            summary,
            summary_path,
            transcript_path,
            unit_dir,
            unit_retained,
        })
    }

    async fn describe(&self, unit: &WorkUnit, frame_set: &FrameSet) -> WorkerResult<DescribeReport> {
        let engine = DescribeEngine::new(
            Arc::clone(&self.services.vision),
            self.config.concurrency,
            self.config.heartbeat_interval,
            self.cancel.clone(),
            self.tracker.clone(),
        );
        engine.run(&frame_set.frames, &unit.ledger()).await
    }

    async fn audio_stage(&self, video: &VideoRef, info: &VideoInfo, unit: &WorkUnit) -> Option<String> {
        if !info.has_audio {
            info!("No audio stream, skipping transcription");
            return None;
        }

        let transcriber = Transcriber::new(self.services.stt.clone(), self.cancel.clone());
        let audio = if self.services.stt.is_none() || unit.load_transcript().await.is_some() {
            None
        } else {
            extract::prepare_audio(self.services.toolkit.as_ref(), video, unit, &self.cancel).await
        };
        transcriber.transcribe(unit, audio.as_deref()).await
    }

    /// Description state of the ledger without sending any request.
    async fn ledger_report(&self, unit: &WorkUnit, frames: &[Frame]) -> DescribeReport {
        let missing: Vec<u32> = unit
            .ledger()
            .missing(frames)
            .await
            .iter()
            .map(|f| f.index)
            .collect();
        DescribeReport {
            requests: 0,
            described: frames.len() - missing.len(),
            missing,
            passes: Vec::new(),
        }
    }

    async fn write_outputs(
        &self,
        dir: &Path,
        video: &VideoRef,
        summary: &Summary,
        transcript: Option<&str>,
    ) -> WorkerResult<(PathBuf, Option<PathBuf>)> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| WorkerError::output_write(dir, e))?;

        let format = self.config.output_format;
        let summary_path = dir.join(format!("{}.{}", video.base_name, format.extension()));
        write_atomic(&summary_path, summary.render(format).as_bytes())
            .await
            .map_err(|e| WorkerError::output_write(&summary_path, e))?;

        let transcript_path = match transcript {
            Some(text) => {
                let path = dir.join(format!("{}.transcript.txt", video.base_name));
                write_atomic(&path, format!("{}\n", text.trim()).as_bytes())
                    .await
                    .map_err(|e| WorkerError::output_write(&path, e))?;
                Some(path)
            }
            None => None,
        };

        Ok((summary_path, transcript_path))
    }

    fn enter(&self, logger: &RunLogger, stage: &str, message: &str) -> WorkerResult<()> {
        self.checkpoint()?;
        self.tracker.set_stage(stage);
        logger.log_stage(stage, message);
        Ok(())
    }

    fn advance(&self, logger: &RunLogger, from: UnitState, to: UnitState) -> UnitState {
        logger.log_stage(to.as_str(), &format!("Work unit {} -> {}", from, to));
        to
    }

    /// Stop before starting new work once cancelled.
    fn checkpoint(&self) -> WorkerResult<()> {
        if self.cancel.is_cancelled() {
            Err(WorkerError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn record_interrupt(&self, logger: &RunLogger) {
        let Some(path) = self.tracker.snapshot_path() else {
            return;
        };
        let snapshot = self.tracker.snapshot(logger.run_id(), logger.video());
        match append_snapshot(&path, &snapshot) {
            Ok(()) => info!(
                path = %path.display(),
                stage = %snapshot.stage,
                in_flight = ?snapshot.in_flight,
                "Wrote interrupt snapshot"
            ),
            Err(e) => warn!(path = %path.display(), "Failed to write interrupt snapshot: {}", e),
        }
    }
}
