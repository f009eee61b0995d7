//! Structured run logging utilities.
//!
//! Every log line of a run carries its run id and video name so a single
//! invocation can be followed in aggregated JSON logs.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Run logger for stage lifecycle events.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    video: String,
}

impl RunLogger {
    /// Create a logger with a fresh run id.
    pub fn new(video: &str) -> Self {
        Self::with_run_id(&Uuid::new_v4().to_string(), video)
    }

    pub fn with_run_id(run_id: &str, video: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            video: video.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, video = %self.video, "Run started: {}", message);
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            run_id = %self.run_id,
            video = %self.video,
            stage = %stage,
            "{}", message
        );
    }

    pub fn log_warning(&self, stage: &str, message: &str) {
        warn!(
            run_id = %self.run_id,
            video = %self.video,
            stage = %stage,
            "{}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, video = %self.video, "Run failed: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, video = %self.video, "Run completed: {}", message);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn video(&self) -> &str {
        &self.video
    }

    /// Span wrapping the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id, video = %self.video)
    }
}
