//! Concurrent per-frame description.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use vsum_ai::VisionModel;
use vsum_models::{Frame, FrameDescription};

use crate::error::{WorkerError, WorkerResult};
use crate::ledger::Ledger;
use crate::metrics;
use crate::retry::{PassKind, RepairSchedule};
use crate::shutdown::{CancelToken, RunTracker};

const FRAME_MIME_TYPE: &str = "image/jpeg";

/// Prompt sent with each frame image.
pub fn frame_prompt(frame: &Frame) -> String {
    format!(
        "This image is a still frame captured at {} from a video. \
         Describe it in one or two concise sentences. Be objective: state the \
         main subjects, their actions, the setting and any clearly legible \
         on-screen text. Do not speculate about anything that is not visible. \
         Reply with the description only.",
        frame.timecode
    )
}

/// Outcome of the description stage.
#[derive(Debug, Clone, Default)]
pub struct DescribeReport {
    /// Requests sent during this run
    pub requests: u32,
    /// Frames with a described record after all passes
    pub described: usize,
    /// Frame indices still missing after all passes
    pub missing: Vec<u32>,
    /// Passes that ran, in order
    pub passes: Vec<PassKind>,
}

pub struct DescribeEngine {
    model: Arc<dyn VisionModel>,
    concurrency: usize,
    heartbeat: Duration,
    cancel: CancelToken,
    tracker: RunTracker,
}

impl DescribeEngine {
    pub fn new(
        model: Arc<dyn VisionModel>,
        concurrency: usize,
        heartbeat: Duration,
        cancel: CancelToken,
        tracker: RunTracker,
    ) -> Self {
        Self {
            model,
            concurrency: concurrency.max(1),
            heartbeat,
            cancel,
            tracker,
        }
    }

    /// Describe every frame missing from `ledger`, following [`RepairSchedule`].
    pub async fn run(&self, frames: &[Frame], ledger: &Ledger) -> WorkerResult<DescribeReport> {
        let mut report = DescribeReport::default();
        let mut schedule = RepairSchedule::new();

        while let Some(pass) = schedule.current() {
            let missing = ledger.missing(frames).await;
            if !missing.is_empty() {
                info!(
                    pass = pass.as_str(),
                    frames = missing.len(),
                    concurrency = self.concurrency,
                    "Describing frames"
                );
                report.requests += self.run_pass(pass, &missing, ledger).await?;
                report.passes.push(pass);
            }

            let still_missing = ledger.missing(frames).await.len();
            let described = frames.len() - still_missing;
            schedule = schedule.advance(still_missing, described);
        }

        report.missing = ledger
            .missing(frames)
            .await
            .iter()
            .map(|f| f.index)
            .collect();
        report.described = frames.len() - report.missing.len();

        if !report.missing.is_empty() {
            warn!(
                missing = ?report.missing,
                described = report.described,
                "Some frames remain undescribed"
            );
        }
        Ok(report)
    }

    /// One pass over `frames`. Returns the number of requests sent.
    async fn run_pass(&self, pass: PassKind, frames: &[&Frame], ledger: &Ledger) -> WorkerResult<u32> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let tasks = frames.iter().map(|frame| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => return false,
                    },
                    _ = self.cancel.cancelled() => return false,
                };
                if self.cancel.is_cancelled() {
                    return false;
                }
                self.describe_frame(pass, frame, ledger).await;
                true
            }
        });

        let sent = join_all(tasks).await.into_iter().filter(|s| *s).count() as u32;

        if self.cancel.is_cancelled() {
            return Err(WorkerError::Interrupted);
        }
        Ok(sent)
    }

    async fn describe_frame(&self, pass: PassKind, frame: &Frame, ledger: &Ledger) {
        self.tracker.begin(frame.index);
        let started = Instant::now();

        let image = match tokio::fs::read(&frame.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    frame = frame.index,
                    timecode = %frame.timecode,
                    stage = "describe",
                    "Cannot read frame image: {}", e
                );
                self.tracker.fail(frame.index);
                return;
            }
        };

        let prompt = frame_prompt(frame);
        let call = self.model.describe_image(&image, FRAME_MIME_TYPE, &prompt);
        tokio::pin!(call);

        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + self.heartbeat,
            self.heartbeat,
        );

        let result = loop {
            tokio::select! {
                result = &mut call => break Some(result),
                _ = heartbeat.tick() => {
                    info!(
                        frame = frame.index,
                        timecode = %frame.timecode,
                        elapsed_secs = started.elapsed().as_secs(),
                        "Still waiting for frame description"
                    );
                }
                _ = self.cancel.cancelled() => break None,
            }
        };

        // Abandoned requests stay in flight for the interrupt snapshot.
        let Some(result) = result else {
            debug!(frame = frame.index, "Abandoning in-flight request");
            return;
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let text = match result {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(
                    frame = frame.index,
                    timecode = %frame.timecode,
                    pass = pass.as_str(),
                    stage = "describe",
                    "Model returned an empty description"
                );
                metrics::record_description(pass.as_str(), "empty", latency_ms);
                self.tracker.fail(frame.index);
                return;
            }
            Err(e) => {
                warn!(
                    frame = frame.index,
                    timecode = %frame.timecode,
                    pass = pass.as_str(),
                    stage = "describe",
                    status = ?e.http_status(),
                    "Frame description failed: {}", e
                );
                metrics::record_description(pass.as_str(), "error", latency_ms);
                self.tracker.fail(frame.index);
                return;
            }
        };

        let record = FrameDescription::for_frame(frame, text);
        match ledger.append(&record).await {
            Ok(_) => {
                metrics::record_description(pass.as_str(), "ok", latency_ms);
                self.tracker.complete(frame.index);
                debug!(frame = frame.index, latency_ms = latency_ms as u64, "Frame described");
            }
            Err(e) => {
                warn!(
                    frame = frame.index,
                    timecode = %frame.timecode,
                    stage = "describe",
                    "Failed to write ledger record: {}", e
                );
                self.tracker.fail(frame.index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prompt_mentions_timecode() {
        let frame = Frame::new(3, 20, "/w/frames/frame_0003.jpg");
        let prompt = frame_prompt(&frame);
        assert!(prompt.contains("00:00:20"));
        assert!(prompt.contains("one or two"));
    }
}
