//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! calls are no-ops.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Frame description requests by pass and outcome.
    pub const DESCRIPTION_REQUESTS_TOTAL: &str = "vsum_description_requests_total";

    /// Summarization attempts by outcome.
    pub const SUMMARY_ATTEMPTS_TOTAL: &str = "vsum_summary_attempts_total";

    /// Transcription outcomes.
    pub const TRANSCRIPTIONS_TOTAL: &str = "vsum_transcriptions_total";

    /// Frames written by the extractor.
    pub const FRAMES_EXTRACTED_TOTAL: &str = "vsum_frames_extracted_total";

    /// Stage duration in seconds.
    pub const STAGE_DURATION_SECONDS: &str = "vsum_stage_duration_seconds";
}

pub fn record_description(pass: &str, outcome: &str, latency_ms: f64) {
    counter!(
        names::DESCRIPTION_REQUESTS_TOTAL,
        "pass" => pass.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::STAGE_DURATION_SECONDS,
        "stage" => "describe_request"
    )
    .record(latency_ms / 1000.0);
}

pub fn record_summary_attempt(outcome: &str) {
    counter!(names::SUMMARY_ATTEMPTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_transcription(outcome: &str) {
    counter!(names::TRANSCRIPTIONS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_frames_extracted(count: u32) {
    counter!(names::FRAMES_EXTRACTED_TOTAL).increment(u64::from(count));
}

pub fn record_stage_duration(stage: &str, seconds: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.to_string()).record(seconds);
}
