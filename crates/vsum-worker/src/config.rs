//! Pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vsum_models::{SamplingPlan, SummaryFormat};

use crate::error::{WorkerError, WorkerResult};
use crate::retry::RetryConfig;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Seconds between sampled frames
    pub interval_secs: u32,
    /// Upper bound on sampled frames
    pub max_frames: u32,
    /// Output directory; the video's own directory when unset
    pub summaries_dir: Option<PathBuf>,
    /// Simultaneous frame description requests
    pub concurrency: usize,
    /// Root under which Work Units are created
    pub work_dir: PathBuf,
    /// Keep the Work Unit after a successful run
    pub keep_work: bool,
    pub output_format: SummaryFormat,
    /// Maximum width of extracted frames in pixels
    pub frame_max_width: u32,
    /// Timeout for a single AI service request
    pub request_timeout: Duration,
    /// Interval between "still waiting" logs of an in-flight request
    pub heartbeat_interval: Duration,
    /// Total summarization attempts
    pub summary_attempts: u32,
    /// Fixed delay between summarization attempts
    pub summary_backoff: Duration,
    /// Transcript characters included in the summary prompt
    pub transcript_snippet_chars: usize,
    /// Timeout for a single ffmpeg invocation
    pub ffmpeg_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_frames: 50,
            summaries_dir: None,
            concurrency: 3,
            work_dir: PathBuf::from("/tmp/vsum"),
            keep_work: false,
            output_format: SummaryFormat::Markdown,
            frame_max_width: 768,
            request_timeout: Duration::from_secs(120),
            heartbeat_interval: Duration::from_secs(15),
            summary_attempts: 3,
            summary_backoff: Duration::from_millis(2000),
            transcript_snippet_chars: 4000,
            ffmpeg_timeout: Duration::from_secs(600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval_secs: env_or("VSUM_INTERVAL_SECS", defaults.interval_secs),
            max_frames: env_or("VSUM_MAX_FRAMES", defaults.max_frames),
            summaries_dir: std::env::var("VSUM_SUMMARIES_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            concurrency: env_or("VSUM_CONCURRENCY", defaults.concurrency),
            work_dir: std::env::var("VSUM_WORK_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            keep_work: std::env::var("VSUM_KEEP_WORK")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.keep_work),
            output_format: env_or("VSUM_OUTPUT_FORMAT", defaults.output_format),
            frame_max_width: env_or("VSUM_FRAME_MAX_WIDTH", defaults.frame_max_width),
            request_timeout: Duration::from_secs(env_or("VSUM_REQUEST_TIMEOUT_SECS", 120)),
            heartbeat_interval: Duration::from_secs(env_or("VSUM_HEARTBEAT_SECS", 15)),
            summary_attempts: env_or("VSUM_SUMMARY_ATTEMPTS", defaults.summary_attempts),
            summary_backoff: Duration::from_millis(env_or("VSUM_SUMMARY_BACKOFF_MS", 2000)),
            transcript_snippet_chars: env_or(
                "VSUM_TRANSCRIPT_SNIPPET_CHARS",
                defaults.transcript_snippet_chars,
            ),
            ffmpeg_timeout: Duration::from_secs(env_or("VSUM_FFMPEG_TIMEOUT_SECS", 600)),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        SamplingPlan::new(self.interval_secs, self.max_frames)?;
        if self.concurrency == 0 {
            return Err(WorkerError::config_error("concurrency must be at least 1"));
        }
        if self.summary_attempts == 0 {
            return Err(WorkerError::config_error("summary attempts must be at least 1"));
        }
        if self.frame_max_width < 16 {
            return Err(WorkerError::config_error("frame max width must be at least 16 pixels"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(WorkerError::config_error("heartbeat interval must be positive"));
        }
        Ok(())
    }

    pub fn sampling_plan(&self) -> WorkerResult<SamplingPlan> {
        Ok(SamplingPlan::new(self.interval_secs, self.max_frames)?)
    }

    /// Retry policy of the summarizer.
    pub fn summary_retry(&self) -> RetryConfig {
        RetryConfig::new("summarize")
            .with_max_attempts(self.summary_attempts)
            .with_delay(self.summary_backoff)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.max_frames, 50);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.summary_attempts, 3);
        assert_eq!(config.summary_backoff, Duration::from_secs(2));
        assert_eq!(config.output_format, SummaryFormat::Markdown);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = WorkerConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            summary_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_summary_retry_follows_config() {
        let config = WorkerConfig {
            summary_attempts: 5,
            summary_backoff: Duration::from_millis(10),
            ..Default::default()
        };
        let retry = config.summary_retry();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.delay, Duration::from_millis(10));
    }
}
