//! Worker error types and process exit codes.

use std::path::PathBuf;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Process exit statuses.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const INTERNAL: i32 = 1;
    pub const BAD_INPUT: i32 = 2;
    pub const EXTRACTION: i32 = 3;
    pub const NO_DESCRIPTIONS: i32 = 4;
    pub const SUMMARY_EXHAUSTED: i32 = 5;
    pub const OUTPUT_WRITE: i32 = 6;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("No frame descriptions after {frames} frames and all repair passes")]
    NoDescriptions { frames: usize },

    #[error("Summarization failed after {attempts} attempts: {last_error}")]
    SummaryExhausted { attempts: u32, last_error: String },

    #[error("Failed to write {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Interrupted")]
    Interrupted,

    #[error("Model error: {0}")]
    Model(#[from] vsum_models::ModelError),

    #[error("Media error: {0}")]
    Media(#[from] vsum_media::MediaError),

    #[error("AI service error: {0}")]
    Ai(#[from] vsum_ai::AiError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn extraction_failed(msg: impl Into<String>) -> Self {
        Self::ExtractionFailed(msg.into())
    }

    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        match self {
            WorkerError::Interrupted => true,
            WorkerError::Media(e) => matches!(e, vsum_media::MediaError::Cancelled),
            _ => false,
        }
    }

    /// Exit status reported by the binary for this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_interrupted() {
            return exit_code::INTERRUPTED;
        }
        match self {
            WorkerError::InvalidInput(_) | WorkerError::ConfigError(_) => exit_code::BAD_INPUT,
            WorkerError::Model(e) => match e {
                vsum_models::ModelError::Io(_) => exit_code::INTERNAL,
                _ => exit_code::BAD_INPUT,
            },
            WorkerError::Ai(vsum_ai::AiError::Config(_)) => exit_code::BAD_INPUT,
            WorkerError::ExtractionFailed(_) | WorkerError::Media(_) => exit_code::EXTRACTION,
            WorkerError::NoDescriptions { .. } => exit_code::NO_DESCRIPTIONS,
            WorkerError::SummaryExhausted { .. } => exit_code::SUMMARY_EXHAUSTED,
            WorkerError::OutputWrite { .. } => exit_code::OUTPUT_WRITE,
            _ => exit_code::INTERNAL,
        }
    }
}
