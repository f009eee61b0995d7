//! Model validation errors.

use std::path::PathBuf;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Video file not found: {0}")]
    VideoNotFound(PathBuf),

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Video path has no usable file name: {0}")]
    InvalidFileName(PathBuf),

    #[error("Invalid sampling plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid summary: {0}")]
    InvalidSummary(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub fn invalid_summary(msg: impl Into<String>) -> Self {
        Self::InvalidSummary(msg.into())
    }

    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        Self::InvalidPlan(msg.into())
    }
}
