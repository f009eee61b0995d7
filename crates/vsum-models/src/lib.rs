//! Shared data models for the vsum pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video references and Work Unit keys
//! - Sampled frames and the sampling plan
//! - Per-frame description records (the ledger format)
//! - Validated summaries and their rendered documents

pub mod description;
pub mod error;
pub mod frame;
pub mod summary;
pub mod timestamp;
pub mod video;

// Re-export common types
pub use description::{sort_by_time, FrameDescription};
pub use error::{ModelError, ModelResult};
pub use frame::{Frame, SamplingPlan};
pub use summary::{normalize_whitespace, Summary, SummaryFormat, ADVISORY_NOTE};
pub use timestamp::format_timecode;
pub use video::{sanitize_unit_key, VideoRef};
