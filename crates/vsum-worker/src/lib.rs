//! Video summarization pipeline.
//!
//! Samples still frames from a video, describes them concurrently with a
//! vision model, transcribes the audio track and condenses everything into a
//! titled summary document. All intermediate results live in an on-disk Work
//! Unit so an interrupted or failed run can be resumed.

pub mod config;
pub mod describe;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod shutdown;
pub mod summarize;
pub mod transcribe;
pub mod work_unit;

pub use config::WorkerConfig;
pub use describe::{DescribeEngine, DescribeReport};
pub use error::{exit_code, WorkerError, WorkerResult};
pub use ledger::Ledger;
pub use logging::RunLogger;
pub use pipeline::{Pipeline, PipelineServices, RunReport, UnitState};
pub use retry::{retry_async, PassKind, RepairSchedule, RetryConfig, RetryResult, RetryState};
pub use shutdown::{spawn_signal_listener, CancelToken, InterruptSnapshot, RunTracker, Signal};
pub use summarize::Summarizer;
pub use transcribe::Transcriber;
pub use work_unit::{SourceStamp, UnitManifest, WorkUnit};
