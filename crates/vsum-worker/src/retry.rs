//! Retry and repair policies.
//!
//! Both are small explicit state machines so their transitions can be tested
//! without any I/O: [`RetryState`] drives bounded attempts with a fixed
//! backoff, [`RepairSchedule`] drives the frame description passes.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Position of a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt `attempt` (1-based) should run now.
    Ready { attempt: u32 },
    /// Attempt `attempt` failed; wait out the backoff before the next one.
    Backoff { attempt: u32 },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Ready { attempt: 1 }
    }

    pub fn on_success(self) -> Self {
        match self {
            RetryState::Ready { attempt } => RetryState::Succeeded { attempts: attempt },
            other => other,
        }
    }

    pub fn on_failure(self, max_attempts: u32) -> Self {
        match self {
            RetryState::Ready { attempt } if attempt >= max_attempts => {
                RetryState::Exhausted { attempts: attempt }
            }
            RetryState::Ready { attempt } => RetryState::Backoff { attempt },
            other => other,
        }
    }

    pub fn after_backoff(self) -> Self {
        match self {
            RetryState::Backoff { attempt } => RetryState::Ready {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded { .. } | RetryState::Exhausted { .. }
        )
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success { value: T, attempts: u32 },
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. } | RetryResult::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Execute an async operation under `config`.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut state = RetryState::start();

    loop {
        match state {
            RetryState::Ready { attempt } => match operation(attempt).await {
                Ok(value) => {
                    return RetryResult::Success {
                        value,
                        attempts: attempt,
                    }
                }
                Err(error) => {
                    state = state.on_failure(max_attempts);
                    if let RetryState::Exhausted { attempts } = state {
                        warn!(
                            operation = %config.operation_name,
                            attempts,
                            "Giving up: {}", error
                        );
                        return RetryResult::Failed { error, attempts };
                    }
                    debug!(
                        operation = %config.operation_name,
                        attempt,
                        delay_ms = config.delay.as_millis() as u64,
                        "Attempt failed, retrying: {}", error
                    );
                }
            },
            RetryState::Backoff { .. } => {
                tokio::time::sleep(config.delay).await;
                state = state.after_backoff();
            }
            RetryState::Succeeded { .. } | RetryState::Exhausted { .. } => {
                unreachable!("terminal retry states return from the Ready arm")
            }
        }
    }
}

/// Kind of frame description pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Primary,
    Repair,
    Rescue,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Primary => "primary",
            PassKind::Repair => "repair",
            PassKind::Rescue => "rescue",
        }
    }
}

/// Pass schedule for frame descriptions.
///
/// Primary pass, then one repair pass over frames still missing, then a
/// rescue pass only when not a single description exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairSchedule {
    #[default]
    Primary,
    Repair,
    Rescue,
    Done,
}

impl RepairSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass to run now, `None` once the schedule is finished.
    pub fn current(&self) -> Option<PassKind> {
        match self {
            RepairSchedule::Primary => Some(PassKind::Primary),
            RepairSchedule::Repair => Some(PassKind::Repair),
            RepairSchedule::Rescue => Some(PassKind::Rescue),
            RepairSchedule::Done => None,
        }
    }

    /// Advance after a pass left `missing` frames and `described` frames in total.
    pub fn advance(self, missing: usize, described: usize) -> Self {
        match self {
            RepairSchedule::Primary if missing > 0 => RepairSchedule::Repair,
            RepairSchedule::Repair if missing > 0 && described == 0 => RepairSchedule::Rescue,
            _ => RepairSchedule::Done,
        }
    }
}
