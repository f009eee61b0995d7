//! Summary generation with bounded retries.

use std::fmt::Write;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};
use vsum_ai::{strip_code_fences, TextModel};
use vsum_models::summary::{MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS, MIN_DESCRIPTION_CHARS};
use vsum_models::{FrameDescription, Summary};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig, RetryResult};
use crate::shutdown::CancelToken;

/// Raw model answer before validation.
#[derive(Debug, Deserialize)]
struct RawSummary {
    title: String,
    description: String,
}

/// Build the summarization prompt from time-ordered frame descriptions and
/// an optional transcript snippet.
pub fn summary_prompt(descriptions: &[FrameDescription], transcript: Option<&str>) -> String {
    let mut prompt =
        String::from("You are given timestamped descriptions of frames sampled from a video");
    if transcript.is_some() {
        prompt.push_str(" and an excerpt of its audio transcript");
    }
    let _ = write!(
        prompt,
        ".\nWrite a summary of the whole video.\n\n\
         Return ONLY a single JSON object with exactly two keys:\n\
         {{\"title\": \"...\", \"description\": \"...\"}}\n\n\
         Rules:\n\
         - title: a short descriptive title, at most {} characters.\n\
         - description: one prose paragraph of {} to {} characters describing what happens.\n\
         - No lists, no timestamps, no Markdown, no text outside the JSON object.\n\n\
         FRAME DESCRIPTIONS:\n",
        MAX_TITLE_CHARS, MIN_DESCRIPTION_CHARS, MAX_DESCRIPTION_CHARS
    );
    for record in descriptions {
        prompt.push_str(&record.prompt_line());
        prompt.push('\n');
    }
    if let Some(transcript) = transcript {
        prompt.push_str("\nTRANSCRIPT EXCERPT:\n");
        prompt.push_str(transcript.trim());
        prompt.push('\n');
    }
    prompt
}

/// Parse and validate a model answer.
pub fn parse_summary(raw: &str) -> Result<Summary, String> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err("empty response".to_string());
    }
    let parsed: RawSummary =
        serde_json::from_str(text).map_err(|e| format!("malformed JSON: {}", e))?;
    Summary::new(&parsed.title, &parsed.description).map_err(|e| e.to_string())
}

/// Summary plus the attempts it took.
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub summary: Summary,
    pub attempts: u32,
}

pub struct Summarizer {
    model: Arc<dyn TextModel>,
    retry: RetryConfig,
    cancel: CancelToken,
}

impl Summarizer {
    pub fn new(model: Arc<dyn TextModel>, retry: RetryConfig, cancel: CancelToken) -> Self {
        Self {
            model,
            retry,
            cancel,
        }
    }

    pub async fn summarize(
        &self,
        descriptions: &[FrameDescription],
        transcript: Option<&str>,
    ) -> WorkerResult<SummaryOutcome> {
        let prompt = summary_prompt(descriptions, transcript);

        let attempts = retry_async(&self.retry, |attempt| {
            let prompt = &prompt;
            async move {
                let raw = self
                    .model
                    .generate(prompt, true)
                    .await
                    .map_err(|e| e.to_string())?;
                match parse_summary(&raw) {
                    Ok(summary) => {
                        metrics::record_summary_attempt("ok");
                        Ok(summary)
                    }
                    Err(reason) => {
                        warn!(attempt, stage = "summarize", "Rejected summary: {}", reason);
                        metrics::record_summary_attempt("invalid");
                        Err(reason)
                    }
                }
            }
        });

        let result = tokio::select! {
            result = attempts => result,
            _ = self.cancel.cancelled() => return Err(WorkerError::Interrupted),
        };

        match result {
            RetryResult::Success { value, attempts } => {
                info!(attempts, title = %value.title, "Summary generated");
                Ok(SummaryOutcome {
                    summary: value,
                    attempts,
                })
            }
            RetryResult::Failed { error, attempts } => Err(WorkerError::SummaryExhausted {
                attempts,
                last_error: error,
            }),
        }
    }
}
