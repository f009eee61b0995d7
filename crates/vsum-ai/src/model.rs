//! Model seams used by the pipeline.
//!
//! Each trait covers one capability so the worker can swap a real client for
//! a scripted fake in tests.

use std::path::Path;

use async_trait::async_trait;

use crate::error::AiResult;

/// A model that can describe a still image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Describe `image` (raw bytes of type `mime_type`) following `prompt`.
    async fn describe_image(&self, image: &[u8], mime_type: &str, prompt: &str) -> AiResult<String>;
}

/// A text-only generation model.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Generate a completion. With `json_output` the model is asked for a
    /// JSON document, which the caller still has to validate.
    async fn generate(&self, prompt: &str, json_output: bool) -> AiResult<String>;
}

/// Speech-to-text over an audio file on disk.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> AiResult<String>;
}

/// Strip surrounding whitespace and Markdown code fences from model output.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = match text.strip_prefix("```") {
        Some(rest) => {
            // Drop the info string ("json", "JSON", ...) on the fence line.
            match rest.find('\n') {
                Some(nl) if !rest[..nl].trim().contains(' ') => &rest[nl + 1..],
                _ => rest,
            }
        }
        None => text,
    };
    let text = text.trim_end();
    text.strip_suffix("```").unwrap_or(text).trim()
}
