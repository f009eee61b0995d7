//! AI service clients.
//!
//! Gemini handles frame descriptions and summaries; an OpenAI-compatible
//! endpoint handles speech-to-text. The pipeline only depends on the traits in
//! [`model`].

pub mod error;
pub mod gemini;
pub mod model;
mod types;
pub mod whisper;

pub use error::{AiError, AiResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use model::{strip_code_fences, SpeechToText, TextModel, VisionModel};
pub use whisper::{WhisperClient, WhisperConfig};
