//! Audio transcription stage.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use vsum_ai::SpeechToText;

use crate::metrics;
use crate::shutdown::CancelToken;
use crate::work_unit::WorkUnit;

pub struct Transcriber {
    stt: Option<Arc<dyn SpeechToText>>,
    cancel: CancelToken,
}

impl Transcriber {
    /// `stt` is `None` when no speech-to-text credential is configured.
    pub fn new(stt: Option<Arc<dyn SpeechToText>>, cancel: CancelToken) -> Self {
        Self { stt, cancel }
    }

    /// Transcript for the run, reusing the unit's cached copy when present.
    ///
    /// Never fails the run: every error is logged and yields `None`.
    pub async fn transcribe(&self, unit: &WorkUnit, audio: Option<&Path>) -> Option<String> {
        if let Some(cached) = unit.load_transcript().await {
            info!(chars = cached.chars().count(), "Reusing cached transcript");
            metrics::record_transcription("cached");
            return Some(cached);
        }

        let Some(stt) = &self.stt else {
            warn!(stage = "transcribe", "No speech-to-text credential configured, transcription disabled");
            metrics::record_transcription("disabled");
            return None;
        };
        let audio = audio?;

        let result = tokio::select! {
            result = stt.transcribe(audio) => result,
            _ = self.cancel.cancelled() => return None,
        };

        match result {
            Ok(text) if !text.trim().is_empty() => {
                if let Err(e) = unit.store_transcript(&text).await {
                    warn!(stage = "transcribe", "Failed to cache transcript: {}", e);
                }
                info!(chars = text.chars().count(), "Audio transcribed");
                metrics::record_transcription("ok");
                Some(text.trim().to_string())
            }
            Ok(_) => {
                info!("Transcription returned no speech");
                metrics::record_transcription("empty");
                None
            }
            Err(e) => {
                warn!(
                    stage = "transcribe",
                    status = ?e.http_status(),
                    "Transcription failed, continuing without transcript: {}", e
                );
                metrics::record_transcription("error");
                None
            }
        }
    }
}

/// First `max_chars` characters of `transcript`, cut on a character boundary.
pub fn transcript_snippet(transcript: &str, max_chars: usize) -> &str {
    let transcript = transcript.trim();
    match transcript.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &transcript[..byte_idx],
        None => transcript,
    }
}
