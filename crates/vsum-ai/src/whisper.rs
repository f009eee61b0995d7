//! Speech-to-text client for OpenAI-compatible transcription endpoints.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::model::SpeechToText;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "whisper-1";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl WhisperConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load from the environment. Returns `None` when no credential is set,
    /// which disables transcription.
    pub fn from_env() -> Option<Self> {
        let api_key = ["TRANSCRIBE_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|k| k.trim().to_string())
            .find(|k| !k.is_empty())?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("TRANSCRIBE_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(model) = std::env::var("TRANSCRIBE_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        Some(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct WhisperClient {
    http: Client,
    config: WhisperConfig,
}

impl WhisperClient {
    pub fn new(config: WhisperConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, audio: &Path) -> AiResult<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        debug!(bytes = bytes.len(), model = %self.config.model, "Uploading audio for transcription");

        let file = Part::bytes(bytes).file_name(file_name).mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "text")
            .part("file", file);

        let url = format!("{}/audio/transcriptions", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AiError::from_http_status(status.as_u16(), body));
        }

        Ok(body.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn wav_file(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("audio.wav");
        tokio::fs::write(&path, vec![0u8; 128]).await.unwrap();
        path
    }

    fn client_for(server: &MockServer) -> WhisperClient {
        WhisperClient::new(
            WhisperConfig::new("sk-test")
                .with_base_url(server.uri())
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_transcribe_returns_trimmed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  hello there\n"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = wav_file(dir.path()).await;
        let text = client_for(&server).transcribe(&audio).await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn test_transcribe_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(413).set_body_string("file too large"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = wav_file(dir.path()).await;
        let err = client_for(&server).transcribe(&audio).await.unwrap_err();
        assert_eq!(err.http_status(), Some(413));
        assert!(err.to_string().contains("file too large"));
    }

    #[tokio::test]
    async fn test_missing_audio_file_is_io_error() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .transcribe(Path::new("/nonexistent/audio.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Io(_)));
    }
}
