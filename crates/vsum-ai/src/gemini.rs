//! Gemini client for frame descriptions and summaries.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{AiError, AiResult};
use crate::model::{TextModel, VisionModel};
use crate::types::{Content, GenerateRequest, GenerateResponse, GenerationConfig, Part};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.0-flash"];
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Models tried in order for every call
    pub models: Vec<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load from `GEMINI_API_KEY`, `GEMINI_MODELS` and `GEMINI_BASE_URL`.
    pub fn from_env() -> AiResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AiError::config("GEMINI_API_KEY not set"))?;

        let mut config = Self::new(api_key.trim());
        if let Ok(models) = std::env::var("GEMINI_MODELS") {
            let models = parse_model_list(&models);
            if !models.is_empty() {
                config.models = models;
            }
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Gemini API client.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> AiResult<Self> {
        if config.models.is_empty() {
            return Err(AiError::config("no Gemini models configured"));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> AiResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn models(&self) -> &[String] {
        &self.config.models
    }

    /// Send `parts` to each configured model in turn until one answers.
    async fn generate_with_fallback(&self, parts: Vec<Part>, json_output: bool) -> AiResult<String> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: json_output.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        };

        let mut last_error = None;
        for model in &self.config.models {
            debug!(model = %model, "Calling Gemini");
            match self.call_model(model, &request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(model = %model, status = ?e.http_status(), "Gemini call failed: {}", e);
                    // A rejected key fails the same way on every model.
                    let stop = matches!(e, AiError::Http { status: 401 | 403, .. });
                    last_error = Some(e);
                    if stop {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AiError::config("no Gemini models configured")))
    }

    async fn call_model(&self, model: &str, request: &GenerateRequest) -> AiResult<String> {
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_http_status(status.as_u16(), body));
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AiError::invalid_response(format!("unparseable Gemini response: {}", e)))?;

        match parsed.first_text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(AiError::EmptyResponse),
        }
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn describe_image(&self, image: &[u8], mime_type: &str, prompt: &str) -> AiResult<String> {
        let data = base64::engine::general_purpose::STANDARD.encode(image);
        let parts = vec![Part::text(prompt), Part::inline(mime_type, data)];
        self.generate_with_fallback(parts, false).await
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate(&self, prompt: &str, json_output: bool) -> AiResult<String> {
        self.generate_with_fallback(vec![Part::text(prompt)], json_output)
            .await
    }
}
