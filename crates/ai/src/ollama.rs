//! Ollama-compatible text generation client (`POST /api/generate`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use fraudwatch_core::{Transaction, Verdict};

use crate::classifier::FraudClassifier;
use crate::error::AiError;
use crate::prompt::build_prompt;

/// Default model tag.
pub const DEFAULT_MODEL: &str = "qwen:0.5b";

/// Default service address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Generation parameters and transport settings.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Context window (`num_ctx`).
    pub num_ctx: u32,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            num_ctx: 2048,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default = "empty_object")]
    response: String,
}

fn empty_object() -> String {
    "{}".to_string()
}

/// Blocking client for an Ollama-compatible generation endpoint.
///
/// A fresh `reqwest::blocking::Client` is built per call, so the client can be
/// constructed anywhere but `classify` must run off the async runtime.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url)
    }

    /// Send one non-streaming, JSON-formatted generation request and return
    /// the raw `response` text.
    fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_ctx: self.config.num_ctx,
            },
        };

        let http = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| AiError::Transport(format!("failed to build http client: {e}")))?;

        let response = http
            .post(self.generate_url())
            .json(&body)
            .send()
            .map_err(|e| AiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GenerateResponse = response
            .json()
            .map_err(|e| AiError::MalformedResponse(format!("generate envelope: {e}")))?;
        Ok(envelope.response)
    }
}

impl FraudClassifier for OllamaClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model, user_id = %transaction.user_id), err)]
    fn classify(&self, transaction: &Transaction, history: &[Transaction]) -> Result<Verdict, AiError> {
        let prompt = build_prompt(transaction, history)?;
        let text = self.generate(&prompt)?;
        debug!(len = text.len(), "model answered");

        let output: Value = serde_json::from_str(&text)
            .map_err(|e| AiError::MalformedResponse(format!("model output is not JSON: {e}")))?;

        Ok(Verdict::from_model_output(&output))
    }
}
