use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A text generation service that answers a complete prompt in one shot.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Raw backend text, untrimmed. Empty output is not an error here.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "mistral".to_string(),
            timeout_secs: 20,
        }
    }
}

impl OllamaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Ollama's `/api/generate` endpoint, non-streaming.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    generate_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig) -> Result<Self, BackendError> {
        let timeout = config.timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            generate_url: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            timeout,
        })
    }

    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.generate_url)
            .json(&request)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|err| self.classify(err))?;
        let parsed: GenerateResponse = serde_json::from_slice(&bytes)
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;

        Ok(parsed.response.unwrap_or_default())
    }
}

impl OllamaBackend {
    fn classify(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::Unavailable(err)
        }
    }
}
