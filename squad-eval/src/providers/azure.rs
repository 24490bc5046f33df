//! Azure AI model inference client (serverless chat completions)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};
use crate::runner::rate_limiter::RateLimiter;

const DEFAULT_MODEL: &str = "Llama-3.2-11B-Vision-Instruct";
const API_VERSION: &str = "2024-05-01-preview";

/// Client for an Azure AI inference endpoint
pub struct AzureInferenceClient {
    api_key: String,
    endpoint: String,
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    default_model: String,
}

impl AzureInferenceClient {
    /// Create a new client for the given endpoint
    pub fn new(endpoint: impl Into<String>, api_key: String) -> Self {
        Self {
            api_key,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
            rate_limiter: Arc::new(RateLimiter::new(60, 100_000)),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create from the default environment variables
    pub fn from_env() -> ProviderResult<Self> {
        Self::from_env_vars("AZURE_MLSTUDIO_ENDPOINT", "AZURE_MLSTUDIO_KEY")
    }

    /// Create from named environment variables
    pub fn from_env_vars(endpoint_var: &str, key_var: &str) -> ProviderResult<Self> {
        let endpoint = std::env::var(endpoint_var)
            .map_err(|_| ProviderError::Config(format!("{} not set", endpoint_var)))?;
        let api_key = std::env::var(key_var)
            .map_err(|_| ProviderError::Config(format!("{} not set", key_var)))?;
        Ok(Self::new(endpoint, api_key))
    }

    /// Set custom rate limits
    pub fn with_rate_limits(mut self, rpm: u32, tpm: u32) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::new(rpm, tpm));
        self
    }

    /// Set default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[derive(Serialize)]
struct AzureRequest {
    messages: Vec<AzureMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct AzureMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl From<Message> for AzureMessage {
    fn from(msg: Message) -> Self {
        Self {
            role: msg.role,
            content: Some(msg.content),
        }
    }
}

#[derive(Deserialize)]
struct AzureResponse {
    choices: Vec<AzureChoice>,
    #[serde(default)]
    model: Option<String>,
    usage: AzureUsage,
}

#[derive(Deserialize)]
struct AzureChoice {
    message: AzureMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct AzureUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct AzureError {
    error: AzureErrorDetail,
}

#[derive(Deserialize)]
struct AzureErrorDetail {
    message: String,
}

#[async_trait]
impl LLMProvider for AzureInferenceClient {
    fn name(&self) -> &str {
        "azure"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let _guard = self.rate_limiter.acquire().await;

        let start = Instant::now();

        let body = AzureRequest {
            messages: request.full_messages().into_iter().map(Into::into).collect(),
            max_tokens: request.max_tokens,
        };

        // Serverless deployments accept either header; send both.
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.endpoint))
            .query(&[("api-version", API_VERSION)])
            .header("api-key", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60)
                * 1000;
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<AzureError>(&body) {
                Ok(error) => error.error.message,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: AzureResponse = response.json().await?;

        self.rate_limiter
            .record_tokens(api_response.usage.prompt_tokens + api_response.usage.completion_tokens)
            .await;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response
                .model
                .unwrap_or_else(|| self.default_model.clone()),
            input_tokens: api_response.usage.prompt_tokens,
            output_tokens: api_response.usage.completion_tokens,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "unknown".to_string()),
            latency_ms,
        })
    }
}
