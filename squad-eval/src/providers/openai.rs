//! OpenAI API client: chat completions and the Batch API

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};
use crate::batch::{BatchBackend, BatchJob};
use crate::runner::rate_limiter::RateLimiter;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    default_model: String,
}

impl OpenAIClient {
    /// Create a new OpenAI client
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: Client::new(),
            rate_limiter: Arc::new(RateLimiter::new(500, 200_000)),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> ProviderResult<Self> {
        Self::from_env_var("OPENAI_API_KEY")
    }

    /// Create from a named environment variable
    pub fn from_env_var(var: &str) -> ProviderResult<Self> {
        let api_key = std::env::var(var)
            .map_err(|_| ProviderError::Config(format!("{} not set", var)))?;
        Ok(Self::new(api_key))
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
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

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl From<Message> for OpenAIMessage {
    fn from(msg: Message) -> Self {
        Self {
            role: msg.role,
            content: Some(msg.content),
        }
    }
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    model: String,
    usage: OpenAIUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

#[derive(Serialize)]
struct CreateBatchRequest<'a> {
    input_file_id: &'a str,
    endpoint: &'a str,
    completion_window: &'a str,
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
}

/// Turn non-success responses into provider errors
async fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60)
            * 1000;

        // 429 covers both rate limiting and an exhausted quota; only the
        // former is worth waiting for.
        let body = response.text().await.unwrap_or_default();
        if let Ok(error) = serde_json::from_str::<OpenAIError>(&body) {
            let error_type = error.error.error_type.as_deref().unwrap_or("");
            if error_type == "insufficient_quota" || error.error.message.contains("exceeded your current quota") {
                return Err(ProviderError::Config(format!(
                    "OpenAI quota exceeded: {}",
                    error.error.message
                )));
            }
            tracing::debug!("Rate limited (type={}): {}", error_type, error.error.message);
        }

        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after,
        });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<OpenAIError>(&body) {
            Ok(error) => error.error.message,
            Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
        };

        if status == 401 || status == 403 {
            return Err(ProviderError::Config(format!(
                "OpenAI auth error ({}): {}",
                status.as_u16(),
                message
            )));
        }

        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let _guard = self.rate_limiter.acquire().await;

        let start = Instant::now();

        let body = OpenAIRequest {
            model: self.default_model.clone(),
            messages: request.full_messages().into_iter().map(Into::into).collect(),
            max_tokens: request.max_tokens,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let api_response: OpenAIResponse = check_status(response).await?.json().await?;

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
            model: api_response.model,
            input_tokens: api_response.usage.prompt_tokens,
            output_tokens: api_response.usage.completion_tokens,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "unknown".to_string()),
            latency_ms,
        })
    }
}

#[async_trait]
impl BatchBackend for OpenAIClient {
    async fn upload_batch_file(&self, filename: &str, content: Vec<u8>) -> ProviderResult<String> {
        let part = multipart::Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str("application/jsonl")?;
        let form = multipart::Form::new()
            .text("purpose", "batch")
            .part("file", part);

        let response = self
            .http_client
            .post(format!("{}/files", self.base_url))
            .header("Authorization", self.auth_header())
            .multipart(form)
            .send()
            .await?;

        let file: FileObject = check_status(response).await?.json().await?;
        Ok(file.id)
    }

    async fn create_batch(
        &self,
        input_file_id: &str,
        endpoint: &str,
        completion_window: &str,
    ) -> ProviderResult<BatchJob> {
        let body = CreateBatchRequest {
            input_file_id,
            endpoint,
            completion_window,
        };

        let response = self
            .http_client
            .post(format!("{}/batches", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn retrieve_batch(&self, batch_id: &str) -> ProviderResult<BatchJob> {
        let response = self
            .http_client
            .get(format!("{}/batches/{}", self.base_url, batch_id))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn download_file(&self, file_id: &str) -> ProviderResult<Vec<u8>> {
        let response = self
            .http_client
            .get(format!("{}/files/{}/content", self.base_url, file_id))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
