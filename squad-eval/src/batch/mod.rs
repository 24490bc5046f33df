//! Batch job plumbing: JSONL request/result records, the remote batch
//! backend seam, status polling and the submit-and-download workflow.

pub mod poller;
pub mod submit;

pub use poller::{poll_until_complete, PollOutcome, PollPolicy};
pub use submit::{submit_and_wait, BatchRun};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::providers::{Message, ProviderError, ProviderResult, ResponseFormat};

/// Endpoint every batch line targets
pub const CHAT_COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";

/// One line of a batch input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: ChatRequestBody,
}

/// Chat completion body embedded in a batch request line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequestBody {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl BatchRequest {
    /// A POST to the chat completions endpoint
    pub fn chat(
        custom_id: impl Into<String>,
        model: impl Into<String>,
        temperature: Option<f32>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            custom_id: custom_id.into(),
            method: "POST".to_string(),
            url: CHAT_COMPLETIONS_ENDPOINT.to_string(),
            body: ChatRequestBody {
                model: model.into(),
                temperature,
                messages,
                response_format: None,
            },
        }
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.body.response_format = Some(format);
        self
    }

    /// Content of the last user message
    pub fn user_content(&self) -> Option<&str> {
        self.body
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

/// One line of a batch output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResultLine {
    #[serde(default)]
    pub id: Option<String>,
    pub custom_id: String,
    #[serde(default)]
    pub response: Option<BatchResponse>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub request_id: Option<String>,
    pub body: ChatResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponseBody {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ResultChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultChoice {
    pub message: ResultMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage {
    #[serde(default)]
    pub role: Option<String>,
    /// Null when the model refused
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl BatchResultLine {
    /// Text of the first choice, if the request succeeded
    pub fn content(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .body
            .choices
            .first()?
            .message
            .content
            .as_deref()
    }

    pub fn usage(&self) -> TokenUsage {
        self.response
            .as_ref()
            .and_then(|r| r.body.usage)
            .unwrap_or_default()
    }
}

/// Remote batch job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Validating,
    Failed,
    InProgress,
    Finalizing,
    Completed,
    Expired,
    Cancelling,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Validating => "validating",
            BatchStatus::Failed => "failed",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Finalizing => "finalizing",
            BatchStatus::Completed => "completed",
            BatchStatus::Expired => "expired",
            BatchStatus::Cancelling => "cancelling",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Unknown => "unknown",
        }
    }

    /// The job can no longer complete
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BatchStatus::Failed | BatchStatus::Expired | BatchStatus::Cancelling | BatchStatus::Cancelled
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
}

/// A batch job as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub status: BatchStatus,
    #[serde(default)]
    pub input_file_id: Option<String>,
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub error_file_id: Option<String>,
    #[serde(default)]
    pub request_counts: Option<RequestCounts>,
}

/// Remote service that accepts batch input files and runs them as jobs
#[async_trait]
pub trait BatchBackend: Send + Sync {
    /// Upload a JSONL file for batch use, returning its file id
    async fn upload_batch_file(&self, filename: &str, content: Vec<u8>) -> ProviderResult<String>;

    /// Create a job over an uploaded input file
    async fn create_batch(
        &self,
        input_file_id: &str,
        endpoint: &str,
        completion_window: &str,
    ) -> ProviderResult<BatchJob>;

    /// Fetch the current state of a job
    async fn retrieve_batch(&self, batch_id: &str) -> ProviderResult<BatchJob>;

    /// Download the raw content of a file
    async fn download_file(&self, file_id: &str) -> ProviderResult<Vec<u8>>;
}

/// Errors from batch submission, polling and record parsing
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Batch {batch_id} ended with status {status}")]
    JobFailed { batch_id: String, status: BatchStatus },

    #[error("Batch {batch_id} still {status} after {attempts} status checks")]
    StillPending {
        batch_id: String,
        status: BatchStatus,
        attempts: u32,
    },

    #[error("Batch {batch_id} completed without an output file")]
    MissingOutput { batch_id: String },
}

/// Serialize records as newline-delimited JSON
pub fn to_jsonl<T: Serialize>(records: &[T]) -> Result<String, BatchError> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Write records to a JSONL file, replacing any previous content
pub fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<usize, BatchError> {
    let content = to_jsonl(records)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(records.len())
}

/// Parse newline-delimited JSON, skipping blank lines
pub fn parse_jsonl<T: DeserializeOwned>(content: &str) -> Result<Vec<T>, BatchError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line.trim()).map_err(|source| BatchError::Json {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Read and parse a JSONL file
pub fn read_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, BatchError> {
    let content = std::fs::read_to_string(path)?;
    parse_jsonl(&content)
}

/// Key result lines by their correlation id, keeping file order
pub fn index_by_custom_id(lines: Vec<BatchResultLine>) -> IndexMap<String, BatchResultLine> {
    lines
        .into_iter()
        .map(|line| (line.custom_id.clone(), line))
        .collect()
}
