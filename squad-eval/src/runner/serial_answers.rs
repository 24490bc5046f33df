//! Serial answer generation: one blocking chat call per question

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::dataset::QuestionRecord;
use crate::providers::{CompletionRequest, LLMProvider, Message, ProviderError};

use super::AnswerRecord;

/// Totals for one serial run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerialSummary {
    pub answered: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub last: Option<AnswerRecord>,
}

impl SerialSummary {
    /// Estimated cost given per-1K token prices
    pub fn cost(&self, input_per_1k: f64, output_per_1k: f64) -> f64 {
        self.input_tokens as f64 * input_per_1k / 1000.0
            + self.output_tokens as f64 * output_per_1k / 1000.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Question {index} failed: {source}")]
    Provider {
        index: usize,
        #[source]
        source: ProviderError,
    },
}

/// Sends questions to a chat provider one at a time
pub struct SerialAnswerer {
    provider: Arc<dyn LLMProvider + Send + Sync>,
    system_prompt: String,
    max_tokens: Option<u32>,
}

impl SerialAnswerer {
    pub fn new(provider: Arc<dyn LLMProvider + Send + Sync>, system_prompt: impl Into<String>) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.into(),
            max_tokens: None,
        }
    }

    /// Cap completion length; without this the request carries no limit
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Answer every question, appending one JSON line per answer to `output`.
    ///
    /// Each line is flushed before the next request goes out, so a failure
    /// leaves every earlier answer on disk. The file is never truncated.
    pub async fn run(
        &self,
        questions: &[QuestionRecord],
        output: impl AsRef<Path>,
    ) -> Result<SerialSummary, SerialError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output.as_ref())?;

        let total = questions.len();
        let mut summary = SerialSummary::default();

        for (i, question) in questions.iter().enumerate() {
            let request = CompletionRequest::new(vec![Message::user(&question.question)])
                .with_system(self.system_prompt.clone());
            let request = match self.max_tokens {
                Some(limit) => request.with_max_tokens(limit),
                None => request,
            };

            let response = self
                .provider
                .complete(&request)
                .await
                .map_err(|source| SerialError::Provider {
                    index: question.index,
                    source,
                })?;

            let record = AnswerRecord {
                question: question.question.clone(),
                response: response.content,
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
            };

            writeln!(file, "{}", serde_json::to_string(&record)?)?;
            file.flush()?;

            summary.answered += 1;
            summary.input_tokens += u64::from(record.input_tokens);
            summary.output_tokens += u64::from(record.output_tokens);
            tracing::debug!("{} answered in {}ms", question.custom_id(), response.latency_ms);
            println!("{} / {} questions answered: {}", i + 1, total, question.question);
            summary.last = Some(record);
        }

        Ok(summary)
    }
}
