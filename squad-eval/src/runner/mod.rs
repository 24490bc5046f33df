//! Answer generation runners

pub mod batch_answers;
pub mod rate_limiter;
pub mod serial_answers;

pub use batch_answers::{answers_from_batch, build_answer_requests, run_batch_answers, BatchAnswer};
pub use rate_limiter::RateLimiter;
pub use serial_answers::{SerialAnswerer, SerialError, SerialSummary};

use serde::{Deserialize, Serialize};

/// One generated answer, as written by the serial runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub response: String,
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Prompt settings shared by both answer generators
#[derive(Debug, Clone)]
pub struct AnswerPrompt {
    pub system_prompt: String,
    /// `{question}` is replaced with the question text
    pub user_template: String,
}

impl AnswerPrompt {
    pub fn from_config(config: &crate::config::AnswerConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            user_template: config.user_prompt.clone(),
        }
    }

    pub fn user_message(&self, question: &str) -> String {
        self.user_template.replace("{question}", question)
    }
}
