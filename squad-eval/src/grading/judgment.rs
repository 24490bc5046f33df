//! Structured grading judgments and their validation

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::batch::BatchResultLine;

/// The two-field verdict a grading model returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GradingJudgment {
    pub explanation: String,
    pub score: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JudgmentError {
    #[error("result has no message content")]
    MissingContent,

    #[error("payload is not a valid judgment: {0}")]
    Invalid(String),

    #[error("judgment has an empty explanation")]
    EmptyExplanation,
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$")
            .expect("fence pattern is valid")
    })
}

/// Remove a surrounding Markdown code fence, if there is one
pub fn strip_code_fence(content: &str) -> &str {
    match fence_pattern().captures(content).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => content.trim(),
    }
}

/// Parse and validate a judgment from model text
pub fn parse_judgment(content: &str) -> Result<GradingJudgment, JudgmentError> {
    let payload = strip_code_fence(content);
    let judgment: GradingJudgment =
        serde_json::from_str(payload).map_err(|e| JudgmentError::Invalid(e.to_string()))?;

    if judgment.explanation.trim().is_empty() {
        return Err(JudgmentError::EmptyExplanation);
    }
    Ok(judgment)
}

/// Judgment carried by a batch result line
pub fn judgment_from_result(line: &BatchResultLine) -> Result<GradingJudgment, JudgmentError> {
    let content = line.content().ok_or(JudgmentError::MissingContent)?;
    parse_judgment(content)
}
