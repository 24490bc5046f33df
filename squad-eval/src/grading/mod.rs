//! Automated correctness grading of generated answers

pub mod grader;
pub mod judgment;
pub mod pairing;
pub mod prompt;

pub use grader::{rejected_path, run_grading, validate_results, GradedRecord, GradingReport, RejectedRecord};
pub use judgment::{judgment_from_result, parse_judgment, strip_code_fence, GradingJudgment, JudgmentError};
pub use pairing::{pair_by_position, pair_with_questions, GradingRequest};
pub use prompt::{build_grading_requests, grading_response_format, GRADING_SYSTEM_PROMPT};

use crate::batch::BatchError;

#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("Answer {index} is for {found:?}, expected {expected:?}")]
    QuestionMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
