//! Pairing generated answers with reference answers

use serde::{Deserialize, Serialize};

use crate::dataset::QuestionRecord;
use crate::runner::AnswerRecord;

use super::GradingError;

/// Longest grading custom id, in characters
const MAX_CUSTOM_ID_CHARS: usize = 128;

/// One answer to be judged against its reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRequest {
    /// Batch correlation id, `"{n}. {question}"`
    pub id: String,
    /// Zero-based position shared by the answer and its reference
    pub index: usize,
    pub question: String,
    pub student_response: String,
    pub reference_answer: String,
}

fn grading_id(index: usize, question: &str) -> String {
    format!("{}. {}", index + 1, question)
        .chars()
        .take(MAX_CUSTOM_ID_CHARS)
        .collect()
}

/// Pair answer `i` with reference `i`.
///
/// A missing reference or an empty response skips that index only; later
/// pairs keep their own positions. Pairing stops at the end of the shorter
/// list.
pub fn pair_by_position(answers: &[AnswerRecord], references: &[Option<String>]) -> Vec<GradingRequest> {
    answers
        .iter()
        .zip(references)
        .enumerate()
        .filter_map(|(index, (answer, reference))| {
            let reference = reference.as_ref()?;
            if answer.response.trim().is_empty() {
                tracing::warn!("Not grading {}. {}: empty response", index + 1, answer.question);
                return None;
            }
            Some(GradingRequest {
                id: grading_id(index, &answer.question),
                index,
                question: answer.question.clone(),
                student_response: answer.response.clone(),
                reference_answer: reference.clone(),
            })
        })
        .collect()
}

/// Pair answers with the references from the extraction that produced them.
///
/// Every answer must carry the question text extracted at its position;
/// any drift between the two lists is an error rather than a silent
/// mis-pairing.
pub fn pair_with_questions(
    questions: &[QuestionRecord],
    answers: &[AnswerRecord],
) -> Result<Vec<GradingRequest>, GradingError> {
    if answers.len() != questions.len() {
        tracing::warn!(
            "{} answers for {} extracted questions; pairing the first {}",
            answers.len(),
            questions.len(),
            answers.len().min(questions.len())
        );
    }

    for (index, (question, answer)) in questions.iter().zip(answers).enumerate() {
        if answer.question.trim() != question.question.trim() {
            return Err(GradingError::QuestionMismatch {
                index,
                expected: question.question.clone(),
                found: answer.question.clone(),
            });
        }
    }

    let references: Vec<Option<String>> = questions.iter().map(|q| q.reference.clone()).collect();
    let pairs = pair_by_position(answers, &references);

    let skipped = answers.len().min(questions.len()) - pairs.len();
    if skipped > 0 {
        tracing::info!("Skipped {} answers without a reference or response", skipped);
    }
    Ok(pairs)
}
