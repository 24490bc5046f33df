//! Batch answer generation over the Batch API

use crate::batch::{
    index_by_custom_id, submit_and_wait, BatchBackend, BatchError, BatchRequest, BatchResultLine,
    BatchRun,
};
use crate::dataset::QuestionRecord;
use crate::providers::Message;

use super::{AnswerPrompt, AnswerRecord};

/// A question paired with the batch result that answered it
#[derive(Debug, Clone)]
pub struct BatchAnswer {
    pub question: QuestionRecord,
    pub result: Option<BatchResultLine>,
}

impl BatchAnswer {
    pub fn content(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.content())
    }
}

/// One chat request per question, tagged `question_{n}`
pub fn build_answer_requests(
    questions: &[QuestionRecord],
    prompt: &AnswerPrompt,
    model: &str,
    temperature: f32,
) -> Vec<BatchRequest> {
    questions
        .iter()
        .map(|q| {
            BatchRequest::chat(
                q.custom_id(),
                model,
                Some(temperature),
                vec![
                    Message::system(prompt.system_prompt.clone()),
                    Message::user(prompt.user_message(&q.question)),
                ],
            )
        })
        .collect()
}

/// Correlate result lines back to their questions by `custom_id`.
///
/// `question_{n}` maps to the question extracted at index `n - 1`.
/// Questions without a matching line keep `result: None`; lines with an
/// unknown id are logged and dropped.
pub fn answers_from_batch(
    questions: &[QuestionRecord],
    lines: Vec<BatchResultLine>,
) -> Vec<BatchAnswer> {
    let mut slots: Vec<Option<BatchResultLine>> = vec![None; questions.len()];

    for (custom_id, line) in index_by_custom_id(lines) {
        let position = QuestionRecord::index_from_custom_id(&custom_id)
            .and_then(|index| questions.iter().position(|q| q.index == index));
        match position {
            Some(position) => slots[position] = Some(line),
            None => tracing::warn!("Batch result {} matches no extracted question", custom_id),
        }
    }

    let answers: Vec<BatchAnswer> = questions
        .iter()
        .zip(slots)
        .map(|(q, result)| BatchAnswer {
            question: q.clone(),
            result,
        })
        .collect();

    for answer in answers.iter().filter(|a| a.content().is_none()) {
        let error = answer.result.as_ref().and_then(|r| r.error.as_ref());
        match error {
            Some(error) => tracing::warn!("{} failed: {}", answer.question.custom_id(), error),
            None => tracing::warn!("{} has no answer", answer.question.custom_id()),
        }
    }

    answers
}

impl From<&BatchAnswer> for AnswerRecord {
    fn from(answer: &BatchAnswer) -> Self {
        let usage = answer
            .result
            .as_ref()
            .map(|r| r.usage())
            .unwrap_or_default();
        Self {
            question: answer.question.question.clone(),
            response: answer.content().unwrap_or_default().to_string(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

/// Submit every question as one batch job and wait for the answers
pub async fn run_batch_answers(
    backend: &dyn BatchBackend,
    questions: &[QuestionRecord],
    prompt: &AnswerPrompt,
    model: &str,
    temperature: f32,
    run: &BatchRun,
) -> Result<Vec<BatchAnswer>, BatchError> {
    let requests = build_answer_requests(questions, prompt, model, temperature);
    let lines = submit_and_wait(backend, &requests, run).await?;
    tracing::info!("Received {} batch results for {} questions", lines.len(), questions.len());
    Ok(answers_from_batch(questions, lines))
}
