//! SQuAD 2.0 dataset types, loading and question extraction

pub mod extract;
pub mod loader;

pub use extract::{extract_questions, Extraction};
pub use loader::{load_dataset, load_dataset_from_str, LoadError};

use serde::{Deserialize, Serialize};

/// Root of a SQuAD 2.0 style document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadDataset {
    #[serde(default)]
    pub version: Option<String>,
    pub data: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub context: Option<String>,
    pub qas: Vec<QaEntry>,
}

/// A single question/answer pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaEntry {
    #[serde(default)]
    pub id: String,
    pub question: String,
    pub is_impossible: bool,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default)]
    pub answer_start: Option<i64>,
}

/// An extracted answerable question, in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Dataset QA identifier
    pub id: String,
    /// Zero-based position in the extracted list
    pub index: usize,
    pub question: String,
    /// First reference answer, lower-cased
    pub reference: Option<String>,
}

impl QuestionRecord {
    /// Batch correlation id, `question_{n}` with a 1-based `n`
    pub fn custom_id(&self) -> String {
        format!("question_{}", self.index + 1)
    }

    /// Inverse of [`QuestionRecord::custom_id`]
    pub fn index_from_custom_id(custom_id: &str) -> Option<usize> {
        custom_id
            .strip_prefix("question_")?
            .parse::<usize>()
            .ok()?
            .checked_sub(1)
    }
}
