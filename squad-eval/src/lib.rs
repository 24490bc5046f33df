//! Question-answering evaluation pipeline for SQuAD style datasets
//!
//! This crate extracts answerable questions from a SQuAD 2.0 dataset,
//! collects answers from LLM providers, grades them with a judge model and
//! reports accuracy.
//!
//! # Features
//!
//! - One shared extractor for the first N answerable questions
//! - Batch answer generation through the OpenAI Batch API
//! - Serial answer generation against an Azure AI inference endpoint
//! - Schema-constrained grading with per-record quarantine of bad replies
//! - Accuracy aggregation with console and JSON summaries
//!
//! # Example
//!
//! ```no_run
//! use squad_eval::{
//!     batch::BatchRun,
//!     config::Config,
//!     dataset::{extract_questions, load_dataset, Extraction},
//!     providers::create_openai,
//!     runner::{run_batch_answers, AnswerPrompt},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let dataset = load_dataset(&config.dataset.path)?;
//!     let questions = extract_questions(&dataset, 500, Extraction::QuestionsOnly);
//!
//!     let client = create_openai(&config)?;
//!     let run = BatchRun::new("answers-input.jsonl", "answers-output.jsonl")
//!         .with_poll_policy(config.batch.poll_policy());
//!     let prompt = AnswerPrompt::from_config(&config.answers);
//!
//!     let answers = run_batch_answers(&client, &questions, &prompt, "gpt-4o-mini", 0.2, &run).await?;
//!     println!("{} answers", answers.len());
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod batch;
pub mod config;
pub mod dataset;
pub mod grading;
pub mod providers;
pub mod reporting;
pub mod runner;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{evaluate_file, AccuracySummary};
    pub use crate::batch::{
        submit_and_wait, BatchBackend, BatchError, BatchRequest, BatchResultLine, BatchRun,
        PollOutcome, PollPolicy,
    };
    pub use crate::config::Config;
    pub use crate::dataset::{extract_questions, load_dataset, Extraction, QuestionRecord};
    pub use crate::grading::{
        pair_with_questions, run_grading, GradingError, GradingJudgment, GradingReport,
        GradingRequest,
    };
    pub use crate::providers::{
        create_provider, AzureInferenceClient, CompletionRequest, CompletionResponse,
        LLMProvider, Message, OpenAIClient,
    };
    pub use crate::reporting::JsonSummary;
    pub use crate::runner::{AnswerPrompt, AnswerRecord, SerialAnswerer};
}
