//! Write, upload, run, wait for and download a batch job

use std::path::{Path, PathBuf};

use super::{
    parse_jsonl, poll_until_complete, write_jsonl, BatchBackend, BatchError, BatchRequest,
    BatchResultLine, PollPolicy, CHAT_COMPLETIONS_ENDPOINT,
};

/// File locations and job settings for one batch run
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub completion_window: String,
    pub poll_policy: PollPolicy,
}

impl BatchRun {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            completion_window: "24h".to_string(),
            poll_policy: PollPolicy::default(),
        }
    }

    pub fn with_completion_window(mut self, window: impl Into<String>) -> Self {
        self.completion_window = window.into();
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }
}

/// Submit `requests` as one batch job and return its parsed result lines.
///
/// The request file and the downloaded output are both kept on disk at the
/// paths in `run`.
pub async fn submit_and_wait(
    backend: &dyn BatchBackend,
    requests: &[BatchRequest],
    run: &BatchRun,
) -> Result<Vec<BatchResultLine>, BatchError> {
    let count = write_jsonl(&run.input_path, requests)?;
    tracing::info!("Wrote {} requests to {}", count, run.input_path.display());

    let content = std::fs::read(&run.input_path)?;
    let file_id = backend
        .upload_batch_file(&file_name(&run.input_path), content)
        .await?;
    tracing::info!("Uploaded batch input as {}", file_id);

    let job = backend
        .create_batch(&file_id, CHAT_COMPLETIONS_ENDPOINT, &run.completion_window)
        .await?;
    tracing::info!("Created batch {} ({})", job.id, job.status);

    let job = poll_until_complete(backend, &job.id, &run.poll_policy)
        .await?
        .into_completed()?;
    tracing::info!("Done processing batch {}", job.id);

    let output_file_id = job
        .output_file_id
        .clone()
        .ok_or_else(|| BatchError::MissingOutput { batch_id: job.id.clone() })?;

    let bytes = backend.download_file(&output_file_id).await?;
    std::fs::write(&run.output_path, &bytes)?;
    tracing::info!("Batch output written to {}", run.output_path.display());

    let text = String::from_utf8_lossy(&bytes);
    parse_jsonl(&text)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "batch-input.jsonl".to_string())
}
