//! Batch grading run and per-record validation of the results

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::{submit_and_wait, write_jsonl, BatchBackend, BatchResultLine, BatchRun};

use super::judgment::{judgment_from_result, GradingJudgment};
use super::prompt::build_grading_requests;
use super::{GradingError, GradingRequest};

/// A result line that produced a valid judgment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedRecord {
    pub custom_id: String,
    pub judgment: GradingJudgment,
}

/// A result line set aside because it failed validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub custom_id: String,
    pub reason: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Validated judgments plus everything that was quarantined
#[derive(Debug, Clone, Default)]
pub struct GradingReport {
    pub graded: Vec<GradedRecord>,
    pub rejected: Vec<RejectedRecord>,
}

impl GradingReport {
    pub fn correct(&self) -> usize {
        self.graded.iter().filter(|r| r.judgment.score).count()
    }
}

/// Where quarantined records for `output` are written
pub fn rejected_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "grading".to_string());
    name.push_str(".rejected.jsonl");
    output.with_file_name(name)
}

/// Validate each result line independently; one bad line never sinks the rest
pub fn validate_results(lines: &[BatchResultLine]) -> GradingReport {
    let mut report = GradingReport::default();

    for line in lines {
        match judgment_from_result(line) {
            Ok(judgment) => report.graded.push(GradedRecord {
                custom_id: line.custom_id.clone(),
                judgment,
            }),
            Err(e) => {
                tracing::warn!("Rejected grading result {}: {}", line.custom_id, e);
                report.rejected.push(RejectedRecord {
                    custom_id: line.custom_id.clone(),
                    reason: e.to_string(),
                    content: line.content().map(String::from),
                });
            }
        }
    }

    report
}

/// Grade every pair in one batch job.
///
/// The raw batch output lands at `run.output_path`; rejected records, if
/// any, are written next to it.
pub async fn run_grading(
    backend: &dyn BatchBackend,
    pairs: &[GradingRequest],
    model: &str,
    temperature: f32,
    run: &BatchRun,
) -> Result<GradingReport, GradingError> {
    let requests = build_grading_requests(pairs, model, temperature);
    tracing::info!("Submitting {} grading requests to {}", requests.len(), model);

    let lines = submit_and_wait(backend, &requests, run).await?;
    let report = validate_results(&lines);

    if !report.rejected.is_empty() {
        let path = rejected_path(&run.output_path);
        write_jsonl(&path, &report.rejected)?;
        tracing::warn!(
            "{} of {} grading results failed validation, see {}",
            report.rejected.len(),
            lines.len(),
            path.display()
        );
    }

    Ok(report)
}
