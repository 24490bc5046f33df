//! Results reporting

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::AccuracySummary;
use crate::grading::GradingReport;

/// JSON summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub run_id: String,
    pub timestamp: String,
    pub files: Vec<FileAccuracy>,
}

/// Per-file entry in the summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAccuracy {
    pub file: String,
    pub correct: usize,
    pub total: usize,
    pub rejected: usize,
    /// `None` when the file had nothing to evaluate
    pub accuracy_pct: Option<f64>,
}

impl From<&AccuracySummary> for FileAccuracy {
    fn from(summary: &AccuracySummary) -> Self {
        Self {
            file: summary.file.clone(),
            correct: summary.correct,
            total: summary.total,
            rejected: summary.rejected,
            accuracy_pct: summary.percentage(),
        }
    }
}

impl JsonSummary {
    pub fn from_summaries(run_id: impl Into<String>, summaries: &[AccuracySummary]) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            files: summaries.iter().map(FileAccuracy::from).collect(),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Print one accuracy line per file
pub fn print_accuracy_report(summaries: &[AccuracySummary]) {
    for summary in summaries {
        println!("{}", summary.describe());
        if summary.rejected > 0 {
            println!("  ({} lines without a valid judgment)", summary.rejected);
        }
    }
}

/// Print counts after a grading run
pub fn print_grading_report(report: &GradingReport, output: &Path) {
    println!("\n=== Grading Results ===\n");
    println!("Graded:   {}", report.graded.len());
    println!("Correct:  {}", report.correct());
    println!("Rejected: {}", report.rejected.len());
    println!("Output:   {}", output.display());
    println!("\n{:=<50}", "");
}
