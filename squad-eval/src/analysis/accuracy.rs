//! Accuracy aggregation over graded batch output files

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::batch::BatchResultLine;
use crate::grading::judgment_from_result;

/// Correct/total counts for one graded file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub file: String,
    pub correct: usize,
    pub total: usize,
    /// Lines that did not yield a valid judgment
    pub rejected: usize,
}

impl AccuracySummary {
    /// Percentage of correct judgments, `None` when nothing was graded
    pub fn percentage(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.correct as f64 / self.total as f64 * 100.0)
        }
    }

    /// One-line console rendering
    pub fn describe(&self) -> String {
        match self.percentage() {
            Some(pct) => format!("Accuracy for {}: {:.2}%", self.file, pct),
            None => "No tasks to evaluate.".to_string(),
        }
    }
}

/// Stream a graded file and count judgments
pub fn evaluate_file(path: impl AsRef<Path>) -> std::io::Result<AccuracySummary> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut summary = evaluate_reader(reader)?;
    summary.file = path.display().to_string();
    Ok(summary)
}

/// Count judgments line by line; malformed lines are tallied, not fatal
pub fn evaluate_reader<R: BufRead>(reader: R) -> std::io::Result<AccuracySummary> {
    let mut summary = AccuracySummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let judgment = serde_json::from_str::<BatchResultLine>(&line)
            .map_err(|e| e.to_string())
            .and_then(|record| judgment_from_result(&record).map_err(|e| e.to_string()));

        match judgment {
            Ok(judgment) => {
                summary.total += 1;
                if judgment.score {
                    summary.correct += 1;
                }
            }
            Err(reason) => {
                tracing::warn!("Line {}: no valid judgment ({})", idx + 1, reason);
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}
