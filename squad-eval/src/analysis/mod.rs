//! Graded output analysis

pub mod accuracy;

pub use accuracy::{evaluate_file, evaluate_reader, AccuracySummary};
