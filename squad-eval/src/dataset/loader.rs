//! Dataset loading from SQuAD JSON files

use std::path::Path;

use super::SquadDataset;

/// Error type for dataset loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Load a dataset from a JSON file
pub fn load_dataset(path: impl AsRef<Path>) -> Result<SquadDataset, LoadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    tracing::debug!("Read {} bytes from {:?}", content.len(), path);
    load_dataset_from_str(&content)
}

/// Load a dataset from a JSON string.
///
/// Missing required keys fail the whole load; serde's message names the
/// offending field and position.
pub fn load_dataset_from_str(content: &str) -> Result<SquadDataset, LoadError> {
    serde_json::from_str(content)
        .map_err(|e| LoadError::Parse(format!("JSON parse error: {}", e)))
}
