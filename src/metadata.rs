//! Experiment metadata and reproducibility tracking.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// Metadata about a data file used in a backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFileMetadata {
    /// File path.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// SHA256 checksum of the file contents.
    pub checksum: String,
}

/// Compute SHA256 checksum of a file.
pub fn compute_file_checksum(path: impl AsRef<Path>) -> std::io::Result<String> {
    let data = std::fs::read(path)?;
    Ok(compute_hash(&data))
}

/// Compute SHA256 hash of arbitrary bytes.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Compute configuration hash from JSON serialization.
pub fn compute_config_hash<T: Serialize>(config: &T) -> String {
    match serde_json::to_vec(config) {
        Ok(bytes) => compute_hash(&bytes),
        Err(e) => {
            warn!("Failed to serialize config for hashing: {}", e);
            String::new()
        }
    }
}

/// Generate a unique experiment ID.
pub fn generate_experiment_id() -> Uuid {
    Uuid::new_v4()
}

/// Track data file metadata.
pub fn track_data_file(path: impl AsRef<Path>) -> std::io::Result<DataFileMetadata> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)?;
    let size = metadata.len();
    let checksum = compute_file_checksum(path)?;

    Ok(DataFileMetadata {
        path: path.display().to_string(),
        size,
        checksum,
    })
}
