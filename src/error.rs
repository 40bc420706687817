//! Error types for the replication toolkit.

use thiserror::Error;

/// Main error type for replication backtests.
#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParseError(#[from] chrono::ParseError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Solver error: {0}")]
    SolverError(String),

    #[error("Solver output error: {0}")]
    SolverOutput(String),

    #[error("Market cap lookup error: {0}")]
    CapLookupError(String),

    #[error("No data loaded")]
    NoData,

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;
