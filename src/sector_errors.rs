use thiserror::Error;

/// Crate-wide error type for sector database operations.
///
/// Only **structural** failures surface through this enum: a missing input
/// directory, an unreadable index, a target file without usable coordinate
/// columns. Per-record anomalies (malformed lines, non-standard names,
/// absent sector files) are counted and reported through the relevant
/// statistics types instead of aborting the operation.
///
/// Variants
/// -----------------
/// * `IoError` – Underlying file operation failed.
/// * `InputDirNotFound` – The catalog shard directory does not exist.
/// * `EmptyInputDir` – The shard directory holds no `*.jsonl` files.
/// * `IndexNotFound` – No sector index at the expected location.
/// * `CorruptIndex` – The index file exists but cannot be parsed.
/// * `JsonError` – JSON (de)serialization outside the index failed.
/// * `CsvError` – The target file could not be read as CSV/TSV.
/// * `MissingCoordinateColumns` – No x/y/z columns matched in the target file header.
/// * `NoValidTargets` – Every target row was dropped as non-numeric or empty.
/// * `Cancelled` – A cooperative cancellation signal stopped the build.
#[derive(Error, Debug)]
pub enum SectorDbError {
    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Input directory not found: {0}")]
    InputDirNotFound(String),

    #[error("No catalog shards (*.jsonl) found in: {0}")]
    EmptyInputDir(String),

    #[error("Sector index not found at: {0}")]
    IndexNotFound(String),

    #[error("Corrupt sector index {path}: {source}")]
    CorruptIndex {
        path: String,
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Error reading target file: {0}")]
    CsvError(#[from] csv::Error),

    #[error("No coordinate columns found in target file {path} (available: {available})")]
    MissingCoordinateColumns { path: String, available: String },

    #[error("No valid target coordinates found in: {0}")]
    NoValidTargets(String),

    #[error("Build cancelled")]
    Cancelled,
}
