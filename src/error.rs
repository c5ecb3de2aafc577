use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions for a merge or intel run.
///
/// Per-record gaps (null company, missing salary, missing URL) are never
/// errors; they are handled where the record is consumed.
#[derive(Debug, Error)]
pub enum IntelError {
    #[error("{path} is missing required column(s): {}", missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("No weekly extract matching '{pattern}' in {dir}")]
    NoWeeklyExtract { dir: PathBuf, pattern: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IntelError>;
