use std::path::PathBuf;
use thiserror::Error;

/// Faults raised while reading a run's CSV files or merging its events.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("{}:{line}: expected {expected} columns, found {actual}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        actual: usize,
    },

    #[error("{}:{line}: invalid timestamp '{value}'", path.display())]
    InvalidTimestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{}:{line}: invalid config value: {reason}", path.display())]
    InvalidConfigValue {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("{}: missing header row", path.display())]
    MissingConfigHeader { path: PathBuf },

    #[error("message {message_id} sent by both node {first_node} and node {second_node}")]
    DuplicateSend {
        message_id: String,
        first_node: String,
        second_node: String,
    },
}

impl LogError {
    /// Row-level faults can be skipped; everything else ends the run.
    pub fn is_row_fault(&self) -> bool {
        matches!(
            self,
            LogError::MalformedRow { .. } | LogError::InvalidTimestamp { .. }
        )
    }
}
