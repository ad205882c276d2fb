//! Transfer error taxonomy
//!
//! Every failure inside a cycle is one of these. They are contained where they
//! occur: a `Retrieve` drops the record, a `Publish` flags it, a `Delete` is
//! only logged, and `Connect`/`List`/`PoolStart` abort the cycle before any
//! file enters the pipeline. None of them terminates the process.

use thiserror::Error;

/// Result type alias for transfer operations
pub type TransferResult<T> = std::result::Result<T, TransferError>;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to connect to remote store {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("Failed to list {path}: {reason}")]
    List { path: String, reason: String },

    #[error("Failed to retrieve {file}: {reason}")]
    Retrieve { file: String, reason: String },

    #[error("Failed to publish {file}: {reason}")]
    Publish {
        file: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Failed to delete {file}: {reason}")]
    Delete { file: String, reason: String },

    #[error("No remote session could be opened for the {pool} pool")]
    PoolStart { pool: &'static str },

    #[error("A transfer cycle is already running")]
    CycleAlreadyRunning,
}

impl TransferError {
    /// Whether this error ended a cycle before any file was transferred
    pub fn aborts_cycle(&self) -> bool {
        matches!(
            self,
            TransferError::Connect { .. }
                | TransferError::List { .. }
                | TransferError::PoolStart { .. }
                | TransferError::CycleAlreadyRunning
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_abort_classification() {
        let connect = TransferError::Connect {
            address: "127.0.0.1:2021".into(),
            reason: "refused".into(),
        };
        let retrieve = TransferError::Retrieve {
            file: "a.xlsx".into(),
            reason: "550".into(),
        };
        assert!(connect.aborts_cycle());
        assert!(TransferError::PoolStart { pool: "deleter" }.aborts_cycle());
        assert!(!retrieve.aborts_cycle());
    }

    #[test]
    fn test_publish_message_names_file() {
        let err = TransferError::Publish {
            file: "b.xlsx".into(),
            status: Some(500),
            reason: "HTTP 500".into(),
        };
        assert_eq!(err.to_string(), "Failed to publish b.xlsx: HTTP 500");
    }
}
