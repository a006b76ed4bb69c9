//! Tagged error taxonomy. See spec.md §7 and §4.2.

use thiserror::Error;

/// Errors produced by the signed API client (C2).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Signer not initialised. Programming error; fatal process-level (spec.md §7).
    #[error("API client not ready: signer not initialised")]
    NotReady,
    #[error("network unavailable: {0}")]
    NoNetwork(String),
    #[error("client error {status}: {message}")]
    ClientError { status: u16, message: String },
    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },
}

/// Errors produced by the sync engine (C7) and its collaborators (C4/C5/C6).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("conflicting changes on {} path(s): {}", .paths.len(), .paths.join(", "))]
    ConflictingChanges { paths: Vec<String> },

    #[error("read-only path changed: {path} ({reason})")]
    ReadOnlyFilesChanged { path: String, reason: String },

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("filesystem corrupted at {path}: {reason}")]
    FileSystemCorrupted { path: String, reason: String },

    #[error("project directory is not configured")]
    ProjectDirMissing,

    #[error("network error: {reason}")]
    NetworkError { reason: String },

    #[error("sync cancelled")]
    Cancelled,
}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::NotReady => panic!("API client used before signer was initialised"),
            ApiError::NoNetwork(reason) => SyncError::NetworkError { reason },
            ApiError::ClientError { status, message } => SyncError::NetworkError {
                reason: format!("{status}: {message}"),
            },
            ApiError::ServerError { status, message } => SyncError::NetworkError {
                reason: format!("{status}: {message}"),
            },
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::FileSystemCorrupted {
            path: String::new(),
            reason: e.to_string(),
        }
    }
}
