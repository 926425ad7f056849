//! Error types for the upload core.

use std::path::PathBuf;

/// Errors reported by a [`RoomServiceClient`](crate::client::RoomServiceClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("not connected")]
    NotConnected,

    #[error("transfer aborted")]
    Aborted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced while uploading into a room.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksums mismatch: {expected}/{actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("upload returned no file")]
    NoResult,

    #[error("not something I can upload: {}", .0.display())]
    InvalidFile(PathBuf),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Whether the error came out of `connect` or `login`, which ends the room.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            UploadError::Client(ClientError::Connection(_) | ClientError::Auth(_))
        )
    }
}
