//! Error types for file generation and upload.
//!
//! # Design
//! Each public contract gets its own enum. `UploadError::FileOpen` is the only
//! fatal case for the process: it means nothing was sent. Transport failures
//! keep the transport's diagnostic text so it can be shown verbatim.

use std::path::PathBuf;

/// Errors returned by [`FileGenerator::generate`](crate::FileGenerator::generate).
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The destination could not be opened for writing.
    #[error("failed to create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A chunk write accepted fewer bytes than requested. The partial file is
    /// left on disk.
    #[error("short write to {}: wrote {written} of {expected} bytes", path.display())]
    ShortWrite {
        path: PathBuf,
        expected: usize,
        written: usize,
    },
}

/// Transport-level failures. The message is whatever the transport reported.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not connect: {0}")]
    Connect(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// The progress hook answered [`HookAction::Abort`](crate::HookAction::Abort).
    #[error("transfer aborted by progress callback")]
    Aborted,

    /// The response hook reported consuming fewer bytes than it was given.
    #[error("response hook consumed {consumed} of {received} bytes")]
    WriteRejected { received: usize, consumed: usize },

    #[error("{0}")]
    Failed(String),
}

/// Errors returned by [`UploadClient::upload`](crate::UploadClient::upload).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The source file could not be opened or measured. No transfer was attempted.
    #[error("failed to open {} for reading: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransportError),
}

impl UploadError {
    /// True when the failure happened before any network activity.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UploadError::FileOpen { .. })
    }
}
