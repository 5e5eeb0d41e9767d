//! Centralized error types for mailsift.

use std::path::PathBuf;
use thiserror::Error;

/// A field-level validation failure while building a record.
///
/// Fatal to the construction of that single message only; the pipeline
/// records it and moves on to the next message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field} '{value}': {reason}")]
pub struct ValidationError {
    /// Name of the offending field (`from`, `to`, `cc`, `bcc`).
    pub field: &'static str,
    /// The value that failed validation.
    pub value: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self {
            field,
            value: value.into(),
            reason,
        }
    }
}

/// All errors produced by the mailsift library.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mailbox container cannot be opened at all. Fatal.
    #[error("Cannot open mailbox '{path}': {reason}")]
    MailboxOpen { path: PathBuf, reason: String },

    /// A folder inside the mailbox cannot be enumerated.
    #[error("Cannot read folder '{folder}': {reason}")]
    FolderAccess { folder: String, reason: String },

    /// A single message failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The checkpoint file is corrupt or was written by an incompatible version.
    #[error("Corrupt or incompatible checkpoint '{path}': {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    /// The injected text classifier failed.
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `FolderAccess` variant.
    pub fn folder(folder: impl Into<String>, reason: impl ToString) -> Self {
        Self::FolderAccess {
            folder: folder.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
