//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The commit log or a stored row is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A commit log record failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Offset of the record in the log.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// Another process holds the environment directory lock.
    #[error("environment is locked by another process")]
    Locked,

    /// The named tree does not exist.
    #[error("tree not found: {0}")]
    TreeNotFound(String),

    /// A table index name is not part of the schema.
    #[error("table '{table}' has no index '{index}'")]
    IndexNotFound {
        /// Table name.
        table: String,
        /// Requested index.
        index: String,
    },

    /// A row does not fit the table schema.
    #[error("invalid row for table '{table}': {message}")]
    InvalidRow {
        /// Table name.
        table: String,
        /// What is wrong with the row.
        message: String,
    },

    /// A row with the same primary key already exists.
    #[error("duplicate primary key in table '{table}'")]
    DuplicateKey {
        /// Table name.
        table: String,
    },
}

impl StorageError {
    /// Create an invalid row error.
    pub fn invalid_row(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
