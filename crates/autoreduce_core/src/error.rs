//! Error types for autoreduce core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while maintaining an index.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] autoreduce_storage::StorageError),

    /// Document format error, including mapped values that cannot be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] autoreduce_codec::CodecError),

    /// No index with this name exists in the environment.
    #[error("index not found: {name}")]
    IndexNotFound {
        /// Index name.
        name: String,
    },

    /// An index with this name already exists.
    #[error("index already exists: {name}")]
    IndexAlreadyExists {
        /// Index name.
        name: String,
    },

    /// The index definition is not usable.
    #[error("invalid index definition: {message}")]
    InvalidDefinition {
        /// What is wrong with the definition.
        message: String,
    },

    /// Stored index data does not have the expected layout.
    #[error("invalid stored format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// The etag counter is exhausted.
    #[error("etag counter overflow")]
    EtagOverflow,

    /// An aggregated value left the integer range.
    #[error("aggregation overflow in field '{field}'")]
    AggregationOverflow {
        /// Aggregation field name.
        field: String,
    },

    /// Processing one document failed; the whole batch was rolled back.
    #[error("index '{index}' failed on document '{document_key}': {source}")]
    DocumentFailed {
        /// Index name.
        index: String,
        /// Key of the offending document.
        document_key: String,
        /// Underlying failure.
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Creates an invalid definition error.
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
