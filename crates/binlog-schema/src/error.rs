//! Error types for binlog-schema

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause attached to schema-set failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Schema error type
#[derive(Debug, Error)]
pub enum Error {
    /// A `.proto` source failed to parse or link
    #[error("cannot parse schema sources: {0}")]
    Parse(String),

    /// A descriptor-set file exists but cannot be read or linked
    #[error("cannot load schema set {}: {source}", path.display())]
    SchemaSet {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: BoxError,
    },

    /// A file is already registered with different contents
    #[error("schema file {file} from {} conflicts with an already loaded definition", path.display())]
    Conflict {
        /// Source that carried the conflicting definition
        path: PathBuf,
        /// Protobuf file name
        file: String,
    },

    /// No schema entity has this name
    #[error("type not found: {0}")]
    TypeNotFound(String),

    /// The name resolves to an enum, service or extension
    #[error("not a message type: {0}")]
    NotAMessage(String),

    /// Bytes are not a valid encoding of the type
    #[error("malformed {type_name} payload: {source}")]
    MalformedPayload {
        /// Message type the bytes were parsed as
        type_name: String,
        /// Underlying protobuf error
        #[source]
        source: prost::DecodeError,
    },

    /// A message could not be rendered as text
    #[error("cannot render message: {0}")]
    Render(#[source] serde_json::Error),

    /// JSON does not describe a message of the type
    #[error("invalid json for {type_name}: {source}")]
    Json {
        /// Target message type
        type_name: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
