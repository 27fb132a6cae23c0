//! Error types for binlog-replay

use thiserror::Error;

/// Replay error type
#[derive(Debug, Error)]
pub enum Error {
    /// The method is not present in the schema registry
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A message event arrived before any client header for its call
    #[error("no client header seen for call {0}")]
    MissingHeader(u64),

    /// Schema resolution failed
    #[error(transparent)]
    Schema(#[from] binlog_schema::Error),

    /// Frame decoding or event JSON failed
    #[error(transparent)]
    Codec(#[from] binlog_codec::Error),

    /// The replay target could not be reached
    #[error("cannot connect to {target}: {source}")]
    Connect {
        /// Target address as given
        target: String,
        /// Underlying transport error
        #[source]
        source: tonic::transport::Error,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
