//! Error types for binlog-codec

use thiserror::Error;

/// Codec error type
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure other than a clean or truncated end of stream
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A complete frame whose body is not a valid call event
    #[error("cannot decode call event in frame {frame}: {source}")]
    Decode {
        /// Zero-based index of the offending frame
        frame: u64,
        /// Underlying protobuf error
        #[source]
        source: prost::DecodeError,
    },

    /// Serialization of a call event failed
    #[error("cannot encode call event: {0}")]
    Encode(String),

    /// The annotated JSON form of an event is malformed
    #[error("invalid event json: {0}")]
    Json(String),

    /// The embedded binary-log schema failed to compile
    #[error("binary-log schema unavailable: {0}")]
    Schema(String),

    /// The background decoder stopped without reporting a result
    #[error("decode pipeline terminated unexpectedly")]
    Pipeline,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
