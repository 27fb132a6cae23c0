//! Error types for binlog-transport

use thiserror::Error;

/// Transport error type
#[derive(Debug, Error)]
pub enum Error {
    /// The remote service could not be reached
    #[error("cannot connect to {target}: {source}")]
    Connect {
        /// Address as given
        target: String,
        /// Underlying transport error
        #[source]
        source: tonic::transport::Error,
    },

    /// The remote call failed
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// A custom header is not of the form `Key: value`
    #[error("expected \"HeaderKey: header value\", got {0:?}")]
    InvalidHeader(String),

    /// Event framing failed
    #[error(transparent)]
    Codec(#[from] binlog_codec::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
