//! Proto - `binlog.v1` wire messages
//!
//! ```text
//! service LogSinkService   { rpc Write(WriteRequest) returns (WriteResponse); }
//! service LogReaderService { rpc Read(ReadRequest) returns (stream ReadResponse); }
//! ```

use binlog_codec::CallEvent;

/// Fully qualified sink service name
pub const LOG_SINK_SERVICE: &str = "binlog.v1.LogSinkService";
/// Path of the sink's write method
pub const WRITE_PATH: &str = "/binlog.v1.LogSinkService/Write";
/// Path of the reader's read method
pub const READ_PATH: &str = "/binlog.v1.LogReaderService/Read";

/// One event to append
#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteRequest {
    /// Producer of the capture
    #[prost(string, tag = "1")]
    pub origin: String,
    /// Namespaced call id, `<prefix>-<call id>`
    #[prost(string, tag = "2")]
    pub call_id: String,
    /// The event itself
    #[prost(message, optional, tag = "3")]
    pub entry: Option<CallEvent>,
}

/// Empty acknowledgement
#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteResponse {}

/// Selects the events of one trace
#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadRequest {
    /// Producer of the capture, empty for any
    #[prost(string, tag = "1")]
    pub origin: String,
    /// Trace to read
    #[prost(string, tag = "2")]
    pub trace_id: String,
}

/// One streamed event
#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadResponse {
    /// The event
    #[prost(message, optional, tag = "1")]
    pub entry: Option<CallEvent>,
}
