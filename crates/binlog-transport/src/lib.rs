//! Binlog Transport - remote sink and source endpoints
//!
//! This crate ships call events to and from other services:
//! - Proto: wire messages of the `binlog.v1` sink and reader services
//! - Sink: append events to a remote sink under a namespaced call id
//! - Source: stream the events of one trace from a remote reader
//! - Server: the sink service, for receiving events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod endpoint;
pub mod error;
pub mod proto;
pub mod server;
pub mod sink;
pub mod source;

pub use error::{Error, Result};
pub use server::{LogSink, LogSinkServer};
pub use sink::{namespaced_call_id, parse_header, AppendOutcome, EventSink, GrpcSink};
pub use source::{EventSource, EventStream, GrpcSource};
