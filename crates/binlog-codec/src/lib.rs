//! Binlog Codec - call-event model and frame codec
//!
//! This crate provides the lowest layer of the binlog tooling:
//! - Event: the gRPC binary-log call event (`CallEvent`) and its payloads
//! - Frame: 4-byte big-endian length prefixed encoding of call events
//! - Follow: a byte source that keeps reading a file while it grows
//! - Pipeline: a background decoder feeding a bounded channel
//! - Json: the annotated protobuf-JSON form of an event

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod follow;
pub mod frame;
pub mod json;
pub mod pipeline;

pub use error::{Error, Result};
pub use event::{
    status_name, Address, CallEvent, ClientHeader, EventType, Logger, Message, Metadata,
    MetadataEntry, Payload, ServerHeader, Trailer,
};
pub use follow::{open_source, ByteSource, FollowOptions};
pub use frame::{encode_event, FrameReader, FrameWriter, LENGTH_PREFIX_LEN};
pub use json::{from_json, to_json};
pub use pipeline::{decode_stream, EventStream, DEFAULT_CHANNEL_CAPACITY};
