//! Binlog Replay - conversations and replay
//!
//! This crate works on reconstructed calls:
//! - Conversation: groups a flat event stream into per-call records
//! - Stats: per-method latency histograms
//! - Render: schema-decoded request and response bodies
//! - Transcode: annotated JSON form with decoded bodies, and back
//! - Replay: re-issues captured request bytes against a live server

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod conversation;
pub mod error;
pub mod render;
pub mod replay;
pub mod stats;
pub mod transcode;

pub use conversation::{read_conversations, Conversation, Reconstructor};
pub use error::{Error, Result};
pub use render::{render_requests, render_responses, RenderedMessage};
pub use replay::{
    CallResult, CallShape, CallTransport, GrpcTransport, RawCall, ReplayOptions, ReplayOutcome,
    ReplayStatus, Replayer,
};
pub use stats::{collect_stats, MethodStats, LATENCY_BUCKETS};
pub use transcode::Transcoder;
