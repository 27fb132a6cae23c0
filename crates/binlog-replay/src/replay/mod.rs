//! Replay - re-issue captured calls against a live server
//!
//! Request bodies are sent exactly as captured, never re-encoded. Each call
//! runs to completion before the next one starts, and a failing call only
//! affects its own outcome.

mod grpc;

pub use grpc::{GrpcTransport, RawCodec};

use crate::conversation::Conversation;
use async_trait::async_trait;
use binlog_codec::{status_name, CallEvent, EventType, Message, Payload};
use binlog_schema::{MethodTypes, SchemaRegistry};
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[cfg(test)]
mod tests;

/// Streaming shape of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// One request, one response
    Unary,
    /// Many requests, one response
    ClientStreaming,
    /// One request, many responses
    ServerStreaming,
    /// Many requests, many responses
    Bidirectional,
}

impl CallShape {
    /// Shape inferred from the captured message counts
    #[must_use]
    pub fn of(conversation: &Conversation) -> Self {
        let client = conversation.request_messages.len() > 1;
        let server = conversation.response_messages.len() > 1;
        match (client, server) {
            (false, false) => Self::Unary,
            (true, false) => Self::ClientStreaming,
            (false, true) => Self::ServerStreaming,
            (true, true) => Self::Bidirectional,
        }
    }

    /// Shape declared by the method's schema
    #[must_use]
    pub fn declared(types: &MethodTypes) -> Self {
        match (types.client_streaming, types.server_streaming) {
            (false, false) => Self::Unary,
            (true, false) => Self::ClientStreaming,
            (false, true) => Self::ServerStreaming,
            (true, true) => Self::Bidirectional,
        }
    }

    /// Whether more than one request may be sent
    #[must_use]
    pub fn client_streams(&self) -> bool {
        matches!(self, Self::ClientStreaming | Self::Bidirectional)
    }

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ClientStreaming => "client_streaming",
            Self::ServerStreaming => "server_streaming",
            Self::Bidirectional => "bidi_streaming",
        }
    }
}

impl std::fmt::Display for CallShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A call as it goes on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct RawCall {
    /// Method path
    pub method: String,
    /// Streaming shape to use
    pub shape: CallShape,
    /// Request bodies in capture order
    pub messages: Vec<Bytes>,
    /// Request metadata to send
    pub metadata: Vec<(String, Vec<u8>)>,
    /// Deadline for the whole call
    pub timeout: Option<Duration>,
}

/// Final status of a replayed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStatus {
    /// gRPC status code
    pub code: u32,
    /// Status message
    pub message: String,
}

impl ReplayStatus {
    /// Successful completion
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: String::new(),
        }
    }

    /// Status for a call that was refused before being sent
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            code: tonic::Code::FailedPrecondition as i32 as u32,
            message: message.into(),
        }
    }

    /// Status of a failed call
    #[must_use]
    pub fn from_status(status: &tonic::Status) -> Self {
        Self {
            code: status.code() as i32 as u32,
            message: status.message().to_string(),
        }
    }

    /// Whether the call succeeded
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Canonical name of the code
    #[must_use]
    pub fn code_name(&self) -> &'static str {
        status_name(self.code)
    }
}

/// A response body received during replay
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// Arrival time
    pub received_at: DateTime<Utc>,
    /// Raw body
    pub data: Bytes,
}

/// Everything a transport observed for one call
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    /// Responses received before the call ended, including on failure
    pub messages: Vec<ReceivedMessage>,
    /// Final status
    pub status: ReplayStatus,
}

/// Sends one raw call and reports what came back
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallTransport: Send + Sync {
    /// Perform the call; failures are reported in the result status
    async fn invoke(&self, call: RawCall) -> CallResult;
}

/// Options for a replay run
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Only replay this call id; 0 replays every call
    pub call_id: u64,
    /// Per-call deadline
    pub timeout: Option<Duration>,
    /// Send the captured request metadata along
    pub forward_metadata: bool,
}

impl ReplayOptions {
    /// Restrict the run to one call
    #[must_use]
    pub fn with_call_id(mut self, call_id: u64) -> Self {
        self.call_id = call_id;
        self
    }

    /// Set a per-call deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Forward captured request metadata
    #[must_use]
    pub fn with_forward_metadata(mut self, forward: bool) -> Self {
        self.forward_metadata = forward;
        self
    }
}

/// Result of replaying one conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    /// Call id from the capture
    pub call_id: u64,
    /// Method path
    pub method: String,
    /// When the call was issued
    pub started_at: DateTime<Utc>,
    /// When the final status arrived
    pub finished_at: DateTime<Utc>,
    /// Final status
    pub status: ReplayStatus,
    /// Responses received
    pub response_count: usize,
}

impl ReplayOutcome {
    /// Wall-clock duration of the replayed call
    #[must_use]
    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Headers owned by the transport, never forwarded
const RESERVED_HEADERS: &[&str] = &["content-type", "te", "user-agent", "host", "connection"];

fn forwardable(key: &str) -> bool {
    !key.starts_with(':') && !key.starts_with("grpc-") && !RESERVED_HEADERS.contains(&key)
}

/// Replays conversations one at a time over a transport
pub struct Replayer<T> {
    transport: T,
    options: ReplayOptions,
    methods: HashMap<String, MethodTypes>,
}

impl<T: CallTransport> Replayer<T> {
    /// Create a replayer
    #[must_use]
    pub fn new(transport: T, options: ReplayOptions) -> Self {
        Self {
            transport,
            options,
            methods: HashMap::new(),
        }
    }

    /// Take call shapes from the schema for every method it declares.
    ///
    /// Methods the schema does not know fall back to the captured counts.
    #[must_use]
    pub fn with_schema(mut self, registry: &SchemaRegistry) -> Self {
        self.methods = registry
            .methods()
            .map(|(path, types)| (path.to_string(), types.clone()))
            .collect();
        self
    }

    /// Shape the call goes out with
    #[must_use]
    pub fn shape_of(&self, conversation: &Conversation) -> CallShape {
        self.methods
            .get(conversation.method_name())
            .map_or_else(|| CallShape::of(conversation), CallShape::declared)
    }

    /// Reason a conversation cannot be replayed as captured, if any
    fn mismatch(&self, conversation: &Conversation) -> Option<ReplayStatus> {
        let requests = conversation.request_messages.len();
        let shape = self.shape_of(conversation);
        (requests > 1 && !shape.client_streams()).then(|| {
            ReplayStatus::rejected(format!(
                "{} is {shape}: capture holds {requests} requests",
                conversation.method_name()
            ))
        })
    }

    /// Whether a conversation takes part in the run
    #[must_use]
    pub fn selects(&self, conversation: &Conversation) -> bool {
        conversation.is_displayable()
            && (self.options.call_id == 0 || conversation.call_id == self.options.call_id)
    }

    /// Wire form of a captured conversation
    #[must_use]
    pub fn raw_call(&self, conversation: &Conversation) -> RawCall {
        let metadata = if self.options.forward_metadata {
            conversation
                .request_header
                .as_ref()
                .and_then(CallEvent::client_header)
                .and_then(|h| h.metadata.as_ref())
                .map(|md| {
                    md.entry
                        .iter()
                        .filter(|e| forwardable(&e.key))
                        .map(|e| (e.key.clone(), e.value.clone()))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        RawCall {
            method: conversation.method_name().to_string(),
            shape: self.shape_of(conversation),
            messages: conversation
                .request_messages
                .iter()
                .map(|e| Bytes::copy_from_slice(e.body()))
                .collect(),
            metadata,
            timeout: self.options.timeout,
        }
    }

    /// Replay one conversation.
    ///
    /// Captured responses are replaced by the ones received now. A capture
    /// with more requests than the declared method accepts is not sent and
    /// fails with `FAILED_PRECONDITION`.
    #[instrument(skip(self, conversation), fields(call_id = conversation.call_id))]
    pub async fn replay(&self, conversation: &mut Conversation) -> ReplayOutcome {
        let call_id = conversation.call_id;
        if let Some(status) = self.mismatch(conversation) {
            warn!(method = conversation.method_name(), reason = %status.message, "refusing to replay call");
            let now = Utc::now();
            conversation.response_messages.clear();
            return ReplayOutcome {
                call_id,
                method: conversation.method_name().to_string(),
                started_at: now,
                finished_at: now,
                status,
                response_count: 0,
            };
        }

        let call = self.raw_call(conversation);
        let method = call.method.clone();
        debug!(method = %method, shape = %call.shape, requests = call.messages.len(), "replaying call");

        let started_at = Utc::now();
        let result = self.transport.invoke(call).await;
        let finished_at = Utc::now();

        conversation.response_messages = result
            .messages
            .into_iter()
            .map(|m| {
                CallEvent::new(call_id, EventType::ServerMessage)
                    .with_timestamp(m.received_at)
                    .with_payload(Payload::Message(Message::new(m.data.to_vec())))
            })
            .collect();

        debug!(
            code = result.status.code_name(),
            responses = conversation.response_messages.len(),
            "replay finished"
        );

        ReplayOutcome {
            call_id,
            method,
            started_at,
            finished_at,
            status: result.status,
            response_count: conversation.response_messages.len(),
        }
    }

    /// Replay every selected conversation in order
    pub async fn replay_all(&self, conversations: &mut [Conversation]) -> Vec<ReplayOutcome> {
        let mut outcomes = Vec::new();
        for conversation in conversations.iter_mut() {
            if self.selects(conversation) {
                outcomes.push(self.replay(conversation).await);
            }
        }
        outcomes
    }
}
