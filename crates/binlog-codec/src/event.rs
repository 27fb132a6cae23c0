//! Event - the gRPC binary-log call event
//!
//! These messages mirror `grpc.binarylog.v1.GrpcLogEntry` field for field so
//! that captures written by any gRPC implementation decode without generated
//! bindings. Only the call-event subset of the schema is declared.

use chrono::{DateTime, Utc};

/// Kind of a recorded call event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventType {
    /// Unset or unrecognised
    Unknown = 0,
    /// Headers sent by the client, carries the method name
    ClientHeader = 1,
    /// Headers sent by the server
    ServerHeader = 2,
    /// A request message
    ClientMessage = 3,
    /// A response message
    ServerMessage = 4,
    /// Client finished sending
    ClientHalfClose = 5,
    /// Final status sent by the server
    ServerTrailer = 6,
    /// Call cancelled
    Cancel = 7,
}

impl EventType {
    /// Returns the canonical protobuf name of the event type
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "EVENT_TYPE_UNKNOWN",
            Self::ClientHeader => "EVENT_TYPE_CLIENT_HEADER",
            Self::ServerHeader => "EVENT_TYPE_SERVER_HEADER",
            Self::ClientMessage => "EVENT_TYPE_CLIENT_MESSAGE",
            Self::ServerMessage => "EVENT_TYPE_SERVER_MESSAGE",
            Self::ClientHalfClose => "EVENT_TYPE_CLIENT_HALF_CLOSE",
            Self::ServerTrailer => "EVENT_TYPE_SERVER_TRAILER",
            Self::Cancel => "EVENT_TYPE_CANCEL",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EVENT_TYPE_UNKNOWN" => Ok(Self::Unknown),
            "EVENT_TYPE_CLIENT_HEADER" => Ok(Self::ClientHeader),
            "EVENT_TYPE_SERVER_HEADER" => Ok(Self::ServerHeader),
            "EVENT_TYPE_CLIENT_MESSAGE" => Ok(Self::ClientMessage),
            "EVENT_TYPE_SERVER_MESSAGE" => Ok(Self::ServerMessage),
            "EVENT_TYPE_CLIENT_HALF_CLOSE" => Ok(Self::ClientHalfClose),
            "EVENT_TYPE_SERVER_TRAILER" => Ok(Self::ServerTrailer),
            "EVENT_TYPE_CANCEL" => Ok(Self::Cancel),
            _ => Err(format!("unknown event type: {s}")),
        }
    }
}

/// Which side of the call produced the log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Logger {
    /// Unset
    Unknown = 0,
    /// Logged by the client
    Client = 1,
    /// Logged by the server
    Server = 2,
}

impl Logger {
    /// Returns the canonical protobuf name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "LOGGER_UNKNOWN",
            Self::Client => "LOGGER_CLIENT",
            Self::Server => "LOGGER_SERVER",
        }
    }

    /// Parses a canonical protobuf name
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "LOGGER_UNKNOWN" => Some(Self::Unknown),
            "LOGGER_CLIENT" => Some(Self::Client),
            "LOGGER_SERVER" => Some(Self::Server),
            _ => None,
        }
    }
}

/// Address family of the peer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AddressType {
    /// Unset
    Unknown = 0,
    /// IPv4 address
    Ipv4 = 1,
    /// IPv6 address
    Ipv6 = 2,
    /// Unix domain socket path
    Unix = 3,
}

impl AddressType {
    /// Returns the canonical protobuf name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "TYPE_UNKNOWN",
            Self::Ipv4 => "TYPE_IPV4",
            Self::Ipv6 => "TYPE_IPV6",
            Self::Unix => "TYPE_UNIX",
        }
    }

    /// Parses a canonical protobuf name
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "TYPE_UNKNOWN" => Some(Self::Unknown),
            "TYPE_IPV4" => Some(Self::Ipv4),
            "TYPE_IPV6" => Some(Self::Ipv6),
            "TYPE_UNIX" => Some(Self::Unix),
            _ => None,
        }
    }
}

/// One recorded point-in-time occurrence of an RPC call
#[derive(Clone, PartialEq, prost::Message)]
pub struct CallEvent {
    /// When the event was recorded
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<prost_types::Timestamp>,
    /// Call identifier, unique within one capture stream
    #[prost(uint64, tag = "2")]
    pub call_id: u64,
    /// Position of the event within its call
    #[prost(uint64, tag = "3")]
    pub sequence_id_within_call: u64,
    /// Event kind, see [`EventType`]
    #[prost(enumeration = "EventType", tag = "4")]
    pub r#type: i32,
    /// Logging side, see [`Logger`]
    #[prost(enumeration = "Logger", tag = "5")]
    pub logger: i32,
    /// Kind-specific payload
    #[prost(oneof = "Payload", tags = "6, 7, 8, 9")]
    pub payload: Option<Payload>,
    /// The message body or metadata exceeded the capture size limit
    #[prost(bool, tag = "10")]
    pub payload_truncated: bool,
    /// Remote peer of the logging side
    #[prost(message, optional, tag = "11")]
    pub peer: Option<Address>,
}

/// Kind-specific payload of a [`CallEvent`]
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum Payload {
    /// Present on CLIENT_HEADER events
    #[prost(message, tag = "6")]
    ClientHeader(ClientHeader),
    /// Present on SERVER_HEADER events
    #[prost(message, tag = "7")]
    ServerHeader(ServerHeader),
    /// Present on CLIENT_MESSAGE and SERVER_MESSAGE events
    #[prost(message, tag = "8")]
    Message(Message),
    /// Present on SERVER_TRAILER events
    #[prost(message, tag = "9")]
    Trailer(Trailer),
}

/// Headers sent by the client
#[derive(Clone, PartialEq, prost::Message)]
pub struct ClientHeader {
    /// Header metadata in arrival order
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
    /// Method path, `/package.Service/Method`
    #[prost(string, tag = "2")]
    pub method_name: String,
    /// HTTP/2 authority
    #[prost(string, tag = "3")]
    pub authority: String,
    /// Call deadline relative to the header
    #[prost(message, optional, tag = "4")]
    pub timeout: Option<prost_types::Duration>,
}

/// Headers sent by the server
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServerHeader {
    /// Header metadata in arrival order
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
}

/// Final status of a call
#[derive(Clone, PartialEq, prost::Message)]
pub struct Trailer {
    /// Trailer metadata in arrival order
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
    /// gRPC status code
    #[prost(uint32, tag = "2")]
    pub status_code: u32,
    /// Human readable status message
    #[prost(string, tag = "3")]
    pub status_message: String,
    /// Serialized `google.rpc.Status` details
    #[prost(bytes = "vec", tag = "4")]
    pub status_details: Vec<u8>,
}

/// A request or response body
#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    /// Length of the original body, which may exceed `data` when truncated
    #[prost(uint32, tag = "1")]
    pub length: u32,
    /// Serialized body bytes
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

impl Message {
    /// Wrap a body, recording its length
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            length: u32::try_from(data.len()).unwrap_or(u32::MAX),
            data,
        }
    }
}

/// Ordered list of metadata entries, duplicates allowed
#[derive(Clone, PartialEq, prost::Message)]
pub struct Metadata {
    /// Entries in arrival order
    #[prost(message, repeated, tag = "1")]
    pub entry: Vec<MetadataEntry>,
}

impl Metadata {
    /// Build metadata from key/value pairs
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            entry: pairs
                .into_iter()
                .map(|(key, value)| MetadataEntry {
                    key: key.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Render as `"key":"value", "key":"value"`
    #[must_use]
    pub fn render(&self) -> String {
        self.entry
            .iter()
            .map(|e| format!("{:?}:{:?}", e.key, String::from_utf8_lossy(&e.value)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One metadata key/value pair
#[derive(Clone, PartialEq, prost::Message)]
pub struct MetadataEntry {
    /// Header name
    #[prost(string, tag = "1")]
    pub key: String,
    /// Raw header value
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// Network address of a peer
#[derive(Clone, PartialEq, prost::Message)]
pub struct Address {
    /// Address family, see [`AddressType`]
    #[prost(enumeration = "AddressType", tag = "1")]
    pub r#type: i32,
    /// Textual address
    #[prost(string, tag = "2")]
    pub address: String,
    /// Port, only for IP addresses
    #[prost(uint32, tag = "3")]
    pub ip_port: u32,
}

impl CallEvent {
    /// Create an event of the given kind
    #[must_use]
    pub fn new(call_id: u64, kind: EventType) -> Self {
        Self {
            call_id,
            r#type: kind as i32,
            ..Default::default()
        }
    }

    /// Set the timestamp
    #[must_use]
    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(to_timestamp(at));
        self
    }

    /// Set the payload
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the logging side
    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger as i32;
        self
    }

    /// Mark the payload as truncated
    #[must_use]
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.payload_truncated = truncated;
        self
    }

    /// Event kind; unrecognised values map to [`EventType::Unknown`]
    #[must_use]
    pub fn kind(&self) -> EventType {
        self.r#type()
    }

    /// Client header payload, if this is a CLIENT_HEADER event
    #[must_use]
    pub fn client_header(&self) -> Option<&ClientHeader> {
        match &self.payload {
            Some(Payload::ClientHeader(h)) => Some(h),
            _ => None,
        }
    }

    /// Server header payload, if present
    #[must_use]
    pub fn server_header(&self) -> Option<&ServerHeader> {
        match &self.payload {
            Some(Payload::ServerHeader(h)) => Some(h),
            _ => None,
        }
    }

    /// Message payload, if present
    #[must_use]
    pub fn message(&self) -> Option<&Message> {
        match &self.payload {
            Some(Payload::Message(m)) => Some(m),
            _ => None,
        }
    }

    /// Trailer payload, if present
    #[must_use]
    pub fn trailer(&self) -> Option<&Trailer> {
        match &self.payload {
            Some(Payload::Trailer(t)) => Some(t),
            _ => None,
        }
    }

    /// Method name from the client header, empty for other events
    #[must_use]
    pub fn method_name(&self) -> &str {
        self.client_header()
            .map(|h| h.method_name.as_str())
            .unwrap_or("")
    }

    /// Message body bytes, empty for events without a message payload
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.message().map(|m| m.data.as_slice()).unwrap_or(&[])
    }

    /// Timestamp as a UTC date-time
    #[must_use]
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_ref().and_then(from_timestamp)
    }
}

/// Convert a UTC date-time into a protobuf timestamp
#[must_use]
pub fn to_timestamp(at: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}

/// Convert a protobuf timestamp into a UTC date-time
#[must_use]
pub fn from_timestamp(ts: &prost_types::Timestamp) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(ts.nanos).ok()?;
    DateTime::from_timestamp(ts.seconds, nanos)
}

/// Canonical name of a gRPC status code
#[must_use]
pub fn status_name(code: u32) -> &'static str {
    match code {
        0 => "OK",
        1 => "CANCELLED",
        2 => "UNKNOWN",
        3 => "INVALID_ARGUMENT",
        4 => "DEADLINE_EXCEEDED",
        5 => "NOT_FOUND",
        6 => "ALREADY_EXISTS",
        7 => "PERMISSION_DENIED",
        8 => "RESOURCE_EXHAUSTED",
        9 => "FAILED_PRECONDITION",
        10 => "ABORTED",
        11 => "OUT_OF_RANGE",
        12 => "UNIMPLEMENTED",
        13 => "INTERNAL",
        14 => "UNAVAILABLE",
        15 => "DATA_LOSS",
        16 => "UNAUTHENTICATED",
        _ => "UNRECOGNIZED",
    }
}
