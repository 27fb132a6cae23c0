use super::*;
use crate::conversation::Reconstructor;
use binlog_codec::{ClientHeader, Metadata, Trailer};
use binlog_schema::SchemaRegistryBuilder;
use mockall::predicate::function;

fn header(id: u64, method: &str, metadata: &[(&str, &str)]) -> CallEvent {
    CallEvent::new(id, EventType::ClientHeader).with_payload(Payload::ClientHeader(ClientHeader {
        method_name: method.to_string(),
        metadata: Some(Metadata::from_pairs(metadata.iter().copied())),
        ..Default::default()
    }))
}

fn body(id: u64, kind: EventType, data: &[u8]) -> CallEvent {
    CallEvent::new(id, kind).with_payload(Payload::Message(Message::new(data.to_vec())))
}

fn trailer(id: u64) -> CallEvent {
    CallEvent::new(id, EventType::ServerTrailer).with_payload(Payload::Trailer(Trailer::default()))
}

fn capture() -> Vec<Conversation> {
    vec![
        header(1, "/echo.Echo/Collect", &[("x-tenant", "blue")]),
        body(1, EventType::ClientMessage, b"\x0a\x01a"),
        body(1, EventType::ClientMessage, b"\x0a\x01b"),
        body(1, EventType::ServerMessage, b"old"),
        trailer(1),
        header(2, "/echo.Echo/Say", &[]),
        body(2, EventType::ClientMessage, b"\x0a\x02hi"),
        body(2, EventType::ServerMessage, b"old"),
        trailer(2),
    ]
    .into_iter()
    .collect::<Reconstructor>()
    .finish()
}

fn reply(data: &'static [u8]) -> CallResult {
    CallResult {
        messages: vec![ReceivedMessage {
            received_at: Utc::now(),
            data: Bytes::from_static(data),
        }],
        status: ReplayStatus::ok(),
    }
}

#[test]
fn test_call_shape_from_counts() {
    let calls = capture();
    assert_eq!(CallShape::of(&calls[0]), CallShape::ClientStreaming);
    assert_eq!(CallShape::of(&calls[1]), CallShape::Unary);

    let mut bidi = calls[0].clone();
    bidi.response_messages.push(bidi.response_messages[0].clone());
    assert_eq!(CallShape::of(&bidi), CallShape::Bidirectional);
    assert_eq!(CallShape::Bidirectional.to_string(), "bidi_streaming");
}

fn schema(rpcs: &str) -> SchemaRegistry {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.proto");
    let source = format!(
        "syntax = \"proto3\";\npackage echo;\nmessage Blob {{ bytes data = 1; }}\nservice Echo {{\n{rpcs}\n}}\n"
    );
    std::fs::write(&path, source).unwrap();
    let mut builder = SchemaRegistryBuilder::new();
    builder.load_from_schema_sources(&[path], &[]).unwrap();
    builder.build()
}

#[test]
fn test_declared_shape_overrides_counts() {
    let registry = schema(
        "rpc Collect(stream Blob) returns (Blob);\nrpc Say(Blob) returns (stream Blob);",
    );
    let replayer =
        Replayer::new(MockCallTransport::new(), ReplayOptions::default()).with_schema(&registry);
    let calls = capture();
    assert_eq!(replayer.shape_of(&calls[0]), CallShape::ClientStreaming);
    assert_eq!(replayer.shape_of(&calls[1]), CallShape::ServerStreaming);
    assert_eq!(replayer.raw_call(&calls[1]).shape, CallShape::ServerStreaming);

    let mut unknown = calls[1].clone();
    unknown.request_header = Some(header(2, "/echo.Other/Say", &[]));
    assert_eq!(replayer.shape_of(&unknown), CallShape::Unary);
}

#[tokio::test]
async fn test_extra_requests_for_unary_method_are_refused() {
    let registry = schema("rpc Collect(Blob) returns (Blob);\nrpc Say(Blob) returns (Blob);");
    let mut transport = MockCallTransport::new();
    transport
        .expect_invoke()
        .with(function(|call: &RawCall| call.method == "/echo.Echo/Collect"))
        .times(0);
    transport
        .expect_invoke()
        .with(function(|call: &RawCall| call.method == "/echo.Echo/Say"))
        .times(1)
        .returning(|_| reply(b"\x0a\x02hi"));

    let replayer = Replayer::new(transport, ReplayOptions::default()).with_schema(&registry);
    let mut conversations = capture();
    let outcomes = replayer.replay_all(&mut conversations).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status.code_name(), "FAILED_PRECONDITION");
    assert!(outcomes[0].status.message.contains("capture holds 2 requests"));
    assert_eq!(outcomes[0].response_count, 0);
    assert!(conversations[0].response_messages.is_empty());
    assert!(outcomes[1].status.is_ok());
}

#[test]
fn test_raw_call_carries_captured_bytes() {
    let calls = capture();
    let replayer = Replayer::new(MockCallTransport::new(), ReplayOptions::default());
    let call = replayer.raw_call(&calls[0]);
    assert_eq!(call.method, "/echo.Echo/Collect");
    assert_eq!(
        call.messages,
        vec![Bytes::from_static(b"\x0a\x01a"), Bytes::from_static(b"\x0a\x01b")]
    );
    assert!(call.metadata.is_empty());
    assert_eq!(call.timeout, None);
}

#[test]
fn test_metadata_forwarding_skips_reserved_headers() {
    let conversation = vec![header(
        3,
        "/echo.Echo/Say",
        &[
            (":authority", "x"),
            ("content-type", "application/grpc"),
            ("grpc-accept-encoding", "gzip"),
            ("user-agent", "grpc-go"),
            ("x-tenant", "blue"),
            ("x-trace-bin", "\u{1}"),
        ],
    )]
    .into_iter()
    .collect::<Reconstructor>()
    .finish()
    .remove(0);

    let options = ReplayOptions::default()
        .with_forward_metadata(true)
        .with_timeout(Some(Duration::from_secs(2)));
    let replayer = Replayer::new(MockCallTransport::new(), options);
    let call = replayer.raw_call(&conversation);
    let keys: Vec<_> = call.metadata.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["x-tenant", "x-trace-bin"]);
    assert_eq!(call.timeout, Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_failed_call_does_not_stop_the_run() {
    let mut transport = MockCallTransport::new();
    transport
        .expect_invoke()
        .with(function(|call: &RawCall| call.shape == CallShape::ClientStreaming))
        .times(1)
        .returning(|_| CallResult {
            messages: Vec::new(),
            status: ReplayStatus {
                code: 12,
                message: "method Collect is unary".into(),
            },
        });
    transport
        .expect_invoke()
        .with(function(|call: &RawCall| call.method == "/echo.Echo/Say"))
        .times(1)
        .returning(|_| reply(b"\x0a\x02hi"));

    let replayer = Replayer::new(transport, ReplayOptions::default());
    let mut conversations = capture();
    let outcomes = replayer.replay_all(&mut conversations).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status.code_name(), "UNIMPLEMENTED");
    assert_eq!(outcomes[0].response_count, 0);
    assert!(conversations[0].response_messages.is_empty());

    assert!(outcomes[1].status.is_ok());
    assert_eq!(outcomes[1].response_count, 1);
    assert_eq!(conversations[1].response_messages[0].body(), b"\x0a\x02hi");
    assert_eq!(
        conversations[1].response_messages[0].kind(),
        EventType::ServerMessage
    );
    assert!(outcomes[1].elapsed() >= TimeDelta::zero());
}

#[tokio::test]
async fn test_call_id_filter_and_hidden_calls() {
    let mut transport = MockCallTransport::new();
    transport
        .expect_invoke()
        .times(1)
        .returning(|call| {
            assert_eq!(call.method, "/echo.Echo/Say");
            reply(b"")
        });

    let mut conversations = capture();
    conversations.push(Conversation::new(0));

    let replayer = Replayer::new(transport, ReplayOptions::default().with_call_id(2));
    let outcomes = replayer.replay_all(&mut conversations).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].call_id, 2);
    assert_eq!(conversations[0].response_messages[0].body(), b"old");
}

#[test]
fn test_status_from_tonic() {
    let status = ReplayStatus::from_status(&tonic::Status::not_found("gone"));
    assert_eq!(status.code, 5);
    assert_eq!(status.code_name(), "NOT_FOUND");
    assert_eq!(status.message, "gone");
    assert!(!status.is_ok());
}
