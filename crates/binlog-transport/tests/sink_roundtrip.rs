//! Sink client against an in-process sink server

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use binlog_codec::{CallEvent, ClientHeader, EventType, Payload};
use binlog_transport::proto::{WriteRequest, WriteResponse};
use binlog_transport::{
    namespaced_call_id, AppendOutcome, Error, EventSink, GrpcSink, LogSink, LogSinkServer,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

#[derive(Default)]
struct Store {
    seen: Mutex<Vec<(String, String, Option<String>, CallEvent)>>,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Store>);

#[async_trait]
impl LogSink for Recorder {
    async fn write(&self, request: Request<WriteRequest>) -> Result<Response<WriteResponse>, Status> {
        let tenant = request
            .metadata()
            .get("x-tenant")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let req = request.into_inner();
        let event = req.entry.ok_or_else(|| Status::invalid_argument("missing entry"))?;

        let mut seen = self.0.seen.lock().await;
        if seen.iter().any(|(o, c, _, e)| *o == req.origin && *c == req.call_id && *e == event) {
            return Err(Status::already_exists("duplicate"));
        }
        if req.origin == "forbidden" {
            return Err(Status::permission_denied("nope"));
        }
        seen.push((req.origin, req.call_id, tenant, event));
        Ok(Response::new(WriteResponse {}))
    }
}

async fn serve(recorder: Recorder) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(LogSinkServer::new(recorder))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

fn header(call_id: u64) -> CallEvent {
    CallEvent::new(call_id, EventType::ClientHeader).with_payload(Payload::ClientHeader(
        ClientHeader {
            method_name: "/echo.Echo/Say".into(),
            ..Default::default()
        },
    ))
}

#[tokio::test]
async fn test_append_and_duplicate() {
    let recorder = Recorder::default();
    let addr = serve(recorder.clone()).await;
    let sink = GrpcSink::connect(&addr.to_string(), &["X-Tenant: blue".to_string()])
        .await
        .unwrap();

    let call_id = namespaced_call_id("host-a", 7);
    let first = sink.append("edge", &call_id, header(7)).await.unwrap();
    let again = sink.append("edge", &call_id, header(7)).await.unwrap();
    assert_eq!(first, AppendOutcome::Stored);
    assert_eq!(again, AppendOutcome::AlreadyExists);

    let seen = recorder.0.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "edge");
    assert_eq!(seen[0].1, "host-a-7");
    assert_eq!(seen[0].2.as_deref(), Some("blue"));
    assert_eq!(seen[0].3.method_name(), "/echo.Echo/Say");
}

#[tokio::test]
async fn test_rejection_is_an_error() {
    let addr = serve(Recorder::default()).await;
    let sink = GrpcSink::connect(&addr.to_string(), &[]).await.unwrap();
    let err = sink
        .append("forbidden", "p-1", header(1))
        .await
        .unwrap_err();
    match err {
        Error::Rpc(status) => assert_eq!(status.code(), tonic::Code::PermissionDenied),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_bad_header_is_rejected_before_dialling() {
    let err = GrpcSink::connect("127.0.0.1:1", &["missing separator".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidHeader(_)));
}
