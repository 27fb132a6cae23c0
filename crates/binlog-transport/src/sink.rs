//! Sink - append events to a remote log sink

use crate::endpoint;
use crate::error::{Error, Result};
use crate::proto::{WriteRequest, WriteResponse, WRITE_PATH};
use async_trait::async_trait;
use binlog_codec::CallEvent;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::transport::Channel;
use tonic::{Code, Request};
use tracing::{debug, instrument};

/// How the sink took an appended event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Newly stored
    Stored,
    /// The sink already holds this event
    AlreadyExists,
}

/// Destination for captured events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Append one event under `origin` and a namespaced call id
    async fn append(&self, origin: &str, call_id: &str, event: CallEvent) -> Result<AppendOutcome>;
}

/// Call id namespaced by a capture prefix, so merged captures do not collide
#[must_use]
pub fn namespaced_call_id(prefix: &str, call_id: u64) -> String {
    format!("{prefix}-{call_id}")
}

/// Split a `Key: value` header argument
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| Error::InvalidHeader(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidHeader(raw.to_string()));
    }
    Ok((key.to_ascii_lowercase(), value.trim_start().to_string()))
}

/// gRPC client of `binlog.v1.LogSinkService`
#[derive(Debug, Clone)]
pub struct GrpcSink {
    channel: Channel,
    headers: Vec<(AsciiMetadataKey, AsciiMetadataValue)>,
}

impl GrpcSink {
    /// Dial a sink, attaching `headers` (`Key: value`) to every request
    #[instrument(skip(headers))]
    pub async fn connect(target: &str, headers: &[String]) -> Result<Self> {
        let headers = headers
            .iter()
            .map(|raw| {
                let (key, value) = parse_header(raw)?;
                let key = key
                    .parse::<AsciiMetadataKey>()
                    .map_err(|_| Error::InvalidHeader(raw.clone()))?;
                let value = value
                    .parse::<AsciiMetadataValue>()
                    .map_err(|_| Error::InvalidHeader(raw.clone()))?;
                Ok((key, value))
            })
            .collect::<Result<Vec<_>>>()?;
        let channel = endpoint::connect(target).await?;
        debug!(target, headers = headers.len(), "connected to sink");
        Ok(Self { channel, headers })
    }

    async fn write(&self, request: WriteRequest) -> std::result::Result<WriteResponse, tonic::Status> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("service not ready: {e}")))?;

        let mut request = Request::new(request);
        for (key, value) in &self.headers {
            request.metadata_mut().append(key.clone(), value.clone());
        }
        let path = PathAndQuery::from_static(WRITE_PATH);
        let response = grpc
            .unary(request, path, ProstCodec::<WriteRequest, WriteResponse>::default())
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl EventSink for GrpcSink {
    async fn append(&self, origin: &str, call_id: &str, event: CallEvent) -> Result<AppendOutcome> {
        let request = WriteRequest {
            origin: origin.to_string(),
            call_id: call_id.to_string(),
            entry: Some(event),
        };
        match self.write(request).await {
            Ok(_) => Ok(AppendOutcome::Stored),
            Err(status) if status.code() == Code::AlreadyExists => Ok(AppendOutcome::AlreadyExists),
            Err(status) => Err(Error::Rpc(status)),
        }
    }
}
