//! gRPC transport with a pass-through codec

use super::{CallResult, CallShape, CallTransport, RawCall, ReceivedMessage, ReplayStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes};
use chrono::Utc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder, Streaming};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue};
use tonic::transport::{Channel, Endpoint};
use tokio::time::Instant;
use tonic::{Code, Request, Status};
use tracing::{debug, info, instrument};

/// Codec that moves message bodies as opaque bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawCodec;
    type Decoder = RawCodec;

    fn encoder(&mut self) -> Self::Encoder {
        RawCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawCodec
    }
}

impl Encoder for RawCodec {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Bytes, dst: &mut EncodeBuf<'_>) -> std::result::Result<(), Status> {
        dst.put(item);
        Ok(())
    }
}

impl Decoder for RawCodec {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> std::result::Result<Option<Bytes>, Status> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}

/// One shared connection to the replay target
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    channel: Channel,
    target: String,
}

impl GrpcTransport {
    /// Dial the target; `host:port` is taken as plaintext HTTP/2
    #[instrument]
    pub async fn connect(target: &str) -> Result<Self> {
        let uri = if target.contains("://") {
            target.to_string()
        } else {
            format!("http://{target}")
        };
        let connect_error = |source| Error::Connect {
            target: target.to_string(),
            source,
        };
        let channel = Endpoint::from_shared(uri)
            .map_err(connect_error)?
            .connect()
            .await
            .map_err(connect_error)?;
        info!(target, "connected to replay target");
        Ok(Self {
            channel,
            target: target.to_string(),
        })
    }

    /// Address this transport was dialled with
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    async fn call(&self, call: RawCall, received: &mut Vec<ReceivedMessage>) -> std::result::Result<(), Status> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service not ready: {e}")))?;
        let path = call
            .method
            .parse::<PathAndQuery>()
            .map_err(|e| Status::invalid_argument(format!("invalid method {:?}: {e}", call.method)))?;

        let RawCall {
            shape,
            messages,
            metadata,
            timeout,
            ..
        } = call;

        let single = match (shape, messages.as_slice()) {
            (CallShape::Unary | CallShape::ServerStreaming, [only]) => Some(only.clone()),
            _ => None,
        };

        match (shape, single) {
            (CallShape::Unary, Some(body)) => {
                let request = build_request(body, &metadata, timeout);
                let response = grpc.unary(request, path, RawCodec).await?;
                received.push(receipt(response.into_inner()));
            }
            (CallShape::ServerStreaming, Some(body)) => {
                let request = build_request(body, &metadata, timeout);
                let response = grpc.server_streaming(request, path, RawCodec).await?;
                drain(response.into_inner(), received).await?;
            }
            (CallShape::ClientStreaming, _) | (CallShape::Unary, None) => {
                let request = build_request(tokio_stream::iter(messages), &metadata, timeout);
                let response = grpc.client_streaming(request, path, RawCodec).await?;
                received.push(receipt(response.into_inner()));
            }
            _ => {
                let request = build_request(tokio_stream::iter(messages), &metadata, timeout);
                let response = grpc.streaming(request, path, RawCodec).await?;
                drain(response.into_inner(), received).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CallTransport for GrpcTransport {
    async fn invoke(&self, call: RawCall) -> CallResult {
        let timeout = call.timeout;
        let started = Instant::now();
        let mut messages = Vec::new();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.call(call, &mut messages)).await {
                Ok(Err(status))
                    if status.code() == Code::Cancelled && started.elapsed() >= limit =>
                {
                    // tonic servers cancel calls whose grpc-timeout ran out
                    Err(Status::deadline_exceeded(status.message()))
                }
                Ok(outcome) => outcome,
                Err(_) => Err(Status::deadline_exceeded("replay deadline exceeded")),
            },
            None => self.call(call, &mut messages).await,
        };
        let status = match outcome {
            Ok(()) => ReplayStatus::ok(),
            Err(status) => {
                debug!(code = ?status.code(), message = status.message(), "replayed call failed");
                ReplayStatus::from_status(&status)
            }
        };
        CallResult { messages, status }
    }
}

fn receipt(data: Bytes) -> ReceivedMessage {
    ReceivedMessage {
        received_at: Utc::now(),
        data,
    }
}

async fn drain(
    mut stream: Streaming<Bytes>,
    received: &mut Vec<ReceivedMessage>,
) -> std::result::Result<(), Status> {
    while let Some(data) = stream.message().await? {
        received.push(receipt(data));
    }
    Ok(())
}

fn build_request<M>(
    message: M,
    metadata: &[(String, Vec<u8>)],
    timeout: Option<std::time::Duration>,
) -> Request<M> {
    let mut request = Request::new(message);
    if let Some(timeout) = timeout {
        request.set_timeout(timeout);
    }
    let headers = request.metadata_mut();
    for (key, value) in metadata {
        let appended = if key.ends_with("-bin") {
            key.parse::<BinaryMetadataKey>()
                .map(|k| headers.append_bin(k, BinaryMetadataValue::from_bytes(value)))
                .is_ok()
        } else {
            match (
                key.parse::<AsciiMetadataKey>(),
                AsciiMetadataValue::try_from(value.as_slice()),
            ) {
                (Ok(k), Ok(v)) => {
                    headers.append(k, v);
                    true
                }
                _ => false,
            }
        };
        if !appended {
            debug!(key = %key, "skipping metadata that is not a valid header");
        }
    }
    request
}
