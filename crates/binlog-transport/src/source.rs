//! Source - stream events from a remote log reader

use crate::endpoint;
use crate::error::{Error, Result};
use crate::proto::{ReadRequest, ReadResponse, READ_PATH};
use async_trait::async_trait;
use binlog_codec::CallEvent;
use futures::stream::{BoxStream, StreamExt};
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tracing::{debug, instrument};

/// Stream of events from a remote source
pub type EventStream = BoxStream<'static, Result<CallEvent>>;

/// Origin of previously stored events
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Stream the events of `trace_id`, optionally restricted to `origin`
    async fn events(&self, origin: &str, trace_id: &str) -> Result<EventStream>;
}

/// gRPC client of `binlog.v1.LogReaderService`
#[derive(Debug, Clone)]
pub struct GrpcSource {
    channel: Channel,
}

impl GrpcSource {
    /// Dial a reader service
    #[instrument]
    pub async fn connect(target: &str) -> Result<Self> {
        let channel = endpoint::connect(target).await?;
        debug!(target, "connected to source");
        Ok(Self { channel })
    }
}

/// Event carried by a read response; responses without one are skipped
fn entry_of(response: std::result::Result<ReadResponse, tonic::Status>) -> Option<Result<CallEvent>> {
    match response {
        Ok(ReadResponse { entry }) => entry.map(Ok),
        Err(status) => Some(Err(Error::Rpc(status))),
    }
}

#[async_trait]
impl EventSource for GrpcSource {
    async fn events(&self, origin: &str, trace_id: &str) -> Result<EventStream> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("service not ready: {e}")))?;

        let request = tonic::Request::new(ReadRequest {
            origin: origin.to_string(),
            trace_id: trace_id.to_string(),
        });
        let response = grpc
            .server_streaming(
                request,
                PathAndQuery::from_static(READ_PATH),
                ProstCodec::<ReadRequest, ReadResponse>::default(),
            )
            .await?;

        let stream = response
            .into_inner()
            .filter_map(|item| futures::future::ready(entry_of(item)))
            .boxed();
        Ok(stream)
    }
}
