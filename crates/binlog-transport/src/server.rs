//! Server - the `binlog.v1.LogSinkService` endpoint
//!
//! Shaped like tonic's generated servers: implement [`LogSink`], wrap it in
//! [`LogSinkServer`] and add it to a `tonic::transport::Server`.

use crate::proto::{WriteRequest, WriteResponse, LOG_SINK_SERVICE, WRITE_PATH};
use async_trait::async_trait;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::{empty_body, http, Body, BoxFuture, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::{Request, Response, Status};

/// Handler side of the sink service
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    /// Store one event
    async fn write(&self, request: Request<WriteRequest>) -> Result<Response<WriteResponse>, Status>;
}

/// Routes sink requests to a [`LogSink`]
#[derive(Debug)]
pub struct LogSinkServer<T> {
    inner: Arc<T>,
}

impl<T> LogSinkServer<T> {
    /// Serve `inner`
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<T> Clone for LogSinkServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> NamedService for LogSinkServer<T> {
    const NAME: &'static str = LOG_SINK_SERVICE;
}

struct WriteSvc<T>(Arc<T>);

impl<T: LogSink> UnaryService<WriteRequest> for WriteSvc<T> {
    type Response = WriteResponse;
    type Future = BoxFuture<Response<WriteResponse>, Status>;

    fn call(&mut self, request: Request<WriteRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.write(request).await })
    }
}

impl<T, B> Service<http::Request<B>> for LogSinkServer<T>
where
    T: LogSink,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        if request.uri().path() == WRITE_PATH {
            let inner = Arc::clone(&self.inner);
            return Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::<WriteResponse, WriteRequest>::default());
                Ok(grpc.unary(WriteSvc(inner), request).await)
            });
        }

        Box::pin(async move {
            let mut response = http::Response::new(empty_body());
            let headers = response.headers_mut();
            headers.insert(
                Status::GRPC_STATUS,
                (tonic::Code::Unimplemented as i32).into(),
            );
            headers.insert(
                http::header::CONTENT_TYPE,
                tonic::metadata::GRPC_CONTENT_TYPE,
            );
            Ok(response)
        })
    }
}
