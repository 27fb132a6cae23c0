//! `recv` - serve the sink service and print what arrives

use super::output::event_line;
use super::Context;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use binlog_transport::proto::{WriteRequest, WriteResponse};
use binlog_transport::{LogSink, LogSinkServer};
use std::net::SocketAddr;
use tonic::{Request, Response, Status};
use tracing::info;

/// Prints every received event
#[derive(Debug, Default)]
struct PrintingSink;

#[async_trait]
impl LogSink for PrintingSink {
    async fn write(&self, request: Request<WriteRequest>) -> Result<Response<WriteResponse>, Status> {
        let event = request
            .into_inner()
            .entry
            .ok_or_else(|| Status::invalid_argument("missing entry"))?;
        println!("{}", event_line(&event));
        Ok(Response::new(WriteResponse {}))
    }
}

pub async fn run(ctx: &Context, listen: &str) -> Result<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address {listen}"))?;
    let cancel = ctx.cancel.clone();

    info!(%addr, "serving log sink");
    tonic::transport::Server::builder()
        .add_service(LogSinkServer::new(PrintingSink))
        .serve_with_shutdown(addr, async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = cancel.cancelled() => {}
            }
        })
        .await
        .context("Sink server failed")?;
    info!("sink server stopped");
    Ok(())
}
