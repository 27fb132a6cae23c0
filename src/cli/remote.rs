//! `send` and `fetch` - ship events to and from a log service

use super::output::FrameOutput;
use super::Context;
use anyhow::{Context as _, Result};
use binlog_transport::{namespaced_call_id, AppendOutcome, EventSink, EventSource, GrpcSink, GrpcSource};
use futures::StreamExt;
use std::path::Path;
use tracing::{info, warn};

pub async fn send(
    ctx: &Context,
    input: &Path,
    target: &str,
    origin: &str,
    prefix: &str,
    headers: &[String],
) -> Result<()> {
    let sink = GrpcSink::connect(target, headers)
        .await
        .with_context(|| format!("Failed to connect to sink {target}"))?;
    let mut events = ctx.open_events(input).await?;
    let mut stored = 0usize;

    while let Some(event) = events.recv().await {
        let call_id = namespaced_call_id(prefix, event.call_id);
        match sink.append(origin, &call_id, event).await? {
            AppendOutcome::Stored => stored += 1,
            AppendOutcome::AlreadyExists => {
                warn!(origin, call_id = %call_id, "already exists");
            }
        }
    }
    events.finish().await?;
    info!(stored, "send finished");
    Ok(())
}

pub async fn fetch(source: &str, origin: &str, trace_id: &str) -> Result<()> {
    let client = GrpcSource::connect(source)
        .await
        .with_context(|| format!("Failed to connect to source {source}"))?;
    let mut events = client.events(origin, trace_id).await?;
    let mut out = FrameOutput::stdout();

    while let Some(event) = events.next().await {
        out.write(&event?).await?;
    }
    out.finish().await
}
