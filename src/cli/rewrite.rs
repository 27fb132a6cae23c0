//! `filter`, `decode` and `encode` - rewrite a capture

use super::output::FrameOutput;
use super::Context;
use anyhow::{Context as _, Result};
use binlog_replay::Transcoder;
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

fn selected(call_id: u64, wanted: u64) -> bool {
    wanted == 0 || call_id == wanted
}

/// Call id of an annotated event, written as a string or a number
fn json_call_id(value: &Value) -> Option<u64> {
    match value.get("callId")? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

pub async fn filter(ctx: &Context, input: &Path, call_id: u64) -> Result<()> {
    let mut events = ctx.open_events(input).await?;
    let mut out = FrameOutput::stdout();
    let mut written = 0usize;

    while let Some(event) = events.recv().await {
        if selected(event.call_id, call_id) {
            out.write(&event).await?;
            written += 1;
        }
    }
    events.finish().await?;
    out.finish().await?;
    debug!(written, "filter finished");
    Ok(())
}

pub async fn decode(ctx: &Context, input: &Path, call_id: u64, expand: bool) -> Result<()> {
    let mut events = ctx.open_events(input).await?;
    let mut transcoder = Transcoder::new(&ctx.registry);

    while let Some(event) = events.recv().await {
        if !selected(event.call_id, call_id) {
            continue;
        }
        let value = transcoder.annotate(&event, expand)?;
        let text = serde_json::to_string_pretty(&value).context("Failed to render event")?;
        println!("{text}");
    }
    events.finish().await?;
    Ok(())
}

async fn read_input(input: &Path) -> Result<Vec<u8>> {
    if input == Path::new("-") {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))
}

pub async fn encode(ctx: &Context, input: &Path, call_id: u64) -> Result<()> {
    let raw = read_input(input).await?;
    let mut transcoder = Transcoder::new(&ctx.registry);
    let mut out = FrameOutput::stdout();

    for (index, document) in serde_json::Deserializer::from_slice(&raw)
        .into_iter::<Value>()
        .enumerate()
    {
        let value = document.with_context(|| format!("Invalid JSON document #{index}"))?;
        if call_id != 0 && json_call_id(&value) != Some(call_id) {
            continue;
        }
        let event = transcoder
            .encode(value)
            .with_context(|| format!("Failed to encode document #{index}"))?;
        out.write(&event).await?;
    }
    out.finish().await
}
