//! `debug` - one line per raw event

use super::output::event_line;
use super::Context;
use anyhow::{Context as _, Result};
use binlog_codec::to_json;
use std::path::Path;

pub async fn run(ctx: &Context, input: &Path, expand: bool) -> Result<()> {
    let mut events = ctx.open_events(input).await?;

    while let Some(event) = events.recv().await {
        println!("{}", event_line(&event));
        if expand {
            let value = to_json(&event).context("Failed to render event")?;
            let text = serde_json::to_string_pretty(&value).context("Failed to render event")?;
            println!("{text}");
        }
    }
    events.finish().await?;
    Ok(())
}
