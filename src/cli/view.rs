//! `view` - per-call summary table

use super::output::{format_elapsed, format_when, new_table};
use super::Context;
use anyhow::Result;
use binlog_codec::{status_name, CallEvent, Metadata};
use binlog_replay::{read_conversations, render_requests, render_responses, Conversation, RenderedMessage};
use binlog_schema::SchemaRegistry;
use comfy_table::Table;
use std::path::Path;

/// What to print below each call's summary row
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewOptions {
    pub expand: bool,
    pub headers: bool,
    pub status_message: bool,
}

pub async fn run(ctx: &Context, input: &Path, options: ViewOptions) -> Result<()> {
    let events = ctx.open_events(input).await?;
    let conversations = read_conversations(events).await?;
    let table = build_table(ctx, &conversations, options);
    println!("{table}");
    Ok(())
}

pub(crate) fn build_table(ctx: &Context, conversations: &[Conversation], options: ViewOptions) -> Table {
    let mut table = new_table(ctx.table_style(), &["ID", "When", "Elapsed", "Method", "Status"]);
    for call in conversations.iter().filter(|c| c.is_displayable()) {
        table.add_row(vec![
            call.call_id.to_string(),
            format_when(call.started_at()),
            format_elapsed(call.elapsed()),
            call.method_name().to_string(),
            call.status_code().map(status_name).unwrap_or_default().to_string(),
        ]);
        for (marker, text) in details(&ctx.registry, call, options) {
            table.add_row(vec![marker.to_string(), String::new(), String::new(), String::new(), text]);
        }
    }
    table
}

fn metadata_of<'a>(event: Option<&'a CallEvent>, pick: impl Fn(&'a CallEvent) -> Option<&'a Metadata>) -> Option<&'a Metadata> {
    event.and_then(pick).filter(|m| !m.entry.is_empty())
}

fn details(registry: &SchemaRegistry, call: &Conversation, options: ViewOptions) -> Vec<(&'static str, String)> {
    let mut lines = Vec::new();

    if options.headers {
        let request = metadata_of(call.request_header.as_ref(), |e| {
            e.client_header().and_then(|h| h.metadata.as_ref())
        });
        let response = metadata_of(call.response_header.as_ref(), |e| {
            e.server_header().and_then(|h| h.metadata.as_ref())
        });
        let trailer = metadata_of(call.response_trailer.as_ref(), |e| {
            e.trailer().and_then(|t| t.metadata.as_ref())
        });
        for (marker, metadata) in [("->{h}", request), ("<-{h}", response), ("<-{t}", trailer)] {
            if let Some(metadata) = metadata {
                lines.push((marker, metadata.render()));
            }
        }
    }

    if options.expand {
        push_bodies(&mut lines, "->", render_requests(registry, call));
        push_bodies(&mut lines, "<-", render_responses(registry, call));
    }

    if options.status_message {
        if let Some(trailer) = call.response_trailer.as_ref().and_then(CallEvent::trailer) {
            lines.push(("<-{s}", trailer.status_message.clone()));
        }
    }

    lines
}

/// Decoded bodies, or the reason they could not be decoded
pub(crate) fn push_bodies(
    lines: &mut Vec<(&'static str, String)>,
    marker: &'static str,
    rendered: binlog_replay::Result<Vec<RenderedMessage>>,
) {
    match rendered {
        Ok(messages) => {
            for message in messages {
                let text = match message.text {
                    Ok(text) => text,
                    Err(e) => format!("#{}: {e}", message.index),
                };
                lines.push((marker, text));
            }
        }
        Err(e) => lines.push((marker, e.to_string())),
    }
}
