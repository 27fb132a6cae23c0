//! `replay` - re-issue captured calls against a live server

use super::output::{format_delta, format_when};
use super::view::push_bodies;
use super::Context;
use anyhow::{Context as _, Result};
use binlog_replay::{
    read_conversations, render_responses, GrpcTransport, ReplayOptions, ReplayOutcome, Replayer,
};
use chrono::Utc;
use std::path::Path;
use tracing::info;

pub async fn run(
    ctx: &Context,
    input: &Path,
    target: &str,
    options: ReplayOptions,
    expand: bool,
) -> Result<()> {
    let transport = GrpcTransport::connect(target)
        .await
        .with_context(|| format!("Failed to connect to {target}"))?;
    let events = ctx.open_events(input).await?;
    let mut conversations = read_conversations(events).await?;
    let replayer = Replayer::new(transport, options).with_schema(&ctx.registry);

    println!("ID\tWhen\tElapsed\tMethod\tStatus\tDetails");
    let mut failed = 0usize;
    let mut replayed = 0usize;
    for conversation in conversations.iter_mut() {
        if !replayer.selects(conversation) {
            continue;
        }
        println!(
            "{}\t{}\t\t{}",
            conversation.call_id,
            format_when(Some(Utc::now())),
            conversation.method_name()
        );

        let outcome = replayer.replay(conversation).await;
        if expand {
            let mut lines = Vec::new();
            push_bodies(&mut lines, "<-", render_responses(&ctx.registry, conversation));
            for (marker, text) in lines {
                println!("{marker}\t{text}");
            }
        }
        println!("{}", outcome_line(&outcome));

        replayed += 1;
        if !outcome.status.is_ok() {
            failed += 1;
        }
    }
    info!(replayed, failed, "replay finished");
    Ok(())
}

/// `<-{s}<TAB>end<TAB>elapsed<TAB><TAB>CODE<TAB>message`
pub(crate) fn outcome_line(outcome: &ReplayOutcome) -> String {
    format!(
        "<-{{s}}\t{}\t{}\t\t{}\t{}",
        format_when(Some(outcome.finished_at)),
        format_delta(outcome.elapsed()),
        outcome.status.code_name(),
        outcome.status.message
    )
}
