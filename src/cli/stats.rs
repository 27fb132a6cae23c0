//! `stats` - latency histogram per method

use super::output::new_table;
use super::Context;
use anyhow::Result;
use binlog_replay::{collect_stats, read_conversations, MethodStats};
use comfy_table::Table;
use std::path::Path;

const HEADERS: [&str; 11] = [
    "Method", "[≥0s]", "[≥0.05s]", "[≥0.1s]", "[≥0.2s]", "[≥0.5s]", "[≥1s]", "[≥10s]", "[≥100s]",
    "[errors]", "[incomplete]",
];

pub async fn run(ctx: &Context, input: &Path) -> Result<()> {
    let events = ctx.open_events(input).await?;
    let conversations = read_conversations(events).await?;
    let stats = collect_stats(&conversations);
    println!("{}", build_table(ctx, &stats));
    Ok(())
}

pub(crate) fn build_table(ctx: &Context, stats: &[MethodStats]) -> Table {
    let mut table = new_table(ctx.table_style(), &HEADERS);
    for method in stats {
        let mut row = vec![method.method.clone()];
        row.extend(method.buckets.iter().map(ToString::to_string));
        row.push(method.errors.to_string());
        row.push(method.incomplete.to_string());
        table.add_row(row);
    }
    table
}
