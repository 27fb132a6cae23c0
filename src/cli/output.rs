//! Output formatting shared by the commands

use crate::settings::TableStyle;
use anyhow::{Context as _, Result};
use binlog_codec::{CallEvent, FrameWriter};
use chrono::{DateTime, TimeDelta, Utc};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use tokio::io::Stdout;

const WHEN_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.6f";

/// `2024/01/31 12:00:00.000000`, empty when unknown
pub fn format_when(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format(WHEN_FORMAT).to_string())
        .unwrap_or_default()
}

/// Elapsed time, `(never)` for calls that did not finish
pub fn format_elapsed(elapsed: Option<TimeDelta>) -> String {
    match elapsed {
        Some(d) => format_delta(d),
        None => "(never)".to_string(),
    }
}

/// Compact duration such as `250µs`, `1.5s` or `1m30s`
pub fn format_delta(delta: TimeDelta) -> String {
    let negative = delta < TimeDelta::zero();
    let abs = delta.abs();
    let nanos = abs.num_nanoseconds().unwrap_or(i64::MAX).unsigned_abs();
    let text = if nanos == 0 {
        "0s".to_string()
    } else if nanos < 1_000 {
        format!("{nanos}ns")
    } else if nanos < 1_000_000 {
        format!("{}µs", trim_fraction(nanos, 1_000))
    } else if nanos < 1_000_000_000 {
        format!("{}ms", trim_fraction(nanos, 1_000_000))
    } else {
        let total_secs = nanos / 1_000_000_000;
        let frac = nanos % 1_000_000_000;
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let secs = trim_fraction((total_secs % 60) * 1_000_000_000 + frac, 1_000_000_000);
        match (hours, minutes) {
            (0, 0) => format!("{secs}s"),
            (0, m) => format!("{m}m{secs}s"),
            (h, m) => format!("{h}h{m}m{secs}s"),
        }
    };
    if negative {
        format!("-{text}")
    } else {
        text
    }
}

fn trim_fraction(value: u64, unit: u64) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Empty table with cyan headers
pub fn new_table(style: TableStyle, headers: &[&str]) -> Table {
    let mut table = Table::new();
    let preset = match style {
        TableStyle::Plain => presets::NOTHING,
        TableStyle::Utf8 => presets::UTF8_FULL_CONDENSED,
    };
    table
        .load_preset(preset)
        .set_content_arrangement(ContentArrangement::Disabled);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
    table
}

/// `call id<TAB>event type<TAB>method`
pub fn event_line(event: &CallEvent) -> String {
    format!(
        "{}\t{}\t{}",
        event.call_id,
        event.kind().as_str(),
        event.method_name()
    )
}

/// Frame writer over stdout
pub struct FrameOutput {
    writer: FrameWriter<Stdout>,
}

impl FrameOutput {
    pub fn stdout() -> Self {
        Self {
            writer: FrameWriter::new(tokio::io::stdout()),
        }
    }

    pub async fn write(&mut self, event: &CallEvent) -> Result<()> {
        self.writer
            .write_event(event)
            .await
            .context("Failed to write frame")
    }

    pub async fn finish(mut self) -> Result<()> {
        self.writer.flush().await.context("Failed to flush output")
    }
}
