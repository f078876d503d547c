use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rovlink_records::Record;
use rovlink_session::LinkStats;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    sequence: u32,
    category: &'a str,
    /// Host wall-clock time of the record in milliseconds, when known.
    host_time_ms: Option<u128>,
    record: &'a Record,
}

pub fn print_record(
    sequence: u32,
    host_time: Option<SystemTime>,
    record: &Record,
    format: OutputFormat,
) {
    let host_time_ms = host_time.and_then(unix_millis);
    match format {
        OutputFormat::Json => {
            let out = RecordOutput {
                sequence,
                category: record.category(),
                host_time_ms,
                record,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "CATEGORY", "TIME", "RECORD"])
                .add_row(vec![
                    sequence.to_string(),
                    record.category().to_string(),
                    host_time_ms.map_or_else(|| "-".to_string(), |ms| ms.to_string()),
                    record_summary(record),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "seq={} category={} {}",
                sequence,
                record.category(),
                record_summary(record)
            );
        }
    }
}

pub fn print_stats(stats: &LinkStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in stat_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = stat_rows(stats)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{}", line.join(" "));
        }
    }
}

fn stat_rows(stats: &LinkStats) -> [(&'static str, u64); 9] {
    [
        ("frames_accepted", stats.frames_accepted),
        ("frames_rejected", stats.frames_rejected),
        ("frames_dropped", stats.frames_dropped),
        ("unknown_categories", stats.unknown_categories),
        ("sequence_gaps", stats.sequence_gaps),
        ("withheld", stats.withheld),
        ("device_rejections", stats.device_rejections),
        ("log_lines", stats.log_lines),
        ("commands_sent", stats.commands_sent),
    ]
}

/// Record fields as compact JSON, without the `kind` tag.
fn record_summary(record: &Record) -> String {
    match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.remove("kind");
            serde_json::Value::Object(map).to_string()
        }
        Ok(other) => other.to_string(),
        Err(_) => format!("{record:?}"),
    }
}

fn unix_millis(time: SystemTime) -> Option<u128> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_millis())
}
