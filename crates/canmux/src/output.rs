use std::io::IsTerminal;

use canmux_driver::StatsSnapshot;
use canmux_frame::CanFrame;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
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
struct FrameOutput {
    id: String,
    extended: bool,
    remote: bool,
    dlc: u8,
    data: String,
    timestamp_us: u64,
}

impl From<&CanFrame> for FrameOutput {
    fn from(frame: &CanFrame) -> Self {
        Self {
            id: format_id(frame),
            extended: frame.is_extended(),
            remote: frame.is_remote(),
            dlc: frame.dlc(),
            data: hex_string(frame.payload()),
            timestamp_us: frame.timestamp_us(),
        }
    }
}

/// Print frames; JSON emits one object per line.
pub fn print_frames(frames: &[CanFrame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                println!(
                    "{}",
                    serde_json::to_string(&FrameOutput::from(frame))
                        .unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIMESTAMP", "ID", "FLAGS", "DLC", "DATA"]);
            for frame in frames {
                table.add_row(vec![
                    format_timestamp(frame.timestamp_us()),
                    format_id(frame),
                    flags(frame),
                    frame.dlc().to_string(),
                    hex_string(frame.payload()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                println!("({}) {frame}", format_timestamp(frame.timestamp_us()));
            }
        }
    }
}

#[derive(Serialize)]
pub struct SimulationSummary {
    pub duration_ms: u64,
    pub cyclic_messages: usize,
    pub stats: StatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_frames: Option<u64>,
}

pub fn print_summary(summary: &SimulationSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METRIC", "VALUE"]);
            for (metric, value) in summary_rows(summary) {
                table.add_row(vec![metric.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (metric, value) in summary_rows(summary) {
                println!("{metric:<16} {value}");
            }
        }
    }
}

fn summary_rows(summary: &SimulationSummary) -> Vec<(&'static str, String)> {
    let stats = &summary.stats;
    let mut rows = vec![
        ("duration_ms", summary.duration_ms.to_string()),
        ("cyclic_messages", summary.cyclic_messages.to_string()),
        ("tx_frames", stats.tx_frames.to_string()),
        ("rx_frames", stats.rx_frames.to_string()),
        ("tx_counter", stats.tx_counter.to_string()),
        ("tx_errors", stats.tx_errors.to_string()),
        ("bus_load", format!("{}%", stats.bus_load)),
    ];
    if let Some(capture) = &summary.capture {
        rows.push(("capture", capture.clone()));
    }
    if let Some(captured) = summary.captured_frames {
        rows.push(("captured_frames", captured.to_string()));
    }
    rows
}

pub fn format_id(frame: &CanFrame) -> String {
    if frame.is_extended() {
        format!("0x{:08x}", frame.id())
    } else {
        format!("0x{:03x}", frame.id())
    }
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn flags(frame: &CanFrame) -> String {
    let mut flags = String::new();
    flags.push(if frame.is_extended() { 'X' } else { '-' });
    flags.push(if frame.is_remote() { 'R' } else { '-' });
    flags
}

fn format_timestamp(timestamp_us: u64) -> String {
    format!("{}.{:06}", timestamp_us / 1_000_000, timestamp_us % 1_000_000)
}
