use std::io::{IsTerminal, Write};

use badgelink_device::Snapshot;
use badgelink_frame::Message;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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
struct MessageOutput<'a> {
    mode: &'static str,
    speed: &'static str,
    ticks: u16,
    text: &'a str,
    dirty: bool,
}

impl<'a> MessageOutput<'a> {
    fn new(message: &'a Message) -> Self {
        Self {
            mode: message.mode().name(),
            speed: message.speed().name(),
            ticks: message.speed().ticks(),
            text: message.text(),
            dirty: message.is_dirty(),
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    frame: String,
    size: usize,
    #[serde(flatten)]
    message: MessageOutput<'a>,
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    address: &'a str,
    name: &'a str,
    generation: u64,
    display_enabled: bool,
    brightness: u8,
    active_message_index: i8,
    messages: Vec<MessageOutput<'a>>,
}

/// Print one message alongside its wire frame.
pub fn print_message(message: &Message, frame: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                frame: to_hex(frame),
                size: frame.len(),
                message: MessageOutput::new(message),
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
                .set_header(vec!["MODE", "SPEED", "TEXT", "FRAME"])
                .add_row(vec![
                    message.mode().to_string(),
                    format!("{} ({})", message.speed(), message.speed().ticks()),
                    message.text().to_string(),
                    to_hex(frame),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "mode={} speed={} ({} ticks) size={} text={:?} frame={}",
                message.mode(),
                message.speed(),
                message.speed().ticks(),
                frame.len(),
                message.text(),
                to_hex(frame)
            );
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

/// Print a published snapshot.
pub fn print_snapshot(address: &str, name: &str, snapshot: &Snapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out = SnapshotOutput {
                address,
                name,
                generation: snapshot.generation,
                display_enabled: snapshot.display_enabled,
                brightness: snapshot.brightness,
                active_message_index: snapshot.active_message_index,
                messages: snapshot.messages.iter().map(MessageOutput::new).collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            println!(
                "{name} ({address}) display={} brightness={} active={}",
                on_off(snapshot.display_enabled),
                snapshot.brightness,
                snapshot.active_message_index
            );
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SLOT", "MODE", "SPEED", "TEXT"]);
            for (slot, message) in snapshot.messages.iter().enumerate() {
                let marker = if slot as i64 == i64::from(snapshot.active_message_index) {
                    format!("{slot} *")
                } else {
                    slot.to_string()
                };
                table.add_row(vec![
                    marker,
                    message.mode().to_string(),
                    message.speed().to_string(),
                    message.text().to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("name={name} address={address} generation={}", snapshot.generation);
            println!(
                "display={} brightness={} active={}",
                on_off(snapshot.display_enabled),
                snapshot.brightness,
                snapshot.active_message_index
            );
            for (slot, message) in snapshot.messages.iter().enumerate() {
                println!(
                    "  [{slot}] {} {} {:?}",
                    message.mode(),
                    message.speed(),
                    message.text()
                );
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Parse hex, ignoring whitespace and an optional `0x` prefix.
pub fn from_hex(input: &str) -> Option<Vec<u8>> {
    let digits: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
