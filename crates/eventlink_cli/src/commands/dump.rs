//! Dump command implementation.

use super::open_log;
use eventlink_core::EventRecord;
use eventlink_uplink::{hex, DeviceConfig};
use serde::Serialize;
use std::path::Path;

/// Event representation for output.
#[derive(Debug, Serialize)]
pub struct EventInfo {
    /// Event ID.
    pub id: u16,
    /// Raw command code.
    pub command: u8,
    /// Command name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    /// Device timestamp in seconds.
    pub timestamp: u32,
    /// Payload, hex-encoded.
    pub data: String,
}

impl From<&EventRecord> for EventInfo {
    fn from(record: &EventRecord) -> Self {
        Self {
            id: record.id,
            command: record.command,
            name: record.known_command().map(super::add::command_name),
            timestamp: record.timestamp,
            data: hex(&record.data),
        }
    }
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    config: &DeviceConfig,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_log(path, config, false)?;
    let events: Vec<EventInfo> = log
        .events()?
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(EventInfo::from)
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        _ => {
            print_text_output(&events);
        }
    }

    Ok(())
}

fn print_text_output(events: &[EventInfo]) {
    println!("Stored Events");
    println!("=============");
    println!();

    if events.is_empty() {
        println!("(no events)");
        return;
    }

    for event in events {
        let name = event.name.unwrap_or("unknown");
        println!(
            "#{:<5} cmd=0x{:02x} {:<14} ts={:<10} data={}",
            event.id, event.command, name, event.timestamp, event.data
        );
    }

    println!();
    println!("Total: {} events", events.len());
}
