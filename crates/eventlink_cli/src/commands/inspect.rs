//! Inspect command implementation.

use super::open_log;
use eventlink_core::LogStatus;
use eventlink_uplink::DeviceConfig;
use serde::Serialize;
use std::path::Path;

/// Event file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Event file path.
    pub path: String,
    /// Size of one event block.
    pub block_size: usize,
    /// Events the log holds before evicting.
    pub max_events: usize,
    /// Log state.
    #[serde(flatten)]
    pub status: LogStatus,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    config: &DeviceConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_log(path, config, false)?;
    let result = InspectResult {
        path: path.display().to_string(),
        block_size: config.log.block_size,
        max_events: config.log.max_events,
        status: log.status()?,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    let status = &result.status;
    println!("EventLink Event File Inspection");
    println!("===============================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Layout:");
    println!("  Block size:  {} bytes", result.block_size);
    println!("  Max events:  {}", result.max_events);
    println!("  Capacity:    {} bytes", status.capacity);
    println!();
    println!("Cursors:");
    println!("  Read:        {}", status.read_position);
    println!("  Write:       {}", status.write_position);
    println!();
    println!("Usage:");
    println!(
        "  Used:        {} bytes ({:.1}%)",
        status.used_bytes,
        percent(status.used_bytes, status.capacity)
    );
    println!("  Free:        {} bytes", status.free_bytes);
    println!("  Events:      {}", status.event_count);
    println!();
    println!("IDs:");
    match status.current_id {
        Some(id) => println!("  Last event:  {id}"),
        None => println!("  Last event:  none"),
    }
    println!("  Last ack:    {}", status.ack_id);
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_capacity() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(11, 22), 50.0);
    }

    #[test]
    fn inspect_json_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.bin");
        let config = DeviceConfig::default();
        {
            let log = open_log(&path, &config, true).unwrap();
            log.add_event(eventlink_core::Command::TagDetected, None)
                .unwrap();
        }
        let log = open_log(&path, &config, false).unwrap();
        let result = InspectResult {
            path: path.display().to_string(),
            block_size: 18,
            max_events: 1000,
            status: log.status().unwrap(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["event_count"], 1);
        assert_eq!(json["current_id"], 0);
        assert_eq!(json["capacity"], 22_000);
    }
}
