//! Add command implementation.

use super::open_log;
use eventlink_core::Command;
use eventlink_uplink::DeviceConfig;
use std::path::Path;
use tracing::info;

const COMMANDS: [Command; 4] = [
    Command::TagDetected,
    Command::TimeRequest,
    Command::TimeRequest2,
    Command::TimeChanged,
];

/// CLI name of a command.
pub fn command_name(command: Command) -> &'static str {
    match command {
        Command::TagDetected => "tag-detected",
        Command::TimeRequest => "time-request",
        Command::TimeRequest2 => "time-request2",
        Command::TimeChanged => "time-changed",
    }
}

/// Parses a command name, or a decimal or `0x` hex code.
pub fn parse_command(value: &str) -> Result<u8, String> {
    if let Some(command) = COMMANDS.iter().find(|c| command_name(**c) == value) {
        return Ok(command.as_byte());
    }
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|_| format!("unknown command '{value}'"))
}

/// Parses a hex string such as `deadbeef` into bytes.
pub fn parse_hex(value: &str) -> Result<Vec<u8>, String> {
    let value = value.trim();
    if value.len() % 2 != 0 {
        return Err(format!("hex data '{value}' has an odd number of digits"));
    }
    (0..value.len())
        .step_by(2)
        .map(|i| {
            value
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex data '{value}'"))
        })
        .collect()
}

/// Runs the add command.
pub fn run(
    path: &Path,
    config: &DeviceConfig,
    code: u8,
    data: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = data.map(parse_hex).transpose()?;
    let log = open_log(path, config, true)?;
    let id = log.add_event(code, data.as_deref())?;
    info!(id, command = code, "event added");
    println!("Added event #{id}");
    Ok(())
}
