//! Clear command implementation.

use super::open_log;
use eventlink_uplink::DeviceConfig;
use std::path::Path;

/// Runs the clear command.
pub fn run(path: &Path, config: &DeviceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_log(path, config, false)?;
    let count = log.events()?.len();
    log.clear()?;
    println!("Discarded {count} events");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventlink_core::Command;

    #[test]
    fn clear_empties_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.bin");
        let config = DeviceConfig::default();
        {
            let log = open_log(&path, &config, true).unwrap();
            log.add_event(Command::TagDetected, None).unwrap();
            log.add_event(Command::TagDetected, None).unwrap();
        }
        run(&path, &config).unwrap();

        let log = open_log(&path, &config, false).unwrap();
        assert!(!log.has_events());
        assert_eq!(log.current_id(), Some(1));
    }
}
