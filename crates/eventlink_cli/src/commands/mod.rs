//! CLI command implementations.

pub mod add;
pub mod clear;
pub mod dump;
pub mod inspect;
pub mod simulate;

use eventlink_core::{EventLog, HeaderStore, SystemClock};
use eventlink_storage::FileBackend;
use eventlink_uplink::DeviceConfig;
use std::path::Path;
use std::sync::Arc;

/// Reads the device configuration, or the defaults without a file.
pub fn load_config(path: Option<&Path>) -> Result<DeviceConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(DeviceConfig::load(path)?),
        None => Ok(DeviceConfig::default()),
    }
}

/// Opens the event log at `path`, holding the file lock until dropped.
///
/// With `create` unset, a missing file is an error instead of a new log.
pub fn open_log(
    path: &Path,
    config: &DeviceConfig,
    create: bool,
) -> Result<EventLog, Box<dyn std::error::Error>> {
    if !create && !path.exists() {
        return Err(format!("No event file found at {}", path.display()).into());
    }
    let backend = FileBackend::open_exclusive(path)?;
    let log = EventLog::open(
        backend,
        HeaderStore::inline(),
        config.log.clone(),
        Arc::new(SystemClock),
    )?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.bin");
        assert!(open_log(&path, &DeviceConfig::default(), false).is_err());
        assert!(!path.exists());

        let log = open_log(&path, &DeviceConfig::default(), true).unwrap();
        assert!(!log.has_events());
        assert!(path.exists());
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.bin");
        let _first = open_log(&path, &DeviceConfig::default(), true).unwrap();
        assert!(open_log(&path, &DeviceConfig::default(), false).is_err());
    }
}
