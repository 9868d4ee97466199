//! Device configuration.

use crate::error::{UplinkError, UplinkResult};
use eventlink_core::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which uplink carries the event frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UplinkMode {
    /// LoRaWAN radio.
    #[default]
    Lora,
    /// In-process loopback, for simulation.
    Loopback,
}

/// Configuration for a device: delivery and clock intervals plus the event
/// log layout.
///
/// Durations are written as seconds in JSON:
///
/// ```json
/// { "send_interval": 5, "send_jitter": 0.2, "uplink_mode": "loopback" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base delay between delivery cycles.
    #[serde(with = "secs")]
    pub send_interval: Duration,
    /// Fraction of `send_interval` added at random to each delay.
    pub send_jitter: f64,
    /// Delay between clock sync attempts while unsynchronized.
    #[serde(with = "secs")]
    pub clock_sync_retry_interval: Duration,
    /// Clock drift tolerated after a sync.
    #[serde(with = "secs")]
    pub clock_accuracy: Duration,
    /// Delay between periodic clock syncs.
    #[serde(with = "secs")]
    pub clock_sync_interval: Duration,
    /// Active uplink.
    pub uplink_mode: UplinkMode,
    /// Event log layout.
    pub log: LogConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(5),
            send_jitter: 0.2,
            clock_sync_retry_interval: Duration::from_secs(3),
            clock_accuracy: Duration::from_secs(150),
            clock_sync_interval: Duration::from_secs(25),
            uplink_mode: UplinkMode::Lora,
            log: LogConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delivery interval.
    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    /// Sets the delivery jitter fraction.
    pub fn with_send_jitter(mut self, jitter: f64) -> Self {
        self.send_jitter = jitter;
        self
    }

    /// Sets the clock sync interval.
    pub fn with_clock_sync_interval(mut self, interval: Duration) -> Self {
        self.clock_sync_interval = interval;
        self
    }

    /// Sets the uplink.
    pub fn with_uplink_mode(mut self, mode: UplinkMode) -> Self {
        self.uplink_mode = mode;
        self
    }

    /// Sets the event log layout.
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Parses a JSON configuration; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`UplinkError::Config`] if the JSON is malformed or the
    /// values are invalid.
    pub fn from_json(json: &str) -> UplinkResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| UplinkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`UplinkError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> UplinkResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| UplinkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Checks that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`UplinkError::Config`] describing the first bad value.
    pub fn validate(&self) -> UplinkResult<()> {
        if self.send_interval.is_zero() {
            return Err(UplinkError::Config("send_interval must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.send_jitter) {
            return Err(UplinkError::Config(format!(
                "send_jitter {} outside 0..=1",
                self.send_jitter
            )));
        }
        self.log
            .validate()
            .map_err(|e| UplinkError::Config(e.to_string()))
    }

    /// Delivery delay for a random draw `r` in `[0, 1)`.
    pub fn delivery_delay(&self, r: f64) -> Duration {
        self.send_interval
            .mul_f64(1.0 + self.send_jitter * r.clamp(0.0, 1.0))
    }
}

/// Serializes a [`Duration`] as fractional seconds.
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.send_interval, Duration::from_secs(5));
        assert_eq!(config.send_jitter, 0.2);
        assert_eq!(config.clock_sync_retry_interval, Duration::from_secs(3));
        assert_eq!(config.clock_accuracy, Duration::from_secs(150));
        assert_eq!(config.clock_sync_interval, Duration::from_secs(25));
        assert_eq!(config.uplink_mode, UplinkMode::Lora);
        assert_eq!(config.log, LogConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder() {
        let config = DeviceConfig::new()
            .with_send_interval(Duration::from_millis(10))
            .with_send_jitter(0.0)
            .with_uplink_mode(UplinkMode::Loopback)
            .with_log(LogConfig::new().max_events(8));
        assert_eq!(config.send_interval, Duration::from_millis(10));
        assert_eq!(config.uplink_mode, UplinkMode::Loopback);
        assert_eq!(config.log.max_events, 8);
    }

    #[test]
    fn json_with_partial_fields() {
        let config = DeviceConfig::from_json(
            r#"{ "send_interval": 0.5, "uplink_mode": "loopback", "log": { "max_events": 10 } }"#,
        )
        .unwrap();
        assert_eq!(config.send_interval, Duration::from_millis(500));
        assert_eq!(config.uplink_mode, UplinkMode::Loopback);
        assert_eq!(config.log.max_events, 10);
        assert_eq!(config.log.block_size, 18);
        assert_eq!(config.clock_sync_interval, Duration::from_secs(25));
    }

    #[test]
    fn json_round_trip() {
        let config = DeviceConfig::new().with_send_jitter(0.5);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(DeviceConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(DeviceConfig::from_json(r#"{ "send_jitter": 2.0 }"#).is_err());
        assert!(DeviceConfig::from_json(r#"{ "send_interval": 0 }"#).is_err());
        assert!(DeviceConfig::from_json(r#"{ "send_interval": -1 }"#).is_err());
        assert!(DeviceConfig::from_json(r#"{ "log": { "block_size": 3 } }"#).is_err());
        assert!(DeviceConfig::from_json("not json").is_err());
    }

    #[test]
    fn delivery_delay_bounds() {
        let config = DeviceConfig::default();
        assert_eq!(config.delivery_delay(0.0), Duration::from_secs(5));
        assert_eq!(config.delivery_delay(0.5), Duration::from_millis(5500));
        assert!(config.delivery_delay(0.999) < Duration::from_secs(6));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        std::fs::write(&path, r#"{ "send_interval": 2 }"#).unwrap();
        let config = DeviceConfig::load(&path).unwrap();
        assert_eq!(config.send_interval, Duration::from_secs(2));

        assert!(DeviceConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
