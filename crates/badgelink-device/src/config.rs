use std::path::Path;
use std::time::Duration;

use badgelink_frame::CodecConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Brightest setting the firmware accepts.
pub const DEFAULT_MAX_BRIGHTNESS: u8 = 16;

/// Scan batching used by device discovery.
///
/// Discovery itself lives with the platform; the timings are kept here so one
/// config file covers the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanTiming {
    /// Time to batch scan results before reporting. Default: 3000 ms.
    pub batch_delay_ms: u64,
    /// Total scan window. Default: 15000 ms.
    pub scan_window_ms: u64,
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self {
            batch_delay_ms: 3_000,
            scan_window_ms: 15_000,
        }
    }
}

/// Configuration for one badge link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Highest accepted brightness (inclusive). Default: 16.
    pub max_brightness: u8,
    /// Message codec settings.
    pub codec: CodecConfig,
    /// Deadline for a single register operation. `None` waits forever.
    pub operation_timeout_ms: Option<u64>,
    /// Buffered notices per subscriber before old ones are dropped. Default: 32.
    pub notice_capacity: usize,
    /// Scan timings for the discovery collaborator.
    pub scan: ScanTiming,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_brightness: DEFAULT_MAX_BRIGHTNESS,
            codec: CodecConfig::default(),
            operation_timeout_ms: None,
            notice_capacity: 32,
            scan: ScanTiming::default(),
        }
    }
}

impl LinkConfig {
    /// Parse overrides from JSON. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load overrides from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use badgelink_frame::SpeedPolicy;

    use super::*;
    use crate::error::LinkError;

    #[test]
    fn defaults() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.max_brightness, 16);
        assert_eq!(cfg.codec.max_text_len, 35);
        assert_eq!(cfg.operation_timeout(), None);
        assert_eq!(cfg.scan.scan_window_ms, 15_000);
    }

    #[test]
    fn json_overrides_nested_fields() {
        let cfg = LinkConfig::from_json_str(
            r#"{
                "max_brightness": 10,
                "codec": { "speed_policy": "strict" },
                "operation_timeout_ms": 2500
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.max_brightness, 10);
        assert_eq!(cfg.codec.speed_policy, SpeedPolicy::Strict);
        assert_eq!(cfg.codec.max_text_len, 35);
        assert_eq!(cfg.operation_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(cfg.notice_capacity, 32);
    }

    #[test]
    fn invalid_json_is_config_error() {
        let err = LinkConfig::from_json_str("{not-json").unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = LinkConfig::from_file("/nonexistent/badgelink.json").unwrap_err();
        assert!(matches!(err, LinkError::Io(_)));
    }
}
