use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest message text the firmware stores (one more byte holds the NUL).
pub const DEFAULT_MAX_TEXT_LEN: usize = 35;

/// What to do with a speed value that matches no [`crate::MessageSpeed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPolicy {
    /// Reject with [`crate::DecodeError::UnknownSpeed`].
    Strict,
    /// Fall back to [`crate::MessageSpeed::nearest`]. Firmware builds may
    /// report speeds this client does not know yet.
    #[default]
    Nearest,
}

/// Configuration for the message codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum text length in bytes. Default: 35.
    pub max_text_len: usize,
    /// Unknown-speed handling. Default: nearest.
    pub speed_policy: SpeedPolicy,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            speed_policy: SpeedPolicy::Nearest,
        }
    }
}

impl CodecConfig {
    /// Check that `text` can be stored in a message slot.
    pub fn validate_text(&self, text: &str) -> Result<(), ValidationError> {
        if !text.is_ascii() {
            return Err(ValidationError::NonAscii);
        }
        if text.len() > self.max_text_len {
            return Err(ValidationError::MessageTooLong {
                len: text.len(),
                max: self.max_text_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware() {
        let cfg = CodecConfig::default();
        assert_eq!(cfg.max_text_len, 35);
        assert_eq!(cfg.speed_policy, SpeedPolicy::Nearest);
    }

    #[test]
    fn validate_text_limits() {
        let cfg = CodecConfig::default();
        assert!(cfg.validate_text(&"a".repeat(35)).is_ok());
        assert_eq!(
            cfg.validate_text(&"a".repeat(36)),
            Err(ValidationError::MessageTooLong { len: 36, max: 35 })
        );
        assert_eq!(cfg.validate_text("caf\u{e9}"), Err(ValidationError::NonAscii));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: CodecConfig = serde_json::from_str(r#"{"speed_policy":"strict"}"#).unwrap();
        assert_eq!(cfg.speed_policy, SpeedPolicy::Strict);
        assert_eq!(cfg.max_text_len, DEFAULT_MAX_TEXT_LEN);
    }
}
