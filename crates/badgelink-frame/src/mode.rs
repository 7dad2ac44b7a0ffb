//! Display modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the badge renders a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageMode {
    Static,
    Scroll,
    Replace,
    Wargames,
    ScrollLoop,
}

impl MessageMode {
    /// Encoded size in bytes.
    pub const SIZE: usize = 1;

    /// Every mode, in wire-value order.
    pub const ALL: [MessageMode; 5] = [
        MessageMode::Static,
        MessageMode::Scroll,
        MessageMode::Replace,
        MessageMode::Wargames,
        MessageMode::ScrollLoop,
    ];

    /// Wire value.
    pub fn to_byte(self) -> u8 {
        match self {
            MessageMode::Static => 0,
            MessageMode::Scroll => 1,
            MessageMode::Replace => 2,
            MessageMode::Wargames => 3,
            MessageMode::ScrollLoop => 4,
        }
    }

    pub fn from_byte(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.to_byte() == value)
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            MessageMode::Static => "Static",
            MessageMode::Scroll => "Scroll",
            MessageMode::Replace => "Replace",
            MessageMode::Wargames => "Wargames",
            MessageMode::ScrollLoop => "Loop",
        }
    }
}

impl fmt::Display for MessageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MessageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| {
                mode.name().eq_ignore_ascii_case(&wanted)
                    || (wanted == "scroll_loop" && *mode == MessageMode::ScrollLoop)
            })
            .ok_or_else(|| format!("unknown mode '{s}'"))
    }
}
