//! Scroll speeds.
//!
//! Values are display ticks between animation steps (the firmware ticks
//! every 50 ms), so a larger value is a slower message.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSpeed {
    Slowest,
    Slow,
    Medium,
    Fast,
    Fastest,
}

impl MessageSpeed {
    /// Encoded size in bytes.
    pub const SIZE: usize = 2;

    /// Every speed, slowest first.
    pub const ALL: [MessageSpeed; 5] = [
        MessageSpeed::Slowest,
        MessageSpeed::Slow,
        MessageSpeed::Medium,
        MessageSpeed::Fast,
        MessageSpeed::Fastest,
    ];

    pub fn ticks(self) -> u16 {
        match self {
            MessageSpeed::Slowest => 64,
            MessageSpeed::Slow => 32,
            MessageSpeed::Medium => 16,
            MessageSpeed::Fast => 8,
            MessageSpeed::Fastest => 4,
        }
    }

    /// Exact match on a tick count.
    pub fn from_ticks(ticks: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|speed| speed.ticks() == ticks)
    }

    /// The slowest defined speed strictly faster than `ticks`, or
    /// [`MessageSpeed::Medium`] when there is none.
    pub fn nearest(ticks: u16) -> Self {
        Self::ALL
            .into_iter()
            .find(|speed| speed.ticks() < ticks)
            .unwrap_or(MessageSpeed::Medium)
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageSpeed::Slowest => "Slowest",
            MessageSpeed::Slow => "Slow",
            MessageSpeed::Medium => "Medium",
            MessageSpeed::Fast => "Fast",
            MessageSpeed::Fastest => "Fastest",
        }
    }
}

impl fmt::Display for MessageSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MessageSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|speed| speed.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown speed '{s}'"))
    }
}
