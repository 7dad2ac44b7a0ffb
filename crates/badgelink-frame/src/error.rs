/// Errors that can occur while decoding a message frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer ends before the mode and speed header.
    #[error("frame too short ({len} bytes, need at least 3)")]
    TooShort { len: usize },

    /// The mode byte names no known display mode.
    #[error("unknown message mode {0:#04x}")]
    UnknownMode(u8),

    /// The speed field names no known speed and the policy is strict.
    #[error("unknown message speed {0}")]
    UnknownSpeed(u16),
}

/// Errors raised before anything is sent to the device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A numeric value is outside its permitted range.
    #[error("{field} {value} out of range ({min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Message text exceeds the configured limit.
    #[error("message too long ({len} bytes, max {max})")]
    MessageTooLong { len: usize, max: usize },

    /// Message text contains characters outside 7-bit ASCII.
    #[error("message text must be 7-bit ASCII")]
    NonAscii,

    /// The message slot does not exist.
    #[error("message slot {slot} does not exist ({count} slots)")]
    UnknownSlot { slot: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
