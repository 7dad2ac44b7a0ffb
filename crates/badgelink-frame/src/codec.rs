use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::config::{CodecConfig, SpeedPolicy, DEFAULT_MAX_TEXT_LEN};
use crate::error::{DecodeError, Result, ValidationError};
use crate::message::Message;
use crate::mode::MessageMode;
use crate::speed::MessageSpeed;

/// Frame header: mode (1) + speed (2) = 3 bytes.
pub const HEADER_SIZE: usize = MessageMode::SIZE + MessageSpeed::SIZE;

/// Largest frame with the default text limit: header + 35 text bytes + NUL.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + DEFAULT_MAX_TEXT_LEN + 1;

/// Encode a message into its slot frame.
///
/// Wire format:
/// ```text
/// ┌───────────┬────────────┬──────────────────┬──────┐
/// │ Mode (1B) │ Speed      │ Text             │ 0x00 │
/// │           │ (2B LE)    │ (ASCII, ≤ 35B)   │      │
/// └───────────┴────────────┴──────────────────┴──────┘
/// ```
/// The terminator is always written so the firmware never reads past the text.
pub fn encode_message(
    message: &Message,
    config: &CodecConfig,
) -> std::result::Result<Bytes, ValidationError> {
    config.validate_text(message.text())?;

    let text = message.text().as_bytes();
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + text.len() + 1);
    dst.put_u8(message.mode().to_byte());
    dst.put_u16_le(message.speed().ticks());
    dst.put_slice(text);
    dst.put_u8(0);
    Ok(dst.freeze())
}

/// Decode a slot frame.
///
/// Text runs from the end of the header to the first NUL, or to the end of
/// the buffer when there is none. Bytes outside 7-bit ASCII decode to
/// U+FFFD. The decoded message is clean.
pub fn decode_message(src: &[u8], config: &CodecConfig) -> Result<Message> {
    if src.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort { len: src.len() });
    }

    let mut buf = src;
    let raw_mode = buf.get_u8();
    let mode = MessageMode::from_byte(raw_mode).ok_or(DecodeError::UnknownMode(raw_mode))?;

    let raw_speed = buf.get_u16_le();
    let speed = match MessageSpeed::from_ticks(raw_speed) {
        Some(speed) => speed,
        None => match config.speed_policy {
            SpeedPolicy::Strict => return Err(DecodeError::UnknownSpeed(raw_speed)),
            SpeedPolicy::Nearest => {
                let speed = MessageSpeed::nearest(raw_speed);
                debug!(raw_speed, %speed, "unknown speed, using nearest");
                speed
            }
        },
    };

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let text: String = buf[..end]
        .iter()
        .map(|&b| {
            if b.is_ascii() {
                char::from(b)
            } else {
                char::REPLACEMENT_CHARACTER
            }
        })
        .collect();

    Ok(Message::new(mode, speed, text))
}
