//! Message frame codec for ACDC badge message slots.
//!
//! Every message slot on the badge holds one frame:
//! - A 1-byte display mode
//! - A 2-byte little-endian scroll speed (display ticks)
//! - Up to 35 bytes of ASCII text, terminated by a single NUL
//!
//! The layout is shared with the badge firmware and must stay byte-exact.

pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod mode;
pub mod speed;

pub use codec::{decode_message, encode_message, HEADER_SIZE, MAX_FRAME_SIZE};
pub use config::{CodecConfig, SpeedPolicy, DEFAULT_MAX_TEXT_LEN};
pub use error::{DecodeError, Result, ValidationError};
pub use message::Message;
pub use mode::MessageMode;
pub use speed::MessageSpeed;
