use serde::Serialize;

use crate::mode::MessageMode;
use crate::speed::MessageSpeed;

/// One badge message.
///
/// A message has no identity of its own; it is whatever occupies a slot in
/// the device's message list. `dirty` marks local edits that the device has
/// not confirmed yet. Setters only mark the message dirty on a real change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    mode: MessageMode,
    speed: MessageSpeed,
    text: String,
    dirty: bool,
}

impl Message {
    /// A clean message, as read from the device.
    pub fn new(mode: MessageMode, speed: MessageSpeed, text: impl Into<String>) -> Self {
        Self {
            mode,
            speed,
            text: text.into(),
            dirty: false,
        }
    }

    pub fn mode(&self) -> MessageMode {
        self.mode
    }

    pub fn speed(&self) -> MessageSpeed {
        self.speed
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Has local edits not yet confirmed by the device.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the text. Length and charset are checked by
    /// [`crate::CodecConfig::validate_text`] before the caller gets here.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.text {
            return false;
        }
        self.text = text;
        self.dirty = true;
        true
    }

    pub fn set_mode(&mut self, mode: MessageMode) -> bool {
        if mode == self.mode {
            return false;
        }
        self.mode = mode;
        self.dirty = true;
        true
    }

    pub fn set_speed(&mut self, speed: MessageSpeed) -> bool {
        if speed == self.speed {
            return false;
        }
        self.speed = speed;
        self.dirty = true;
        true
    }

    /// Mark the local edits as confirmed by the device.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
