use badgelink_frame::Message;
use serde::Serialize;

/// One consistent view of the badge, as published after a sync.
///
/// Snapshots are immutable once published. `generation` counts publishes
/// for this link; zero means the badge has never been synchronised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub display_enabled: bool,
    pub brightness: u8,
    pub active_message_index: i8,
    pub messages: Vec<Message>,
}

impl Snapshot {
    /// Whether this snapshot holds data read from the device.
    pub fn is_synced(&self) -> bool {
        self.generation > 0
    }

    /// The message the badge is showing, if the index names a slot.
    pub fn active_message(&self) -> Option<&Message> {
        usize::try_from(self.active_message_index)
            .ok()
            .and_then(|index| self.messages.get(index))
    }
}
