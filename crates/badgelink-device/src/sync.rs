//! Device state synchronizer.
//!
//! A full refresh reads every badge register through the [`OperationQueue`]
//! and publishes one [`Snapshot`] once the last read has completed. Mutations
//! are writes through the same queue, so they never interleave with a
//! refresh in progress.
//!
//! Update policy: cached values are confirmed-only. Brightness, display state,
//! active index and message dirty flags change only when the device reports a
//! successful write. A failed write leaves the cache untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use badgelink_frame::{
    decode_message, encode_message, CodecConfig, Message, MessageMode, MessageSpeed,
    ValidationError,
};
use badgelink_transport::{Operation, Register, RegisterHandle, TransportError};
use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::Result;
use crate::queue::OperationQueue;
use crate::registers::RegisterMap;
use crate::snapshot::Snapshot;

/// On/off register value that means on. Anything else reads as off.
const DISPLAY_ON: u8 = 1;

#[derive(Default)]
struct SyncState {
    registers: Option<RegisterMap>,
    /// Writes are only issued while the link is ready.
    online: bool,
    /// Last value seen for each register, read or confirmed written.
    raw: HashMap<RegisterHandle, Bytes>,
    /// Reads outstanding for the refresh in progress.
    refresh_pending: Option<usize>,
    /// Message slots in slot order, keyed by their register.
    messages: Vec<(RegisterHandle, Message)>,
    display_enabled: bool,
    brightness: u8,
    active_index: i8,
    generation: u64,
}

/// Keeps the local view of one badge in step with the device.
pub struct Synchronizer {
    max_brightness: u8,
    codec: CodecConfig,
    queue: Arc<OperationQueue>,
    state: Mutex<SyncState>,
    published: watch::Sender<Arc<Snapshot>>,
}

impl Synchronizer {
    pub fn new(config: &LinkConfig, queue: Arc<OperationQueue>) -> Self {
        let (published, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            max_brightness: config.max_brightness,
            codec: config.codec,
            queue,
            state: Mutex::new(SyncState::default()),
            published,
        }
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.published.subscribe()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.borrow().clone()
    }

    /// Copy of the local message list, including unsaved edits.
    pub fn messages(&self) -> Vec<Message> {
        self.lock()
            .messages
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refresh_pending.is_some()
    }

    /// Install the register handles found by discovery.
    pub fn attach(&self, registers: RegisterMap) {
        let mut state = self.lock();
        debug!(
            slots = registers.messages().len(),
            registers = registers.refresh_targets().len(),
            "registers attached"
        );
        state.registers = Some(registers);
    }

    /// Mark the link ready and read every register.
    ///
    /// Publishes immediately when there is nothing to read. Starting while a
    /// refresh is already running extends it: the snapshot is published once
    /// the reads of both rounds are in.
    pub fn begin_refresh(&self) {
        let targets = {
            let mut state = self.lock();
            let Some(registers) = &state.registers else {
                warn!("refresh requested before discovery, ignoring");
                return;
            };
            let targets = registers.refresh_targets().to_vec();
            state.online = true;
            if targets.is_empty() {
                self.publish(&mut state);
                return;
            }
            let outstanding = state.refresh_pending.unwrap_or(0);
            if outstanding > 0 {
                debug!(outstanding, "refresh already running, extending it");
            }
            state.refresh_pending = Some(outstanding + targets.len());
            targets
        };

        info!(registers = targets.len(), "refresh started");
        for handle in targets {
            self.queue.enqueue(Operation::Read(handle));
        }
    }

    /// Link lost or closed: stop issuing writes and drop any refresh in
    /// progress without publishing. Local edits stay dirty.
    pub fn suspend(&self) {
        let mut state = self.lock();
        state.online = false;
        if let Some(pending) = state.refresh_pending.take() {
            warn!(pending, "refresh aborted");
        }
    }

    /// Record a read completion.
    pub fn on_read(
        &self,
        handle: RegisterHandle,
        result: std::result::Result<Bytes, TransportError>,
    ) {
        let mut state = self.lock();
        match result {
            Ok(value) => {
                state.raw.insert(handle, value);
            }
            Err(err) => warn!(%handle, error = %err, "register read failed, keeping last value"),
        }

        let Some(pending) = state.refresh_pending.as_mut() else {
            debug!(%handle, "read completed outside a refresh");
            return;
        };
        *pending = pending.saturating_sub(1);
        debug!(%handle, pending = *pending, "refresh read completed");
        if *pending == 0 {
            state.refresh_pending = None;
            self.finish_refresh(&mut state);
        }
    }

    /// Record a successful write of `payload` to `handle`.
    pub fn confirm_write(&self, handle: RegisterHandle, payload: &Bytes) {
        let mut state = self.lock();
        state.raw.insert(handle, payload.clone());

        match handle.register() {
            Some(Register::DisplayEnabled) => {
                if let Some(&byte) = payload.first() {
                    state.display_enabled = byte == DISPLAY_ON;
                }
            }
            Some(Register::Brightness) => {
                if let Some(&byte) = payload.first() {
                    state.brightness = byte;
                }
            }
            Some(Register::ActiveIndex) => {
                if let Some(&byte) = payload.first() {
                    state.active_index = byte as i8;
                }
            }
            Some(Register::Message) => {
                let codec = self.codec;
                if let Some((_, message)) = state.messages.iter_mut().find(|(h, _)| *h == handle) {
                    match encode_message(message, &codec) {
                        Ok(frame) if frame == *payload => message.mark_clean(),
                        _ => debug!(%handle, "message edited while writing, still dirty"),
                    }
                }
            }
            Some(Register::DeviceName) => {
                info!(name = %String::from_utf8_lossy(payload), "device renamed");
                return;
            }
            None => return,
        }

        if state.refresh_pending.is_none() {
            self.publish(&mut state);
        }
    }

    /// Turn the display on or off.
    pub fn set_display_enabled(&self, enabled: bool) -> Result<()> {
        self.write_register(Register::DisplayEnabled, vec![u8::from(enabled)]);
        Ok(())
    }

    /// Set brightness, `0..=max_brightness`.
    pub fn set_brightness(&self, value: u8) -> Result<()> {
        if value > self.max_brightness {
            return Err(ValidationError::OutOfRange {
                field: "brightness",
                value: i64::from(value),
                min: 0,
                max: i64::from(self.max_brightness),
            }
            .into());
        }
        self.write_register(Register::Brightness, vec![value]);
        Ok(())
    }

    /// Select the message the badge shows, `0..=message count`.
    ///
    /// The count is the local message list, so slots that failed to decode
    /// do not widen the range.
    pub fn set_active_message(&self, index: i8) -> Result<()> {
        let count = self.lock().messages.len();
        if index < 0 || index as usize > count {
            return Err(ValidationError::OutOfRange {
                field: "active_message_index",
                value: i64::from(index),
                min: 0,
                max: count as i64,
            }
            .into());
        }
        self.write_register(Register::ActiveIndex, vec![index as u8]);
        Ok(())
    }

    /// Edit a message's text locally. Returns whether the message changed.
    pub fn set_message_text(&self, slot: usize, text: &str) -> Result<bool> {
        self.codec.validate_text(text)?;
        self.edit_message(slot, |message| message.set_text(text))
    }

    pub fn set_message_mode(&self, slot: usize, mode: MessageMode) -> Result<bool> {
        self.edit_message(slot, |message| message.set_mode(mode))
    }

    pub fn set_message_speed(&self, slot: usize, speed: MessageSpeed) -> Result<bool> {
        self.edit_message(slot, |message| message.set_speed(speed))
    }

    /// Write every dirty message to its slot. Returns how many writes were queued.
    pub fn save_dirty_messages(&self) -> Result<usize> {
        let writes = {
            let state = self.lock();
            if !state.online {
                warn!("link not ready, save skipped");
                return Ok(0);
            }
            state
                .messages
                .iter()
                .filter(|(_, message)| message.is_dirty())
                .map(|(handle, message)| {
                    encode_message(message, &self.codec).map(|frame| (*handle, frame))
                })
                .collect::<std::result::Result<Vec<_>, ValidationError>>()?
        };

        debug!(count = writes.len(), "saving dirty messages");
        let count = writes.len();
        for (handle, frame) in writes {
            self.queue.enqueue(Operation::Write(handle, frame));
        }
        Ok(count)
    }

    /// Write raw name bytes to the Device Name register.
    pub fn rename_device(&self, name: &str) -> Result<()> {
        self.write_register(Register::DeviceName, name.as_bytes().to_vec());
        Ok(())
    }

    fn write_register(&self, register: Register, payload: Vec<u8>) {
        let handle = {
            let state = self.lock();
            if !state.online {
                warn!(register = register.name(), "link not ready, write skipped");
                return;
            }
            state
                .registers
                .as_ref()
                .and_then(|registers| registers.handle(register))
        };

        match handle {
            Some(handle) => self.queue.enqueue(Operation::Write(handle, Bytes::from(payload))),
            None => warn!(register = register.name(), "device does not expose register"),
        }
    }

    fn edit_message(&self, slot: usize, edit: impl FnOnce(&mut Message) -> bool) -> Result<bool> {
        let mut state = self.lock();
        let count = state.messages.len();
        let (_, message) = state
            .messages
            .get_mut(slot)
            .ok_or(ValidationError::UnknownSlot { slot, count })?;
        Ok(edit(message))
    }

    fn finish_refresh(&self, state: &mut SyncState) {
        let Some(registers) = state.registers.as_ref() else {
            return;
        };

        let first_byte = |register: Register| {
            registers
                .handle(register)
                .and_then(|handle| state.raw.get(&handle))
                .and_then(|value| value.first().copied())
        };
        let display = first_byte(Register::DisplayEnabled);
        let brightness = first_byte(Register::Brightness);
        let active = first_byte(Register::ActiveIndex);

        let mut messages = Vec::with_capacity(registers.messages().len());
        for handle in registers.messages() {
            let local = state.messages.iter().find(|(h, _)| h == handle);
            if let Some((_, message)) = local.filter(|(_, message)| message.is_dirty()) {
                messages.push((*handle, message.clone()));
                continue;
            }
            let Some(raw) = state.raw.get(handle) else {
                debug!(%handle, "no value for message slot");
                continue;
            };
            match decode_message(raw, &self.codec) {
                Ok(message) => messages.push((*handle, message)),
                Err(err) => warn!(%handle, error = %err, "message failed to decode, excluded"),
            }
        }

        if let Some(byte) = display {
            state.display_enabled = byte == DISPLAY_ON;
        }
        if let Some(byte) = brightness {
            state.brightness = byte;
        }
        if let Some(byte) = active {
            state.active_index = byte as i8;
        }
        state.messages = messages;

        self.publish(state);
        info!(
            generation = state.generation,
            messages = state.messages.len(),
            "refresh complete"
        );
    }

    fn publish(&self, state: &mut SyncState) {
        state.generation += 1;
        let snapshot = Snapshot {
            generation: state.generation,
            display_enabled: state.display_enabled,
            brightness: state.brightness,
            active_message_index: state.active_index,
            messages: state
                .messages
                .iter()
                .map(|(_, message)| message.clone())
                .collect(),
        };
        self.published.send_replace(Arc::new(snapshot));
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
