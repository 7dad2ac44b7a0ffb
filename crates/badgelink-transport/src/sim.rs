use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::register::{
    DiscoveredService, Register, RegisterHandle, ACTIVE_INDEX, BADGE_SERVICE, BRIGHTNESS,
    DEVICE_NAME, DISPLAY_ON_OFF, GENERIC_ACCESS_SERVICE, MESSAGE,
};
use crate::traits::{BondState, EventSender, GattTransport, Operation, TransportEvent};

/// How the simulated badge finishes register operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Operations stay outstanding until `complete_next` or `fail_next`.
    Manual,
    /// Operations complete as soon as they are dispatched.
    Auto,
}

/// In-memory badge implementing [`GattTransport`].
///
/// Mirrors the firmware's register layout: on/off, active index, brightness
/// and a run of message slots under the badge service, plus the device name
/// under Generic Access. Link-level requests (bond, link, discovery) answer
/// immediately; register operations follow the [`CompletionMode`].
pub struct SimulatedBadge {
    address: String,
    events: EventSender,
    state: Mutex<SimState>,
}

struct SimState {
    mode: CompletionMode,
    bond: BondState,
    auto_bond: bool,
    link_up: bool,
    closed: bool,
    services: Vec<DiscoveredService>,
    values: BTreeMap<RegisterHandle, Bytes>,
    outstanding: VecDeque<Operation>,
    log: Vec<Operation>,
    refuse_dispatches: usize,
    refuse_links: usize,
}

impl SimulatedBadge {
    /// Message slots on a stock badge.
    pub const DEFAULT_MESSAGE_SLOTS: usize = 4;
    /// Name a stock badge advertises.
    pub const DEFAULT_NAME: &'static str = "ACDC Badge";

    /// A bonded badge with the stock layout, in manual completion mode.
    pub fn new(address: impl Into<String>, events: EventSender) -> Self {
        let mut state = SimState {
            mode: CompletionMode::Manual,
            bond: BondState::Bonded,
            auto_bond: true,
            link_up: false,
            closed: false,
            services: Vec::new(),
            values: BTreeMap::new(),
            outstanding: VecDeque::new(),
            log: Vec::new(),
            refuse_dispatches: 0,
            refuse_links: 0,
        };
        state.install_layout(Self::DEFAULT_MESSAGE_SLOTS);

        Self {
            address: address.into(),
            events,
            state: Mutex::new(state),
        }
    }

    /// Rebuild the layout with `slots` message slots.
    pub fn with_message_slots(self, slots: usize) -> Self {
        self.lock().install_layout(slots);
        self
    }

    /// Select how register operations complete.
    pub fn with_completion_mode(self, mode: CompletionMode) -> Self {
        self.lock().mode = mode;
        self
    }

    /// Start unbonded. When `auto_bond` is false, bonding waits for
    /// [`SimulatedBadge::finish_bonding`].
    pub fn unbonded(self, auto_bond: bool) -> Self {
        {
            let mut state = self.lock();
            state.bond = BondState::None;
            state.auto_bond = auto_bond;
        }
        self
    }

    /// Start with the platform already holding a live link.
    pub fn with_link_up(self) -> Self {
        self.lock().link_up = true;
        self
    }

    /// Drop the badge service from discovery results (an unsupported device).
    pub fn without_badge_service(self) -> Self {
        self.lock()
            .services
            .retain(|service| service.uuid != BADGE_SERVICE);
        self
    }

    /// Handle for a semantic register. Message slots use [`SimulatedBadge::message_handle`].
    pub fn handle(&self, register: Register) -> Option<RegisterHandle> {
        self.lock()
            .all_handles()
            .find(|handle| handle.register() == Some(register))
    }

    /// Handle for message slot `slot`.
    pub fn message_handle(&self, slot: usize) -> Option<RegisterHandle> {
        self.lock()
            .all_handles()
            .filter(|handle| handle.uuid == MESSAGE)
            .nth(slot)
    }

    /// Current device-side value of a register.
    pub fn value(&self, handle: &RegisterHandle) -> Option<Bytes> {
        self.lock().values.get(handle).cloned()
    }

    /// Overwrite a device-side value, as if the badge changed it locally.
    pub fn set_value(&self, handle: RegisterHandle, value: impl Into<Bytes>) {
        self.lock().values.insert(handle, value.into());
    }

    /// Every operation the transport accepted, in dispatch order.
    pub fn dispatched(&self) -> Vec<Operation> {
        self.lock().log.clone()
    }

    /// Operations accepted but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding.len()
    }

    /// Refuse the next `count` register dispatches.
    pub fn refuse_next_dispatches(&self, count: usize) {
        self.lock().refuse_dispatches = count;
    }

    /// Refuse the next `count` link requests, as a busy stack would.
    pub fn refuse_next_links(&self, count: usize) {
        self.lock().refuse_links = count;
    }

    /// Complete the oldest outstanding operation successfully.
    pub fn complete_next(&self) -> Option<Operation> {
        let (op, event) = {
            let mut state = self.lock();
            let op = state.outstanding.pop_front()?;
            let event = state.apply(&op);
            (op, event)
        };
        self.emit(event);
        Some(op)
    }

    /// Complete the oldest outstanding operation with GATT `status`.
    pub fn fail_next(&self, status: u8) -> Option<Operation> {
        let op = self.lock().outstanding.pop_front()?;
        self.emit(op.failed(TransportError::Gatt { status }));
        Some(op)
    }

    /// Complete outstanding operations until none remain. Returns how many finished.
    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next().is_some() {
            completed += 1;
        }
        completed
    }

    /// Drop the link unexpectedly. Outstanding operations are lost.
    pub fn drop_link(&self) {
        {
            let mut state = self.lock();
            state.link_up = false;
            state.outstanding.clear();
        }
        info!(address = %self.address, "simulated link dropped");
        self.emit(TransportEvent::LinkDown);
    }

    /// Finish a pending bond request.
    pub fn finish_bonding(&self) {
        self.lock().bond = BondState::Bonded;
        self.emit(TransportEvent::BondStateChanged(BondState::Bonded));
    }

    /// Reject a pending bond request.
    pub fn reject_bonding(&self) {
        self.lock().bond = BondState::None;
        self.emit(TransportEvent::BondStateChanged(BondState::None));
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!(address = %self.address, "event receiver dropped");
        }
    }
}

impl SimState {
    fn install_layout(&mut self, slots: usize) {
        let mut instance = 0u16;
        let mut next = |uuid| {
            instance += 1;
            RegisterHandle::new(uuid, instance)
        };

        let display = next(DISPLAY_ON_OFF);
        let index = next(ACTIVE_INDEX);
        let brightness = next(BRIGHTNESS);
        let messages: Vec<RegisterHandle> = (0..slots).map(|_| next(MESSAGE)).collect();
        let name = next(DEVICE_NAME);

        self.values.clear();
        self.values.insert(display, Bytes::from_static(&[1]));
        self.values.insert(index, Bytes::from_static(&[0]));
        self.values.insert(brightness, Bytes::from_static(&[8]));
        for (slot, handle) in messages.iter().enumerate() {
            self.values
                .insert(*handle, stock_message(&format!("MESSAGE {slot}")));
        }
        self.values.insert(
            name,
            Bytes::from_static(SimulatedBadge::DEFAULT_NAME.as_bytes()),
        );

        let mut badge_registers = vec![display, index, brightness];
        badge_registers.extend(messages);
        self.services = vec![
            DiscoveredService {
                uuid: GENERIC_ACCESS_SERVICE,
                registers: vec![name],
            },
            DiscoveredService {
                uuid: BADGE_SERVICE,
                registers: badge_registers,
            },
        ];
    }

    fn all_handles(&self) -> impl Iterator<Item = RegisterHandle> + '_ {
        self.services
            .iter()
            .flat_map(|service| service.registers.iter().copied())
    }

    fn apply(&mut self, op: &Operation) -> TransportEvent {
        match op {
            Operation::Read(handle) => TransportEvent::ReadComplete {
                handle: *handle,
                result: Ok(self.values.get(handle).cloned().unwrap_or_default()),
            },
            Operation::Write(handle, value) => {
                self.values.insert(*handle, value.clone());
                TransportEvent::WriteComplete {
                    handle: *handle,
                    result: Ok(()),
                }
            }
        }
    }
}

/// Raw stock message: scroll mode, medium speed (16 ticks).
fn stock_message(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 4);
    buf.put_u8(1);
    buf.put_u16_le(16);
    buf.put_slice(text.as_bytes());
    buf.put_u8(0);
    buf.freeze()
}

impl GattTransport for SimulatedBadge {
    fn address(&self) -> &str {
        &self.address
    }

    fn bond_state(&self) -> BondState {
        self.lock().bond
    }

    fn is_link_up(&self) -> bool {
        self.lock().link_up
    }

    fn request_bond(&self) -> Result<()> {
        let auto_bond = {
            let mut state = self.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.bond = BondState::Bonding;
            state.auto_bond
        };
        self.emit(TransportEvent::BondStateChanged(BondState::Bonding));
        if auto_bond {
            self.finish_bonding();
        }
        Ok(())
    }

    fn request_link(&self) -> Result<()> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            if state.refuse_links > 0 {
                state.refuse_links -= 1;
                return Err(TransportError::DispatchFailed("stack busy".to_string()));
            }
            state.link_up = true;
        }
        debug!(address = %self.address, "simulated link up");
        self.emit(TransportEvent::LinkUp);
        Ok(())
    }

    fn discover(&self) -> Result<()> {
        let services = {
            let state = self.lock();
            if !state.link_up {
                return Err(TransportError::DispatchFailed("link is down".to_string()));
            }
            state.services.clone()
        };
        self.emit(TransportEvent::ServicesDiscovered(Ok(services)));
        Ok(())
    }

    fn read(&self, handle: &RegisterHandle) -> Result<()> {
        self.dispatch_register_op(Operation::Read(*handle))
    }

    fn write(&self, handle: &RegisterHandle, value: &[u8]) -> Result<()> {
        self.dispatch_register_op(Operation::Write(*handle, Bytes::copy_from_slice(value)))
    }

    fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.link_up = false;
        state.outstanding.clear();
        info!(address = %self.address, "simulated transport closed");
    }
}

impl SimulatedBadge {
    fn dispatch_register_op(&self, op: Operation) -> Result<()> {
        let event = {
            let mut state = self.lock();
            if state.refuse_dispatches > 0 {
                state.refuse_dispatches -= 1;
                return Err(TransportError::DispatchFailed(format!(
                    "stack refused {}",
                    op.handle()
                )));
            }
            if !state.link_up {
                return Err(TransportError::DispatchFailed("link is down".to_string()));
            }
            state.log.push(op.clone());
            match state.mode {
                CompletionMode::Auto => Some(state.apply(&op)),
                CompletionMode::Manual => {
                    state.outstanding.push_back(op);
                    None
                }
            }
        };
        if let Some(event) = event {
            self.emit(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::event_channel;

    #[test]
    fn stock_layout_discovers_both_services() {
        let (tx, mut rx) = event_channel();
        let badge = SimulatedBadge::new("AA:BB:CC:DD:EE:FF", tx).with_link_up();

        badge.discover().unwrap();
        let event = rx.try_recv().unwrap();
        let TransportEvent::ServicesDiscovered(Ok(services)) = event else {
            panic!("unexpected event: {event:?}");
        };

        let badge_service = services.iter().find(|s| s.uuid == BADGE_SERVICE).unwrap();
        assert_eq!(
            badge_service.registers.len(),
            3 + SimulatedBadge::DEFAULT_MESSAGE_SLOTS
        );
        assert!(services.iter().any(|s| s.uuid == GENERIC_ACCESS_SERVICE));
    }

    #[test]
    fn manual_mode_holds_operations_until_completed() {
        let (tx, mut rx) = event_channel();
        let badge = SimulatedBadge::new("sim", tx).with_link_up();
        let brightness = badge.handle(Register::Brightness).unwrap();

        badge.read(&brightness).unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(badge.outstanding(), 1);

        badge.complete_next();
        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::ReadComplete {
                handle: brightness,
                result: Ok(Bytes::from_static(&[8])),
            }
        );
    }

    #[test]
    fn auto_mode_applies_writes() {
        let (tx, mut rx) = event_channel();
        let badge = SimulatedBadge::new("sim", tx)
            .with_completion_mode(CompletionMode::Auto)
            .with_link_up();
        let brightness = badge.handle(Register::Brightness).unwrap();

        badge.write(&brightness, &[3]).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            TransportEvent::WriteComplete { result: Ok(()), .. }
        ));
        assert_eq!(badge.value(&brightness).unwrap().as_ref(), &[3]);
    }

    #[test]
    fn refused_dispatch_is_not_logged() {
        let (tx, _rx) = event_channel();
        let badge = SimulatedBadge::new("sim", tx).with_link_up();
        let display = badge.handle(Register::DisplayEnabled).unwrap();

        badge.refuse_next_dispatches(1);
        assert!(matches!(
            badge.read(&display),
            Err(TransportError::DispatchFailed(_))
        ));
        assert!(badge.dispatched().is_empty());
        assert!(badge.read(&display).is_ok());
    }

    #[test]
    fn dispatch_requires_link() {
        let (tx, _rx) = event_channel();
        let badge = SimulatedBadge::new("sim", tx);
        let display = badge.handle(Register::DisplayEnabled).unwrap();
        assert!(badge.read(&display).is_err());
    }

    #[test]
    fn close_is_idempotent_and_blocks_relink() {
        let (tx, _rx) = event_channel();
        let badge = SimulatedBadge::new("sim", tx).with_link_up();
        badge.close();
        badge.close();
        assert!(!badge.is_link_up());
        assert_eq!(badge.request_link(), Err(TransportError::Closed));
    }

    #[test]
    fn refused_links_count_down() {
        let (tx, mut rx) = event_channel();
        let badge = SimulatedBadge::new("sim", tx);
        badge.refuse_next_links(1);

        assert!(matches!(
            badge.request_link(),
            Err(TransportError::DispatchFailed(_))
        ));
        assert!(!badge.is_link_up());
        badge.request_link().unwrap();
        assert_eq!(rx.try_recv().unwrap(), TransportEvent::LinkUp);
    }

    #[test]
    fn manual_bonding_waits_for_finish() {
        let (tx, mut rx) = event_channel();
        let badge = SimulatedBadge::new("sim", tx).unbonded(false);

        badge.request_bond().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::BondStateChanged(BondState::Bonding)
        );
        assert!(rx.try_recv().is_err());

        badge.finish_bonding();
        assert_eq!(badge.bond_state(), BondState::Bonded);
        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::BondStateChanged(BondState::Bonded)
        );
    }

    #[test]
    fn message_handles_follow_discovery_order() {
        let (tx, _rx) = event_channel();
        let badge = SimulatedBadge::new("sim", tx).with_message_slots(2);
        let first = badge.message_handle(0).unwrap();
        let second = badge.message_handle(1).unwrap();
        assert!(first.instance < second.instance);
        assert!(badge.message_handle(2).is_none());
        assert_eq!(
            badge.value(&first).unwrap().as_ref(),
            b"\x01\x10\x00MESSAGE 0\x00"
        );
    }
}
