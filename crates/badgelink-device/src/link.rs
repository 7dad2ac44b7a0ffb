use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use badgelink_frame::{Message, MessageMode, MessageSpeed};
use badgelink_transport::{
    BondState, EventSender, GattTransport, Operation, OperationKind, RegisterHandle,
    TransportError, TransportEvent,
};
use bytes::Bytes;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::connection::{ConnectionMachine, Effect, Input, LinkState};
use crate::error::Result;
use crate::queue::OperationQueue;
use crate::registers::RegisterMap;
use crate::snapshot::Snapshot;
use crate::sync::Synchronizer;

/// Error notice sent when the device rejects a write.
pub const WRITE_FAILED_NOTICE: &str = "failed to write changes to device";

/// Out-of-band notification for subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkNotice {
    StateChanged { from: LinkState, to: LinkState },
    Error(String),
}

/// One managed badge connection.
///
/// Owns the connection state machine, the operation queue and the
/// synchronizer for a single device. Every method takes `&self`; share the
/// link behind an `Arc`. Transport events must be fed back through
/// [`BadgeLink::handle_event`], usually by an [`crate::EventPump`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use badgelink_device::{BadgeLink, EventPump, LinkConfig};
/// use badgelink_transport::{event_channel, CompletionMode, SimulatedBadge};
///
/// let (tx, rx) = event_channel();
/// let badge = Arc::new(
///     SimulatedBadge::new("C0:FF:EE:00:00:01", tx.clone())
///         .with_completion_mode(CompletionMode::Auto),
/// );
/// let link = Arc::new(BadgeLink::new(badge, tx, LinkConfig::default()));
/// let mut pump = EventPump::new(link.clone(), rx);
///
/// link.connect();
/// pump.drain();
/// link.set_brightness(12).unwrap();
/// pump.drain();
/// assert_eq!(link.snapshot().brightness, 12);
/// ```
pub struct BadgeLink {
    transport: Arc<dyn GattTransport>,
    events: EventSender,
    config: LinkConfig,
    machine: Mutex<ConnectionMachine>,
    queue: Arc<OperationQueue>,
    sync: Synchronizer,
    notices: broadcast::Sender<LinkNotice>,
}

impl BadgeLink {
    /// Create a disconnected link. `events` must feed the receiver that is
    /// pumped into [`BadgeLink::handle_event`].
    pub fn new(transport: Arc<dyn GattTransport>, events: EventSender, config: LinkConfig) -> Self {
        let queue = Arc::new(OperationQueue::new(transport.clone(), events.clone()));
        let sync = Synchronizer::new(&config, queue.clone());
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        Self {
            transport,
            events,
            config,
            machine: Mutex::new(ConnectionMachine::new()),
            queue,
            sync,
            notices,
        }
    }

    pub fn address(&self) -> &str {
        self.transport.address()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn state(&self) -> LinkState {
        self.machine().state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LinkState::Ready
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.sync.snapshot()
    }

    /// Receiver that is notified on every snapshot publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.sync.subscribe()
    }

    /// Receiver for state changes and error strings.
    pub fn notices(&self) -> broadcast::Receiver<LinkNotice> {
        self.notices.subscribe()
    }

    /// Copy of the local message list, including unsaved edits.
    pub fn messages(&self) -> Vec<Message> {
        self.sync.messages()
    }

    /// Operations waiting behind the one in flight.
    pub fn queued_operations(&self) -> usize {
        self.queue.pending()
    }

    /// Start bonding, linking and discovery as needed.
    pub fn connect(&self) {
        let input = Input::Connect {
            bonded: self.transport.bond_state() == BondState::Bonded,
            link_up: self.transport.is_link_up(),
        };
        info!(address = %self.address(), "connecting");
        self.drive(input);
    }

    /// Release the link. Safe to call repeatedly.
    pub fn close(&self) {
        self.drive(Input::Close);
    }

    /// Apply one transport event.
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::BondStateChanged(bond) => self.drive(Input::BondChanged(bond)),
            TransportEvent::LinkUp => self.drive(Input::LinkUp),
            TransportEvent::LinkDown => {
                warn!(address = %self.address(), "link lost");
                self.drive(Input::LinkDown);
            }
            TransportEvent::ServicesDiscovered(result) => {
                let outcome = result.and_then(|services| RegisterMap::from_services(&services));
                let outcome = outcome.map(|registers| self.sync.attach(registers));
                self.drive(Input::Discovered(outcome));
            }
            TransportEvent::ReadComplete { handle, result } => {
                if self.queue.complete(&handle, OperationKind::Read).is_some() {
                    self.sync.on_read(handle, result);
                }
            }
            TransportEvent::WriteComplete { handle, result } => {
                if let Some(Operation::Write(_, payload)) =
                    self.queue.complete(&handle, OperationKind::Write)
                {
                    self.settle_write(handle, &payload, result);
                }
            }
        }
    }

    /// Fail the in-flight operation if it has outlived the configured
    /// deadline. Returns whether an operation was expired.
    pub fn expire_stalled(&self) -> bool {
        let Some(timeout) = self.config.operation_timeout() else {
            return false;
        };
        let Some(op) = self.queue.expire_overdue(timeout) else {
            return false;
        };

        warn!(handle = %op.handle(), ?timeout, "operation timed out");
        let err = TransportError::TimedOut(timeout);
        match op {
            Operation::Read(handle) => self.sync.on_read(handle, Err(err)),
            Operation::Write(handle, payload) => self.settle_write(handle, &payload, Err(err)),
        }
        true
    }

    pub fn set_display_enabled(&self, enabled: bool) -> Result<()> {
        self.sync.set_display_enabled(enabled)
    }

    pub fn set_brightness(&self, value: u8) -> Result<()> {
        self.sync.set_brightness(value)
    }

    pub fn set_active_message(&self, index: i8) -> Result<()> {
        self.sync.set_active_message(index)
    }

    pub fn set_message_text(&self, slot: usize, text: &str) -> Result<bool> {
        self.sync.set_message_text(slot, text)
    }

    pub fn set_message_mode(&self, slot: usize, mode: MessageMode) -> Result<bool> {
        self.sync.set_message_mode(slot, mode)
    }

    pub fn set_message_speed(&self, slot: usize, speed: MessageSpeed) -> Result<bool> {
        self.sync.set_message_speed(slot, speed)
    }

    /// Write every edited message. Returns how many writes were queued.
    pub fn save_dirty_messages(&self) -> Result<usize> {
        self.sync.save_dirty_messages()
    }

    /// Rename the badge. Does nothing unless the link is ready.
    pub fn rename_device(&self, name: &str) -> Result<()> {
        let state = self.state();
        if state != LinkState::Ready {
            error!(%state, "cannot rename device, link not ready");
            self.notify(LinkNotice::Error(
                "cannot rename device while disconnected".to_string(),
            ));
            return Ok(());
        }
        self.sync.rename_device(name)
    }

    /// Start a full refresh by hand. Ignored unless the link is ready.
    pub fn refresh(&self) {
        if self.is_ready() {
            self.sync.begin_refresh();
        } else {
            debug!(state = %self.state(), "refresh ignored, link not ready");
        }
    }

    fn settle_write(
        &self,
        handle: RegisterHandle,
        payload: &Bytes,
        result: std::result::Result<(), TransportError>,
    ) {
        match result {
            Ok(()) => self.sync.confirm_write(handle, payload),
            Err(err) => {
                warn!(%handle, error = %err, "register write failed");
                self.notify(LinkNotice::Error(WRITE_FAILED_NOTICE.to_string()));
            }
        }
    }

    fn drive(&self, input: Input) {
        let effects = self.machine().handle(input);
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&self, effect: Effect) {
        match effect {
            Effect::Transition { from, to } => {
                info!(address = %self.address(), %from, %to, "link state changed");
                self.notify(LinkNotice::StateChanged { from, to });
            }
            Effect::RequestBond => self.request(self.transport.request_bond()),
            Effect::RequestLink => self.request(self.transport.request_link()),
            Effect::Discover => self.request(self.transport.discover()),
            Effect::StartRefresh => self.sync.begin_refresh(),
            Effect::AbortOperations => {
                self.sync.suspend();
                self.queue.reset();
            }
            Effect::Release => self.transport.close(),
            Effect::RetryLink => {
                // Retried from the event loop, never recursively.
                if self.events.send(TransportEvent::LinkDown).is_err() {
                    debug!(address = %self.address(), "event receiver dropped, relink not scheduled");
                }
            }
            Effect::Notify(message) => self.notify(LinkNotice::Error(message)),
        }
    }

    fn request(&self, outcome: std::result::Result<(), TransportError>) {
        if let Err(err) = outcome {
            self.drive(Input::RequestFailed(err));
        }
    }

    fn notify(&self, notice: LinkNotice) {
        // No subscribers is not an error.
        let _ = self.notices.send(notice);
    }

    fn machine(&self) -> MutexGuard<'_, ConnectionMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BadgeLink {
    fn drop(&mut self) {
        self.close();
    }
}
