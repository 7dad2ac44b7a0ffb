use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::register::{DiscoveredService, RegisterHandle};

/// Platform bonding state for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondState {
    None,
    Bonding,
    Bonded,
}

/// Read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

/// A single register operation waiting for, or holding, the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Read(RegisterHandle),
    Write(RegisterHandle, Bytes),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Read(_) => OperationKind::Read,
            Operation::Write(..) => OperationKind::Write,
        }
    }

    pub fn handle(&self) -> &RegisterHandle {
        match self {
            Operation::Read(handle) | Operation::Write(handle, _) => handle,
        }
    }

    /// The completion event reporting this operation as failed.
    pub fn failed(&self, err: TransportError) -> TransportEvent {
        match self {
            Operation::Read(handle) => TransportEvent::ReadComplete {
                handle: *handle,
                result: Err(err),
            },
            Operation::Write(handle, _) => TransportEvent::WriteComplete {
                handle: *handle,
                result: Err(err),
            },
        }
    }
}

/// Everything the platform stack reports back, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The platform's bonding state for this device changed.
    BondStateChanged(BondState),
    /// The link came up.
    LinkUp,
    /// The link went down.
    LinkDown,
    /// Service enumeration finished.
    ServicesDiscovered(Result<Vec<DiscoveredService>>),
    /// A read finished.
    ReadComplete {
        handle: RegisterHandle,
        result: Result<Bytes>,
    },
    /// A write finished.
    WriteComplete {
        handle: RegisterHandle,
        result: Result<()>,
    },
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create the channel that carries [`TransportEvent`]s from the transport to the link.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Requests against a single GATT peer.
///
/// Every method only *starts* work. An `Err` means the stack refused to start;
/// otherwise the outcome arrives later as a [`TransportEvent`]. Implementations
/// must not block on the outcome and must not call back into the caller.
pub trait GattTransport: Send + Sync {
    /// Stable hardware address of the peer.
    fn address(&self) -> &str;

    /// Current platform bonding state.
    fn bond_state(&self) -> BondState;

    /// Whether the platform already holds a live link to the peer.
    fn is_link_up(&self) -> bool;

    /// Ask the platform to bond. Completion arrives as `BondStateChanged`.
    fn request_bond(&self) -> Result<()>;

    /// Ask for a link. Completion arrives as `LinkUp`.
    fn request_link(&self) -> Result<()>;

    /// Enumerate services. Completion arrives as `ServicesDiscovered`.
    fn discover(&self) -> Result<()>;

    /// Start reading a register.
    fn read(&self, handle: &RegisterHandle) -> Result<()>;

    /// Start writing a register.
    fn write(&self, handle: &RegisterHandle, value: &[u8]) -> Result<()>;

    /// Release the link and every platform resource. Must tolerate repeat calls.
    fn close(&self);

    /// Start `op` on the transport.
    fn dispatch(&self, op: &Operation) -> Result<()> {
        match op {
            Operation::Read(handle) => self.read(handle),
            Operation::Write(handle, value) => self.write(handle, value),
        }
    }
}
