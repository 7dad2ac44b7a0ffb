//! GATT transport boundary for ACDC badges.
//!
//! The platform BLE stack permits one outstanding read or write at a time and
//! reports every completion asynchronously. This crate models that boundary:
//! - [`GattTransport`]: fire-and-forget requests (bond, link, discover, read, write)
//! - [`TransportEvent`]: completions and state changes, delivered over a channel
//! - [`register`]: the static identifier table for the badge's registers
//!
//! This is the lowest layer of badgelink. [`SimulatedBadge`] is an in-memory
//! implementation used by tests and the CLI.

pub mod error;
pub mod register;
pub mod sim;
pub mod traits;

pub use error::{Result, TransportError};
pub use register::{
    DiscoveredService, Register, RegisterHandle, ACTIVE_INDEX, BADGE_SERVICE, BRIGHTNESS,
    DEVICE_NAME, DISPLAY_ON_OFF, GENERIC_ACCESS_SERVICE, MESSAGE,
};
pub use sim::{CompletionMode, SimulatedBadge};
pub use traits::{
    event_channel, BondState, EventReceiver, EventSender, GattTransport, Operation, OperationKind,
    TransportEvent,
};
