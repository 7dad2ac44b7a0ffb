//! Client library for ACDC conference badges over BLE GATT.
//!
//! badgelink keeps one badge connection in a consistent state: it frames
//! message slots, serialises register operations against a one-at-a-time
//! transport, and publishes atomic snapshots of the badge's registers.
//!
//! # Crate Structure
//!
//! - [`transport`]: GATT transport boundary, register table, simulated badge
//! - [`frame`]: Message slot codec
//! - [`device`]: Operation queue, synchronizer, connection state machine (behind `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use badgelink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use badgelink_frame::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use badgelink_device::*;
}
