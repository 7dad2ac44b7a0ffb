//! Single-link badge management.
//!
//! This is the "just works" layer. Connect to a badge, keep a consistent
//! snapshot of its registers, and push edits back through a one-at-a-time
//! operation queue:
//! - [`OperationQueue`]: FIFO in front of a single-operation transport
//! - [`Synchronizer`]: multi-register refresh and confirmed writes
//! - [`ConnectionMachine`]: bonding, link, discovery and reconnection
//! - [`BadgeLink`]: the three wired together behind `&self` methods

pub mod config;
pub mod connection;
pub mod error;
pub mod link;
pub mod pump;
pub mod queue;
pub mod registers;
pub mod snapshot;
pub mod sync;

pub use config::{LinkConfig, ScanTiming, DEFAULT_MAX_BRIGHTNESS};
pub use connection::{ConnectionMachine, Effect, Input, LinkState};
pub use error::{LinkError, Result};
pub use link::{BadgeLink, LinkNotice, WRITE_FAILED_NOTICE};
pub use pump::EventPump;
pub use queue::OperationQueue;
pub use registers::RegisterMap;
pub use snapshot::Snapshot;
pub use sync::Synchronizer;
