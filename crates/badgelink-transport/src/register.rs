//! Static register table.
//!
//! The badge exposes its state as GATT characteristics under one vendor
//! service. The mapping from identifier to semantic register is fixed at
//! compile time; only the per-device handles are learned at discovery.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Badge vendor service.
pub const BADGE_SERVICE: Uuid = Uuid::from_u128(0x00004141_e87e_4706_acf7_8c633c19c4d5);

/// Display on/off flag (1 byte).
pub const DISPLAY_ON_OFF: Uuid = Uuid::from_u128(0x00004242_e87e_4706_acf7_8c633c19c4d5);

/// Active message index (signed byte).
pub const ACTIVE_INDEX: Uuid = Uuid::from_u128(0x00004343_e87e_4706_acf7_8c633c19c4d5);

/// Display brightness (1 byte).
pub const BRIGHTNESS: Uuid = Uuid::from_u128(0x00004444_e87e_4706_acf7_8c633c19c4d5);

/// Message slot. Every slot shares this identifier.
pub const MESSAGE: Uuid = Uuid::from_u128(0x00004545_e87e_4706_acf7_8c633c19c4d5);

/// Bluetooth SIG Generic Access service (0x1800).
pub const GENERIC_ACCESS_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);

/// Bluetooth SIG Device Name characteristic (0x2A00).
pub const DEVICE_NAME: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);

/// Semantic meaning of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Register {
    DisplayEnabled,
    ActiveIndex,
    Brightness,
    Message,
    DeviceName,
}

const REGISTER_TABLE: [(Uuid, Register); 5] = [
    (DISPLAY_ON_OFF, Register::DisplayEnabled),
    (ACTIVE_INDEX, Register::ActiveIndex),
    (BRIGHTNESS, Register::Brightness),
    (MESSAGE, Register::Message),
    (DEVICE_NAME, Register::DeviceName),
];

impl Register {
    /// Look up the semantic register for a characteristic identifier.
    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        REGISTER_TABLE
            .iter()
            .find(|(id, _)| id == uuid)
            .map(|(_, register)| *register)
    }

    /// Characteristic identifier for this register.
    pub fn uuid(self) -> Uuid {
        match self {
            Register::DisplayEnabled => DISPLAY_ON_OFF,
            Register::ActiveIndex => ACTIVE_INDEX,
            Register::Brightness => BRIGHTNESS,
            Register::Message => MESSAGE,
            Register::DeviceName => DEVICE_NAME,
        }
    }

    /// Human-readable register name.
    pub fn name(self) -> &'static str {
        match self {
            Register::DisplayEnabled => "display",
            Register::ActiveIndex => "active_index",
            Register::Brightness => "brightness",
            Register::Message => "message",
            Register::DeviceName => "device_name",
        }
    }
}

/// One concrete characteristic on one device.
///
/// Several characteristics may share an identifier (message slots), so the
/// stack-assigned `instance` disambiguates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegisterHandle {
    pub uuid: Uuid,
    pub instance: u16,
}

impl RegisterHandle {
    pub const fn new(uuid: Uuid, instance: u16) -> Self {
        Self { uuid, instance }
    }

    /// Semantic register, if the identifier is in the static table.
    pub fn register(&self) -> Option<Register> {
        Register::from_uuid(&self.uuid)
    }
}

impl fmt::Display for RegisterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.register() {
            Some(register) => write!(f, "{}#{}", register.name(), self.instance),
            None => write!(f, "{}#{}", self.uuid, self.instance),
        }
    }
}

/// A GATT service as reported by discovery, with its characteristics in
/// the order the stack enumerated them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub uuid: Uuid,
    pub registers: Vec<RegisterHandle>,
}
