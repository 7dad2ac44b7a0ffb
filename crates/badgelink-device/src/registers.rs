use badgelink_transport::{
    DiscoveredService, Register, RegisterHandle, TransportError, BADGE_SERVICE,
    GENERIC_ACCESS_SERVICE,
};
use tracing::debug;

/// Per-device handles for every semantic register, resolved once after discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    display: Option<RegisterHandle>,
    active_index: Option<RegisterHandle>,
    brightness: Option<RegisterHandle>,
    device_name: Option<RegisterHandle>,
    messages: Vec<RegisterHandle>,
    refresh_targets: Vec<RegisterHandle>,
}

impl RegisterMap {
    /// Resolve handles from discovery results.
    ///
    /// Fails with [`TransportError::ServiceMissing`] when the badge service is
    /// absent. Every badge-service characteristic becomes a refresh target;
    /// message slots keep discovery order.
    pub fn from_services(services: &[DiscoveredService]) -> Result<Self, TransportError> {
        let badge = services
            .iter()
            .find(|service| service.uuid == BADGE_SERVICE)
            .ok_or(TransportError::ServiceMissing(BADGE_SERVICE))?;

        let mut map = Self {
            display: None,
            active_index: None,
            brightness: None,
            device_name: None,
            messages: Vec::new(),
            refresh_targets: badge.registers.clone(),
        };

        for handle in &badge.registers {
            match handle.register() {
                Some(Register::DisplayEnabled) => map.display = Some(*handle),
                Some(Register::ActiveIndex) => map.active_index = Some(*handle),
                Some(Register::Brightness) => map.brightness = Some(*handle),
                Some(Register::Message) => map.messages.push(*handle),
                Some(Register::DeviceName) | None => {
                    debug!(%handle, "unmapped register in badge service");
                }
            }
        }

        map.device_name = services
            .iter()
            .filter(|service| service.uuid == GENERIC_ACCESS_SERVICE)
            .flat_map(|service| service.registers.iter())
            .find(|handle| handle.register() == Some(Register::DeviceName))
            .copied();

        Ok(map)
    }

    /// Handle for a single-instance register.
    pub fn handle(&self, register: Register) -> Option<RegisterHandle> {
        match register {
            Register::DisplayEnabled => self.display,
            Register::ActiveIndex => self.active_index,
            Register::Brightness => self.brightness,
            Register::DeviceName => self.device_name,
            Register::Message => None,
        }
    }

    /// Message slot handles, in slot order.
    pub fn messages(&self) -> &[RegisterHandle] {
        &self.messages
    }

    /// Registers read by a full refresh.
    pub fn refresh_targets(&self) -> &[RegisterHandle] {
        &self.refresh_targets
    }
}
