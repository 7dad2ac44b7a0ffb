//! Connection state machine.
//!
//! ```text
//! Disconnected ──connect──▶ Bonding ──bonded──▶ LinkEstablishing ──link up──▶ ServiceDiscovery ──found──▶ Ready
//!                                                      ▲                                                 │
//!                                                      └────────────── Reconnecting ◀─── link lost ──────┘
//! ```
//!
//! `connect` skips `Bonding` when the device is already bonded, and goes
//! straight to `ServiceDiscovery` when the platform already holds a link.
//! `close` returns to `Disconnected` from anywhere.
//!
//! After a link loss the machine keeps trying: a refused link request goes
//! back to `Reconnecting` and asks for another attempt from the event loop.
//! Only `close`, or a transport that is itself closed, ends the retries.
//!
//! The machine is pure: [`ConnectionMachine::handle`] takes one input and
//! returns the effects to carry out. It never touches the transport itself.

use std::fmt;

use badgelink_transport::{BondState, TransportError};
use serde::Serialize;
use tracing::{debug, error, warn};

/// Where the link is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Bonding,
    LinkEstablishing,
    ServiceDiscovery,
    Ready,
    Reconnecting,
}

impl LinkState {
    pub fn name(self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Bonding => "bonding",
            LinkState::LinkEstablishing => "link_establishing",
            LinkState::ServiceDiscovery => "service_discovery",
            LinkState::Ready => "ready",
            LinkState::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that happened to the link.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// The caller asked to connect. Carries what the platform already knows.
    Connect { bonded: bool, link_up: bool },
    BondChanged(BondState),
    LinkUp,
    LinkDown,
    /// Service discovery finished; `Err` when the badge service is missing
    /// or discovery itself failed.
    Discovered(Result<(), TransportError>),
    /// The transport refused a bond, link or discovery request.
    RequestFailed(TransportError),
    Close,
}

/// Work the owner must carry out, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Transition { from: LinkState, to: LinkState },
    RequestBond,
    RequestLink,
    Discover,
    StartRefresh,
    /// Discard queued operations and any refresh in progress.
    AbortOperations,
    /// Release the transport.
    Release,
    /// Schedule another link attempt through the event loop.
    RetryLink,
    /// Report an error to subscribers.
    Notify(String),
}

/// Bonding, link and discovery lifecycle for one badge.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: LinkState,
    /// Set when discovery found no badge service. Cleared by `Connect`.
    faulted: bool,
    /// Set by an unexpected link loss. Cleared on `Ready`, `Connect` and `Close`.
    reconnecting: bool,
    released: bool,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
            faulted: false,
            reconnecting: false,
            released: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the session hit a terminal fault (unsupported device).
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Apply `input` and return the effects to carry out.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut effects = Vec::new();

        match (self.state, input) {
            (LinkState::Disconnected, Input::Connect { bonded, link_up }) => {
                self.faulted = false;
                self.reconnecting = false;
                self.released = false;
                if link_up {
                    self.go(LinkState::ServiceDiscovery, &mut effects);
                    effects.push(Effect::Discover);
                } else if bonded {
                    self.go(LinkState::LinkEstablishing, &mut effects);
                    effects.push(Effect::RequestLink);
                } else {
                    self.go(LinkState::Bonding, &mut effects);
                    effects.push(Effect::RequestBond);
                }
            }
            (state, Input::Connect { .. }) => {
                debug!(%state, "connect ignored, already connecting");
            }

            (LinkState::Bonding, Input::BondChanged(BondState::Bonded)) => {
                self.go(LinkState::LinkEstablishing, &mut effects);
                effects.push(Effect::RequestLink);
            }
            (LinkState::Bonding, Input::BondChanged(BondState::None)) => {
                error!("bonding failed");
                self.go(LinkState::Disconnected, &mut effects);
                effects.push(Effect::Notify("bonding with device failed".to_string()));
            }
            (state, Input::BondChanged(bond)) => {
                debug!(%state, ?bond, "bond state change ignored");
            }

            (LinkState::LinkEstablishing, Input::LinkUp) => {
                self.go(LinkState::ServiceDiscovery, &mut effects);
                effects.push(Effect::Discover);
            }
            (state, Input::LinkUp) => {
                debug!(%state, "link up ignored");
            }

            (LinkState::ServiceDiscovery, Input::LinkDown) if self.faulted => {
                self.go(LinkState::Disconnected, &mut effects);
                effects.push(Effect::AbortOperations);
            }
            (
                LinkState::Ready | LinkState::ServiceDiscovery | LinkState::LinkEstablishing,
                Input::LinkDown,
            ) => {
                self.reconnecting = true;
                self.go(LinkState::Reconnecting, &mut effects);
                effects.push(Effect::AbortOperations);
                self.go(LinkState::LinkEstablishing, &mut effects);
                effects.push(Effect::RequestLink);
            }
            (LinkState::Reconnecting, Input::LinkDown) => {
                self.go(LinkState::LinkEstablishing, &mut effects);
                effects.push(Effect::RequestLink);
            }
            (state, Input::LinkDown) => {
                debug!(%state, "link down ignored");
            }

            (LinkState::ServiceDiscovery, Input::Discovered(Ok(()))) if !self.faulted => {
                self.reconnecting = false;
                self.go(LinkState::Ready, &mut effects);
                effects.push(Effect::StartRefresh);
            }
            (LinkState::ServiceDiscovery, Input::Discovered(Err(err))) if !self.faulted => {
                error!(error = %err, "service discovery failed, device unsupported");
                self.faulted = true;
                effects.push(Effect::Notify(err.to_string()));
            }
            (state, Input::Discovered(_)) => {
                debug!(%state, faulted = self.faulted, "discovery result ignored");
            }

            (LinkState::Disconnected, Input::RequestFailed(err)) => {
                debug!(error = %err, "request failure while disconnected ignored");
            }
            (
                LinkState::Reconnecting | LinkState::LinkEstablishing | LinkState::ServiceDiscovery,
                Input::RequestFailed(err),
            ) if self.reconnecting && err != TransportError::Closed => {
                warn!(error = %err, "relink request refused, retrying");
                self.go(LinkState::Reconnecting, &mut effects);
                effects.push(Effect::RetryLink);
            }
            (_, Input::RequestFailed(err)) => {
                error!(error = %err, "transport refused connection request");
                self.reconnecting = false;
                self.go(LinkState::Disconnected, &mut effects);
                effects.push(Effect::AbortOperations);
                effects.push(Effect::Notify(err.to_string()));
            }

            (_, Input::Close) => {
                if self.released {
                    debug!("close ignored, already released");
                } else {
                    self.reconnecting = false;
                    self.go(LinkState::Disconnected, &mut effects);
                    effects.push(Effect::AbortOperations);
                    effects.push(Effect::Release);
                    self.released = true;
                }
            }
        }

        effects
    }

    fn go(&mut self, to: LinkState, effects: &mut Vec<Effect>) {
        let from = self.state;
        if from != to {
            self.state = to;
            effects.push(Effect::Transition { from, to });
        }
    }
}
