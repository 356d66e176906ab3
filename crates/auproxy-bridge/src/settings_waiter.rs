//! Waits for the first settings synchronization of a session.

use crate::error::AdapterError;
use crate::protocol::{
    Bound, ClientEvent, GameDataMessage, GameSettings, Opcode, Payload, ProtocolClient, Rpc,
};

/// Resolves with the first `SyncSettings` RPC seen on the wire.
#[derive(Debug, Default)]
pub struct SettingsWaiter {
    resolved: bool,
}

impl SettingsWaiter {
    /// Create a waiter that has not seen settings yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one client event. Only client-bound reliable packets with a
    /// broadcast game data payload are considered. Returns the settings the
    /// first time they are found and `None` afterwards.
    pub fn observe(&mut self, event: &ClientEvent) -> Option<GameSettings> {
        if self.resolved {
            return None;
        }

        let ClientEvent::Packet(packet) = event else {
            return None;
        };
        if packet.bound != Bound::Client || packet.op != Opcode::Reliable {
            return None;
        }

        let settings = packet.payloads.iter().find_map(|payload| match payload {
            Payload::GameData { messages } => messages.iter().find_map(|message| match message {
                GameDataMessage::Rpc(rpc) => match &rpc.call {
                    Rpc::SyncSettings(settings) => Some(settings.clone()),
                    _ => None,
                },
                _ => None,
            }),
            _ => None,
        })?;

        self.resolved = true;
        Some(settings)
    }
}

/// Resolve with the first settings sync, scanning `backlog` before reading
/// further events from `client`.
pub async fn await_settings<C: ProtocolClient>(
    client: &mut C,
    backlog: Vec<ClientEvent>,
) -> Result<GameSettings, AdapterError> {
    let mut waiter = SettingsWaiter::new();

    if let Some(settings) = backlog.iter().find_map(|event| waiter.observe(event)) {
        return Ok(settings);
    }

    loop {
        let event = client
            .next_event()
            .await
            .ok_or(AdapterError::SessionClosed("settings sync"))?;
        if let ClientEvent::Disconnected { .. } = event {
            return Err(AdapterError::SessionClosed("settings sync"));
        }
        if let Some(settings) = waiter.observe(&event) {
            return Ok(settings);
        }
    }
}
