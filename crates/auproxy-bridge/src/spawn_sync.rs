//! Waits for the initial spawn burst of a freshly joined room.
//!
//! A room is ready once its game data object has spawned and every player
//! registered in the room owns a spawned control component. Spawns arrive in
//! any order and may repeat; readiness is signalled exactly once.

use std::collections::HashSet;

use crate::error::AdapterError;
use crate::events::{AdapterEvent, EventSink};
use crate::protocol::{ClientEvent, ClientId, ComponentKind, NetComponent, ProtocolClient, Room};

/// Proof that a session completed its initial spawn burst.
#[derive(Debug)]
pub struct SpawnReady {
    _private: (),
}

impl SpawnReady {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Tracks spawn progress of one session.
#[derive(Debug, Default)]
pub struct SpawnSynchronizer {
    game_data_spawned: bool,
    controls: HashSet<ClientId>,
    fired: bool,
}

impl SpawnSynchronizer {
    /// Create a synchronizer with nothing spawned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether readiness has already been signalled.
    pub fn is_done(&self) -> bool {
        self.fired
    }

    /// Feed one spawn notification.
    ///
    /// When the game data object spawns, the color of every named roster
    /// entry is announced. Returns [`SpawnReady`] the first time the quorum
    /// holds, and `None` on every other call, including all calls after it
    /// fired.
    pub fn observe(
        &mut self,
        spawned: &NetComponent,
        room: &Room,
        events: &EventSink,
    ) -> Option<SpawnReady> {
        if self.fired {
            return None;
        }

        match spawned.kind {
            ComponentKind::GameData => {
                self.game_data_spawned = true;
                for player in room.objects.values() {
                    if let Some(info) = &player.info {
                        events.emit(AdapterEvent::PlayerColorChanged {
                            name: info.name.clone(),
                            color: i32::from(info.color),
                        });
                    }
                }
            }
            ComponentKind::PlayerControl => {
                self.controls.insert(spawned.owner_id);
            }
            _ => {}
        }

        if !self.game_data_spawned {
            return None;
        }
        if !room.objects.keys().all(|id| self.controls.contains(id)) {
            return None;
        }

        self.fired = true;
        tracing::debug!(players = room.objects.len(), "spawn quorum reached");
        Some(SpawnReady::new())
    }
}

/// Drive a [`SpawnSynchronizer`] from `client` until the room is ready.
///
/// Non-spawn events read meanwhile are appended to `backlog` in order.
pub async fn await_spawns<C: ProtocolClient>(
    client: &mut C,
    events: &EventSink,
    backlog: &mut Vec<ClientEvent>,
) -> Result<SpawnReady, AdapterError> {
    let mut sync = SpawnSynchronizer::new();

    loop {
        let event = client
            .next_event()
            .await
            .ok_or(AdapterError::SessionClosed("spawn quorum"))?;

        match event {
            ClientEvent::Spawned(component) => {
                let room = client.room().ok_or(AdapterError::MissingRoom)?;
                if let Some(ready) = sync.observe(&component, room, events) {
                    return Ok(ready);
                }
            }
            ClientEvent::Disconnected { .. } => {
                return Err(AdapterError::SessionClosed("spawn quorum"));
            }
            other => backlog.push(other),
        }
    }
}
