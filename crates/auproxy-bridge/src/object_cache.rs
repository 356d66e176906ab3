//! Snapshot of a room's object registries, carried across sessions.
//!
//! The cache is captured once from the warm-up session and re-attached into
//! every later session by id. Attaching clones the entries, so the snapshot
//! itself never changes and can be re-attached any number of times.

use std::collections::HashMap;

use crate::protocol::{ClientId, NO_OWNER, NetComponent, NetId, PlayerObject, Room};
use crate::spawn_sync::SpawnReady;

/// Player objects, non-player components and global slots of one room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectCache {
    players: HashMap<ClientId, PlayerObject>,
    components: HashMap<NetId, NetComponent>,
    globals: Vec<Option<NetComponent>>,
}

impl ObjectCache {
    /// Capture the registries of `room`.
    ///
    /// Objects of `local_id` (this bridge's own client) and the reserved
    /// [`NO_OWNER`] id are left out. Requires proof that the initial spawn
    /// burst completed.
    pub fn capture(room: &Room, local_id: ClientId, _ready: &SpawnReady) -> Self {
        let players = room
            .objects
            .iter()
            .filter(|(id, _)| **id != local_id && **id != NO_OWNER)
            .map(|(id, object)| (*id, object.clone()))
            .collect();

        let components = room
            .components
            .iter()
            .filter(|(_, component)| component.owner_id != local_id)
            .map(|(id, component)| (*id, component.clone()))
            .collect();

        Self {
            players,
            components,
            globals: room.globals.clone(),
        }
    }

    /// Insert every cached entry into `room` under its original id.
    ///
    /// Existing entries with the same id are replaced; entries the room has
    /// that the cache lacks are kept.
    pub fn attach(&self, room: &mut Room) {
        for (id, object) in &self.players {
            room.objects.insert(*id, object.clone());
        }

        for (id, component) in &self.components {
            room.components.insert(*id, component.clone());
        }

        if room.globals.len() < self.globals.len() {
            room.globals.resize(self.globals.len(), None);
        }
        for (slot, component) in self.globals.iter().enumerate() {
            if component.is_some() {
                room.globals[slot] = component.clone();
            }
        }
    }

    /// Cached player objects.
    pub fn players(&self) -> &HashMap<ClientId, PlayerObject> {
        &self.players
    }

    /// Cached non-player components.
    pub fn components(&self) -> &HashMap<NetId, NetComponent> {
        &self.components
    }

    /// Cached global slots.
    pub fn globals(&self) -> &[Option<NetComponent>] {
        &self.globals
    }
}
