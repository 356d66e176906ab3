//! Derived per-session state: map, host and voice group membership.

use std::collections::HashMap;

use crate::events::RoomGroup;
use crate::protocol::{ClientId, MapId, Room};

/// State derived from the packet stream of the live session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomView {
    map: Option<MapId>,
    host: Option<ClientId>,
    groups: HashMap<ClientId, RoomGroup>,
}

impl RoomView {
    /// An empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current map, once settings were seen.
    pub fn map(&self) -> Option<MapId> {
        self.map
    }

    /// Record the map. Returns `true` if it changed.
    pub fn set_map(&mut self, map: MapId) -> bool {
        self.map.replace(map) != Some(map)
    }

    /// Last announced host.
    pub fn host(&self) -> Option<ClientId> {
        self.host
    }

    /// Record the host. Returns `true` if it changed.
    pub fn set_host(&mut self, host: Option<ClientId>) -> bool {
        std::mem::replace(&mut self.host, host) != host
    }

    /// Group of `client_id`, if known.
    pub fn group(&self, client_id: ClientId) -> Option<RoomGroup> {
        self.groups.get(&client_id).copied()
    }

    /// Put `client_id` into `group`.
    pub fn set_group(&mut self, client_id: ClientId, group: RoomGroup) {
        self.groups.insert(client_id, group);
    }

    /// Put every player of `room` into `group`.
    pub fn set_all(&mut self, room: &Room, group: RoomGroup) {
        self.groups = room.objects.keys().map(|id| (*id, group)).collect();
    }

    /// Move every player currently in `from` to `to`. Returns the moved ids
    /// in ascending order.
    pub fn move_all(&mut self, from: RoomGroup, to: RoomGroup) -> Vec<ClientId> {
        let mut moved: Vec<ClientId> = self
            .groups
            .iter_mut()
            .filter(|(_, group)| **group == from)
            .map(|(id, group)| {
                *group = to;
                *id
            })
            .collect();
        moved.sort_unstable();
        moved
    }

    /// Rebuild for a newly joined session: the host is forgotten and group
    /// memberships are kept only for players present in `room`. The map is
    /// kept; settings are not re-synchronized on rejoin.
    pub fn rebuild(&mut self, room: &Room) {
        self.host = None;
        self.groups.retain(|id, _| room.objects.contains_key(id));
    }
}
