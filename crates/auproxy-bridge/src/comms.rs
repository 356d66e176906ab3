//! Communications sabotage to mute group transitions.
//!
//! Each map models communications differently. The policy is keyed on the
//! map id: a map with no known model, or a system variant that does not match
//! the map, derives nothing.

use std::collections::HashSet;

use crate::events::RoomGroup;
use crate::protocol::{CommsSystem, MapId};

/// Consoles that must be repaired at once to clear the Mira HQ sabotage.
pub const REQUIRED_COMMS_CONSOLES: usize = 2;

/// A group transition applied to every player in `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteTransition {
    /// Sabotage active: `Main` players become `Muted`.
    Mute,
    /// Sabotage cleared: `Muted` players return to `Main`.
    Unmute,
}

impl MuteTransition {
    /// Group players leave.
    pub fn from(self) -> RoomGroup {
        match self {
            MuteTransition::Mute => RoomGroup::Main,
            MuteTransition::Unmute => RoomGroup::Muted,
        }
    }

    /// Group players enter.
    pub fn to(self) -> RoomGroup {
        match self {
            MuteTransition::Mute => RoomGroup::Muted,
            MuteTransition::Unmute => RoomGroup::Main,
        }
    }
}

/// Derive the transition for the communications state `comms` on `map`.
pub fn derive(map: MapId, comms: &CommsSystem) -> Option<MuteTransition> {
    match (map, comms) {
        (MapId::TheSkeld | MapId::Polus, CommsSystem::HudOverride { sabotaged }) => {
            Some(if *sabotaged {
                MuteTransition::Mute
            } else {
                MuteTransition::Unmute
            })
        }
        (MapId::MiraHq, CommsSystem::HqHud { completed }) => {
            let repaired: HashSet<u8> = completed.iter().copied().collect();
            Some(if repaired.len() >= REQUIRED_COMMS_CONSOLES {
                MuteTransition::Unmute
            } else {
                MuteTransition::Mute
            })
        }
        _ => None,
    }
}
