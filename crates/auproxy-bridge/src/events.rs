//! Semantic events raised to the downstream application.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::protocol::MapId;

/// Color value announced when a player stops being rendered.
pub const NO_COLOR: i32 = -1;

/// Voice group a player belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomGroup {
    /// Alive and able to talk.
    Main,
    /// Alive, but communications are sabotaged.
    Muted,
    /// Dead, exiled, or between rounds.
    Spectator,
}

/// Settings fields the downstream muting logic cares about.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    /// Crewmate vision radius multiplier.
    pub crewmate_vision: f32,
}

/// Everything the bridge tells the downstream application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterEvent {
    /// A (new) host holds authority.
    HostChanged {
        /// Host's display name.
        name: String,
    },
    /// The lobby switched maps.
    MapChanged {
        /// New map.
        map: MapId,
    },
    /// A player's color changed, or [`NO_COLOR`] when they left the roster.
    PlayerColorChanged {
        /// Player's display name.
        name: String,
        /// Color index or [`NO_COLOR`].
        color: i32,
    },
    /// A player moved.
    PlayerPoseChanged {
        /// Player's display name.
        name: String,
        /// Horizontal coordinate.
        x: f32,
        /// Vertical coordinate.
        y: f32,
    },
    /// Every player was placed at the same position.
    AllPlayerPosesChanged {
        /// Horizontal coordinate.
        x: f32,
        /// Vertical coordinate.
        y: f32,
    },
    /// One player changed voice group.
    PlayerGroupChanged {
        /// Player's display name.
        name: String,
        /// New group.
        group: RoomGroup,
    },
    /// Every player changed to the same voice group.
    AllPlayersGroupChanged {
        /// New group.
        group: RoomGroup,
    },
    /// Game settings changed.
    SettingsChanged(SettingsUpdate),
    /// Something went wrong. With `fatal` the adapter has stopped.
    Error {
        /// Human-readable description.
        message: String,
        /// The adapter is terminal.
        fatal: bool,
    },
}

/// Sending half of the downstream event channel.
///
/// Emitting never fails: once the application dropped its receiver, events
/// are discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<AdapterEvent>,
}

impl EventSink {
    /// Create a sink and the receiver handed to the application.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AdapterEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit one event.
    pub fn emit(&self, event: AdapterEvent) {
        tracing::debug!(?event, "emit");
        let _ = self.tx.send(event);
    }

    /// Emit an advisory error; the adapter keeps running.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.emit(AdapterEvent::Error {
            message,
            fatal: false,
        });
    }

    /// Emit a fatal error; the caller must stop afterwards.
    pub fn fatal(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.emit(AdapterEvent::Error {
            message,
            fatal: true,
        });
    }
}
