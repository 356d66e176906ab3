//! Bridge between a public Among Us lobby and a proximity-voice backend.
//!
//! The bridge joins a lobby as a passive observer, keeps a cache of the
//! room's networked objects alive across forced re-joins, and translates the
//! protocol stream into [`AdapterEvent`]s: host, map, colors, poses, voice
//! groups and settings.

pub mod adapter;
pub mod comms;
pub mod error;
pub mod events;
pub mod meeting_delay;
pub mod object_cache;
pub mod protocol;
pub mod reconnect;
pub mod room_view;
pub mod settings_waiter;
pub mod spawn_sync;
pub mod translator;

#[cfg(test)]
mod fake_client;

pub use adapter::{AdapterOptions, DEFAULT_USERNAME, PublicLobbyAdapter};
pub use error::{AdapterError, JoinRejection, ProtocolError};
pub use events::{AdapterEvent, EventSink, NO_COLOR, RoomGroup, SettingsUpdate};
pub use meeting_delay::{DEFAULT_MEETING_GRACE, SessionEpoch};
pub use object_cache::ObjectCache;
pub use protocol::{ClientEvent, MasterEndpoint, ProtocolClient, Room};
pub use reconnect::{
    LinkState, LinkStateWatch, ReconnectConfig, ReconnectManager, ReconnectState, RejoinMode,
    SyncTimeouts, master_endpoint,
};
pub use spawn_sync::SpawnReady;
