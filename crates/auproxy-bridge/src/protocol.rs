//! Boundary with the external protocol client.
//!
//! Transport, handshake, packet decoding and the networked-object registry
//! are owned by a [`ProtocolClient`] implementation. This module defines the
//! decoded shapes the bridge consumes: packets and their payloads, the room
//! registries ([`Room`]), and out-of-band client notifications
//! ([`ClientEvent`]).
//!
//! The client applies every decoded message to its [`Room`] before surfacing
//! the corresponding [`ClientEvent`], so handlers always observe the
//! post-message state.

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Numeric id of a connected client (player object key).
pub type ClientId = u32;

/// Numeric id of a networked component.
pub type NetId = u32;

/// Owner id reserved for objects that belong to the room rather than a client.
pub const NO_OWNER: ClientId = 0;

/// `VotingComplete` exile value meaning nobody was voted off.
pub const NO_EXILE: u8 = 0xFF;

/// Number of fixed global component slots in a room.
pub const GLOBAL_SLOTS: usize = 5;

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// A master server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEndpoint {
    /// Host name or IP address.
    pub host: String,
    /// UDP port.
    pub port: u16,
}

impl MasterEndpoint {
    /// Create an endpoint from host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for MasterEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Game settings
// ---------------------------------------------------------------------------

/// Map identifier as carried in the settings payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapId {
    /// The Skeld.
    TheSkeld,
    /// Mira HQ.
    MiraHq,
    /// Polus.
    Polus,
    /// Any map id this bridge has no policy for.
    Other(u8),
}

impl MapId {
    /// Decode the wire byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => MapId::TheSkeld,
            1 => MapId::MiraHq,
            2 => MapId::Polus,
            other => MapId::Other(other),
        }
    }
}

/// Decoded game options from a `SyncSettings` RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Selected map.
    pub map: MapId,
    /// Maximum players in the lobby.
    pub max_players: u8,
    /// Number of impostors.
    pub num_impostors: u8,
    /// Player speed multiplier.
    pub player_speed: f32,
    /// Crewmate vision radius multiplier.
    pub crewmate_vision: f32,
    /// Impostor vision radius multiplier.
    pub impostor_vision: f32,
    /// Kill cooldown in seconds.
    pub kill_cooldown: f32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            map: MapId::TheSkeld,
            max_players: 10,
            num_impostors: 1,
            player_speed: 1.0,
            crewmate_vision: 1.0,
            impostor_vision: 1.5,
            kill_cooldown: 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Packets
// ---------------------------------------------------------------------------

/// Direction of a packet or payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Server to client.
    Client,
    /// Client to server.
    Server,
}

/// Transport-level packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Unreliable data packet.
    Unreliable,
    /// Reliable data packet.
    Reliable,
    /// Handshake.
    Hello,
    /// Transport disconnect.
    Disconnect,
    /// Acknowledgement.
    Acknowledge,
    /// Keepalive.
    Ping,
}

/// A decoded transport packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Packet kind.
    pub op: Opcode,
    /// Direction.
    pub bound: Bound,
    /// Root messages. Empty for non-data opcodes.
    pub payloads: Vec<Payload>,
}

impl Packet {
    /// A client-bound reliable packet.
    pub fn reliable(payloads: Vec<Payload>) -> Self {
        Self {
            op: Opcode::Reliable,
            bound: Bound::Client,
            payloads,
        }
    }

    /// Whether the packet carries root messages the bridge dispatches.
    pub fn carries_payloads(&self) -> bool {
        matches!(self.op, Opcode::Reliable | Opcode::Unreliable)
    }
}

/// Root message inside a data packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Join confirmation (client-bound) or request (server-bound).
    JoinGame {
        /// Direction.
        bound: Bound,
        /// The join was refused.
        error: bool,
    },
    /// The host started the round.
    StartGame,
    /// The round ended.
    EndGame,
    /// A client was removed from the room.
    RemovePlayer {
        /// Direction.
        bound: Bound,
        /// Removed client.
        client_id: ClientId,
    },
    /// Broadcast object messages.
    GameData {
        /// Object messages in order.
        messages: Vec<GameDataMessage>,
    },
    /// Object messages addressed to one client.
    GameDataTo {
        /// Recipient client.
        recipient: ClientId,
        /// Object messages in order.
        messages: Vec<GameDataMessage>,
    },
    /// A root tag the bridge does not interpret.
    Unknown(u8),
}

/// Message addressed to a networked object.
#[derive(Debug, Clone, PartialEq)]
pub enum GameDataMessage {
    /// State delta for a component.
    Data {
        /// Target component.
        net_id: NetId,
    },
    /// Remote procedure call on a component.
    Rpc(RpcMessage),
    /// A message tag the bridge does not interpret.
    Unknown(u8),
}

/// An RPC with its target component.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcMessage {
    /// Component the RPC was invoked on.
    pub net_id: NetId,
    /// Decoded call.
    pub call: Rpc,
}

/// Decoded RPC calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Rpc {
    /// Host broadcast of the game options.
    SyncSettings(GameSettings),
    /// A player picked a color.
    SetColor {
        /// Color index.
        color: u8,
    },
    /// A meeting was called.
    StartMeeting {
        /// Reported body's player id, `0xFF` for an emergency button.
        body_player_id: u8,
    },
    /// Voting finished.
    VotingComplete {
        /// Player id of the exiled player, [`NO_EXILE`] for none.
        exiled: u8,
        /// The vote was tied.
        tie: bool,
    },
    /// A player was killed.
    MurderPlayer {
        /// Control net id of the victim.
        victim_net_id: NetId,
    },
    /// An RPC id the bridge does not interpret.
    Unknown(u8),
}

// ---------------------------------------------------------------------------
// Room registries
// ---------------------------------------------------------------------------

/// Roster entry of a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    /// Display name.
    pub name: String,
    /// Color index.
    pub color: u8,
}

/// A client's player object and its per-player components.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerObject {
    /// Owning client.
    pub client_id: ClientId,
    /// In-game player id (used by meeting RPCs).
    pub player_id: u8,
    /// Roster entry, once game data knows this player.
    pub info: Option<PlayerInfo>,
    /// Net id of the player's control component.
    pub control: Option<NetId>,
    /// Net id of the player's physics component.
    pub physics: Option<NetId>,
    /// Net id of the player's movement component.
    pub transform: Option<NetId>,
}

impl PlayerObject {
    /// A bare player object without components.
    pub fn new(client_id: ClientId, player_id: u8) -> Self {
        Self {
            client_id,
            player_id,
            info: None,
            control: None,
            physics: None,
            transform: None,
        }
    }

    /// Display name, if the roster knows this player.
    pub fn name(&self) -> Option<&str> {
        self.info.as_ref().map(|info| info.name.as_str())
    }
}

/// Communications system state; the variant depends on the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommsSystem {
    /// Single sabotage flag (Skeld, Polus).
    HudOverride {
        /// Communications are sabotaged.
        sabotaged: bool,
    },
    /// Multi-console repair model (Mira HQ).
    HqHud {
        /// Ids of consoles currently repaired.
        completed: Vec<u8>,
    },
}

/// Kind of a networked component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    /// Room-level ship status holding the map systems.
    ShipStatus {
        /// Communications system, when the map has one.
        comms: Option<CommsSystem>,
    },
    /// Meeting voting screen.
    MeetingHud,
    /// Lobby behaviour.
    LobbyBehaviour,
    /// Room-level game data (player roster).
    GameData,
    /// Vote-kick tracker.
    VoteBanSystem,
    /// Per-player control component.
    PlayerControl,
    /// Per-player physics component.
    PlayerPhysics,
    /// Per-player movement component.
    NetworkTransform,
}

/// A networked component instance.
#[derive(Debug, Clone, PartialEq)]
pub struct NetComponent {
    /// Component id.
    pub net_id: NetId,
    /// Owning client, [`NO_OWNER`] for room-level objects.
    pub owner_id: ClientId,
    /// What the component is.
    pub kind: ComponentKind,
}

/// Fixed slots in [`Room::globals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalSlot {
    /// Ship status.
    ShipStatus = 0,
    /// Meeting HUD.
    MeetingHud = 1,
    /// Lobby behaviour.
    LobbyBehaviour = 2,
    /// Game data.
    GameData = 3,
    /// Vote ban system.
    VoteBanSystem = 4,
}

/// Registries of one joined room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Room {
    /// Room code.
    pub code: String,
    /// Client id currently holding host authority.
    pub host_id: Option<ClientId>,
    /// Player objects keyed by client id.
    pub objects: HashMap<ClientId, PlayerObject>,
    /// Networked components keyed by net id.
    pub components: HashMap<NetId, NetComponent>,
    /// Global components by [`GlobalSlot`].
    pub globals: Vec<Option<NetComponent>>,
}

impl Room {
    /// An empty room with all global slots vacant.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            host_id: None,
            objects: HashMap::new(),
            components: HashMap::new(),
            globals: vec![None; GLOBAL_SLOTS],
        }
    }

    /// Player object of `client_id`.
    pub fn player(&self, client_id: ClientId) -> Option<&PlayerObject> {
        self.objects.get(&client_id)
    }

    /// Player whose control component has `net_id`.
    pub fn player_by_control(&self, net_id: NetId) -> Option<&PlayerObject> {
        self.objects
            .values()
            .find(|player| player.control == Some(net_id))
    }

    /// Player with in-game id `player_id`.
    pub fn player_by_player_id(&self, player_id: u8) -> Option<&PlayerObject> {
        self.objects
            .values()
            .find(|player| player.player_id == player_id)
    }

    /// Player object of the current host.
    pub fn host(&self) -> Option<&PlayerObject> {
        self.host_id.and_then(|id| self.objects.get(&id))
    }

    /// Whether `client_id` holds host authority.
    pub fn is_host(&self, client_id: ClientId) -> bool {
        self.host_id == Some(client_id)
    }

    /// Component in a global slot.
    pub fn global(&self, slot: GlobalSlot) -> Option<&NetComponent> {
        self.globals.get(slot as usize).and_then(Option::as_ref)
    }

    /// The ship status component.
    pub fn ship_status(&self) -> Option<&NetComponent> {
        self.global(GlobalSlot::ShipStatus)
    }

    /// Communications system of the ship status, if present.
    pub fn comms(&self) -> Option<&CommsSystem> {
        match &self.ship_status()?.kind {
            ComponentKind::ShipStatus { comms } => comms.as_ref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client notifications
// ---------------------------------------------------------------------------

/// 2D position in map units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Position {
    /// Create a position.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Everything the client surfaces to the bridge, in receipt order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A decoded packet.
    Packet(Packet),
    /// A component was spawned into the room.
    Spawned(NetComponent),
    /// Authoritative movement update for a player.
    Moved {
        /// Player's client id.
        client_id: ClientId,
        /// New position.
        position: Position,
    },
    /// Position snap (teleport) for a player.
    SnappedTo {
        /// Player's client id.
        client_id: ClientId,
        /// New position.
        position: Position,
    },
    /// A roster entry was removed from game data.
    PlayerDataRemoved(PlayerInfo),
    /// The transport closed.
    Disconnected {
        /// Human-readable reason.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// The protocol session the bridge drives.
///
/// One client is reused across sessions: `disconnect` followed by
/// `connect`/`identify`/`join` yields a fresh room.
pub trait ProtocolClient: Send + 'static {
    /// Open the transport to a master endpoint.
    fn connect(
        &mut self,
        endpoint: &MasterEndpoint,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Complete the handshake under `username`.
    fn identify(&mut self, username: &str)
    -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Join room `code`. With `spawn` the server spawns a player object for
    /// this client.
    fn join(
        &mut self,
        code: &str,
        spawn: bool,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Close the transport and drop the room. Safe to call when disconnected.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;

    /// Next notification, or `None` once the transport is closed.
    ///
    /// Must be cancel safe: the adapter polls it inside `tokio::select!` and
    /// drops the future whenever another branch wins, so an event may only
    /// be taken off the transport in the poll that returns it.
    fn next_event(&mut self) -> impl Future<Output = Option<ClientEvent>> + Send;

    /// This client's id in the current room.
    fn client_id(&self) -> ClientId;

    /// Whether the transport is open.
    fn is_connected(&self) -> bool;

    /// Registries of the joined room.
    fn room(&self) -> Option<&Room>;

    /// Mutable registries of the joined room.
    fn room_mut(&mut self) -> Option<&mut Room>;
}
