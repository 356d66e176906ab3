//! Packet-to-event translation.
//!
//! [`EventTranslator`] consumes client events of the live session in receipt
//! order, keeps the [`RoomView`] current and emits [`AdapterEvent`]s. It only
//! reads the session; when a message requires a new session (game end,
//! forced removal while holding host, transport loss) it returns a
//! [`Directive`] and the run loop asks the reconnect manager to act.

use crate::comms::{self, MuteTransition};
use crate::events::{AdapterEvent, EventSink, NO_COLOR, RoomGroup, SettingsUpdate};
use crate::meeting_delay::{Deferred, DeferredAction, MeetingDelay, SessionEpoch};
use crate::protocol::{
    Bound, ClientEvent, ClientId, GameDataMessage, GameSettings, NO_EXILE, Payload, PlayerObject,
    Position, Room, Rpc, RpcMessage,
};
use crate::room_view::RoomView;

/// Borrowed view of the live session for one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct SessionRef<'a> {
    /// Registries of the joined room.
    pub room: &'a Room,
    /// This bridge's client id.
    pub local_id: ClientId,
    /// Epoch of the session.
    pub epoch: SessionEpoch,
}

/// What the run loop must do after a dispatch. Ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Directive {
    /// Keep processing.
    Continue,
    /// Re-join the same room on the current connection.
    RejoinLobby,
    /// Disconnect and re-join with the cached objects.
    Reconnect,
}

/// State carried out of the warm-up session.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmUp {
    /// First settings sync of the lobby.
    pub settings: GameSettings,
    /// Host's display name at warm-up, if known.
    pub host_name: Option<String>,
}

/// The central dispatcher.
pub struct EventTranslator {
    view: RoomView,
    events: EventSink,
    meetings: MeetingDelay,
}

impl EventTranslator {
    /// Create a translator emitting on `events` and deferring through `meetings`.
    pub fn new(events: EventSink, meetings: MeetingDelay) -> Self {
        Self {
            view: RoomView::new(),
            events,
            meetings,
        }
    }

    /// Derived state.
    pub fn view(&self) -> &RoomView {
        &self.view
    }

    /// Number of deferred actions waiting to fire.
    pub fn pending_deferred(&mut self) -> usize {
        self.meetings.pending()
    }

    /// Announce what the warm-up session learned.
    pub fn apply_warm_up(&mut self, warm_up: &WarmUp) {
        self.view.set_map(warm_up.settings.map);
        self.events.emit(AdapterEvent::MapChanged {
            map: warm_up.settings.map,
        });
        if let Some(name) = &warm_up.host_name {
            self.events.emit(AdapterEvent::HostChanged { name: name.clone() });
        }
    }

    /// Point the translator at a newly joined session.
    pub fn begin_session(&mut self, session: SessionRef<'_>) {
        self.view.rebuild(session.room);
        tracing::debug!(epoch = session.epoch.0, "translator attached to session");
    }

    /// Detach from the current session; pending deferred actions are dropped.
    pub fn end_session(&mut self) {
        self.meetings.cancel_all();
    }

    /// Emit host-changed for the room's host, if it has a name.
    pub fn announce_host(&mut self, room: &Room) {
        let Some(host) = room.host() else {
            return;
        };
        self.view.set_host(Some(host.client_id));
        if let Some(name) = host.name() {
            self.events.emit(AdapterEvent::HostChanged {
                name: name.to_string(),
            });
        }
    }

    /// Dispatch one client event.
    pub fn handle(&mut self, event: &ClientEvent, session: SessionRef<'_>) -> Directive {
        match event {
            ClientEvent::Packet(packet) if packet.carries_payloads() => packet
                .payloads
                .iter()
                .map(|payload| self.handle_payload(payload, session))
                .max()
                .unwrap_or(Directive::Continue),
            ClientEvent::Packet(_) | ClientEvent::Spawned(_) => Directive::Continue,
            ClientEvent::Moved {
                client_id,
                position,
            }
            | ClientEvent::SnappedTo {
                client_id,
                position,
            } => {
                self.emit_pose(session.room, *client_id, *position);
                Directive::Continue
            }
            ClientEvent::PlayerDataRemoved(info) => {
                self.events.emit(AdapterEvent::PlayerColorChanged {
                    name: info.name.clone(),
                    color: NO_COLOR,
                });
                Directive::Continue
            }
            ClientEvent::Disconnected { reason } => {
                tracing::warn!(reason = %reason, "client disconnected");
                Directive::Reconnect
            }
        }
    }

    /// Run a fired deferred action if its session is still the live one.
    pub fn on_deferred(&mut self, deferred: Deferred, session: SessionRef<'_>) {
        if deferred.epoch != session.epoch {
            tracing::debug!(?deferred, "dropping deferred action of a previous session");
            return;
        }

        match deferred.action {
            DeferredAction::ResetPoses => {
                self.events
                    .emit(AdapterEvent::AllPlayerPosesChanged { x: 0.0, y: 0.0 });
            }
            DeferredAction::Exile { player_id } => {
                if let Some(player) = session.room.player_by_player_id(player_id) {
                    tracing::info!(name = ?player.name(), "voted off");
                    self.set_player_group(player, RoomGroup::Spectator);
                }
            }
        }
    }

    fn handle_payload(&mut self, payload: &Payload, session: SessionRef<'_>) -> Directive {
        match payload {
            Payload::JoinGame {
                bound: Bound::Client,
                error: false,
            } => {
                self.announce_host(session.room);
            }
            Payload::StartGame => {
                tracing::info!("started game");
                self.set_all(session.room, RoomGroup::Main);
            }
            Payload::EndGame => {
                tracing::info!("ended game");
                self.set_all(session.room, RoomGroup::Spectator);
                return Directive::RejoinLobby;
            }
            Payload::RemovePlayer {
                bound: Bound::Client,
                client_id,
            } => {
                tracing::info!(client_id, "removed player");
                if session.room.is_host(session.local_id) {
                    tracing::info!("host authority moved to this client, re-joining");
                    return Directive::Reconnect;
                }
                self.announce_host(session.room);
            }
            Payload::GameData { messages } | Payload::GameDataTo { messages, .. } => {
                for message in messages {
                    self.handle_game_data(message, session);
                }
            }
            _ => {}
        }
        Directive::Continue
    }

    fn handle_game_data(&mut self, message: &GameDataMessage, session: SessionRef<'_>) {
        match message {
            GameDataMessage::Data { net_id } => {
                let targets_ship = session
                    .room
                    .ship_status()
                    .is_some_and(|ship| ship.net_id == *net_id);
                if targets_ship {
                    self.derive_mute(session.room);
                }
            }
            GameDataMessage::Rpc(rpc) => self.handle_rpc(rpc, session),
            GameDataMessage::Unknown(_) => {}
        }
    }

    fn handle_rpc(&mut self, rpc: &RpcMessage, session: SessionRef<'_>) {
        match &rpc.call {
            Rpc::SyncSettings(settings) => {
                if self.view.set_map(settings.map) {
                    self.events
                        .emit(AdapterEvent::MapChanged { map: settings.map });
                }
                self.events
                    .emit(AdapterEvent::SettingsChanged(SettingsUpdate {
                        crewmate_vision: settings.crewmate_vision,
                    }));
            }
            Rpc::SetColor { color } => {
                let actor = session.room.player_by_control(rpc.net_id);
                if let Some(name) = actor.and_then(PlayerObject::name) {
                    self.events.emit(AdapterEvent::PlayerColorChanged {
                        name: name.to_string(),
                        color: i32::from(*color),
                    });
                }
            }
            Rpc::StartMeeting { .. } => {
                tracing::info!("meeting started");
                self.meetings
                    .schedule(session.epoch, DeferredAction::ResetPoses);
            }
            Rpc::VotingComplete { exiled, .. } => {
                tracing::info!(exiled, "meeting ended");
                if *exiled != NO_EXILE {
                    self.meetings.schedule(
                        session.epoch,
                        DeferredAction::Exile { player_id: *exiled },
                    );
                }
            }
            Rpc::MurderPlayer { victim_net_id } => {
                if let Some(victim) = session.room.player_by_control(*victim_net_id) {
                    tracing::info!(name = ?victim.name(), "murdered");
                    self.set_player_group(victim, RoomGroup::Spectator);
                }
            }
            Rpc::Unknown(_) => {}
        }
    }

    fn derive_mute(&mut self, room: &Room) {
        let (Some(map), Some(system)) = (self.view.map(), room.comms()) else {
            return;
        };
        if let Some(transition) = comms::derive(map, system) {
            self.apply_transition(room, transition);
        }
    }

    fn apply_transition(&mut self, room: &Room, transition: MuteTransition) {
        for client_id in self.view.move_all(transition.from(), transition.to()) {
            if let Some(name) = room.player(client_id).and_then(PlayerObject::name) {
                self.events.emit(AdapterEvent::PlayerGroupChanged {
                    name: name.to_string(),
                    group: transition.to(),
                });
            }
        }
    }

    fn set_all(&mut self, room: &Room, group: RoomGroup) {
        self.view.set_all(room, group);
        self.events
            .emit(AdapterEvent::AllPlayersGroupChanged { group });
    }

    fn set_player_group(&mut self, player: &PlayerObject, group: RoomGroup) {
        self.view.set_group(player.client_id, group);
        if let Some(name) = player.name() {
            self.events.emit(AdapterEvent::PlayerGroupChanged {
                name: name.to_string(),
                group,
            });
        }
    }

    fn emit_pose(&self, room: &Room, client_id: ClientId, position: Position) {
        if let Some(name) = room.player(client_id).and_then(PlayerObject::name) {
            self.events.emit(AdapterEvent::PlayerPoseChanged {
                name: name.to_string(),
                x: position.x,
                y: position.y,
            });
        }
    }
}
