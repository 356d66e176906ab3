//! In-memory [`ProtocolClient`] driven by tests.
//!
//! A [`FakeServer`] hands out one [`FakeClient`] and keeps control of it:
//! failure injection for connect and join, the room every successful join
//! lands in, a per-join script of events and a live channel of further
//! steps.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::{JoinRejection, ProtocolError};
use crate::protocol::{
    ClientEvent, ClientId, CommsSystem, ComponentKind, GameDataMessage, GameSettings, GlobalSlot,
    MapId, MasterEndpoint, NO_OWNER, NetComponent, NetId, Packet, Payload, PlayerInfo,
    PlayerObject, ProtocolClient, Room, Rpc, RpcMessage,
};

/// Client id the fake assigns to the bridge.
pub(crate) const LOCAL_ID: ClientId = 99;
/// Net id of the ship status in [`lobby_room`].
pub(crate) const SHIP_NET_ID: NetId = 50;
/// Net id of the game data object in [`lobby_room`].
pub(crate) const GAME_DATA_NET_ID: NetId = 5;

/// One live step fed to the client.
pub(crate) enum FakeStep {
    /// Surface an event.
    Event(ClientEvent),
    /// Change the joined room silently.
    Mutate(Box<dyn FnOnce(&mut Room) + Send>),
}

#[derive(Default)]
struct ServerState {
    room: Room,
    scripts: VecDeque<Vec<ClientEvent>>,
    connect_failures: u32,
    join_failures: u32,
    rejection: Option<JoinRejection>,
    connect_calls: u32,
    join_calls: u32,
    disconnect_calls: u32,
    streams_closed: bool,
}

/// Test-side handle of the fake.
#[derive(Clone)]
pub(crate) struct FakeServer {
    state: Arc<Mutex<ServerState>>,
    live: mpsc::UnboundedSender<FakeStep>,
    receiver: Arc<Mutex<Option<mpsc::UnboundedReceiver<FakeStep>>>>,
}

impl FakeServer {
    /// A server whose joins land in copies of `room`.
    pub(crate) fn new(room: Room) -> Self {
        let (live, rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(Mutex::new(ServerState {
                room,
                ..Default::default()
            })),
            live,
            receiver: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// The client. Can be taken once.
    pub(crate) fn client(&self) -> FakeClient {
        let live = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .expect("client already taken");
        FakeClient {
            state: Arc::clone(&self.state),
            live,
            script: VecDeque::new(),
            room: None,
            connected: false,
        }
    }

    /// Fail the next `count` connects.
    pub(crate) fn fail_connects(&self, count: u32) {
        self.state.lock().unwrap().connect_failures = count;
    }

    /// Refuse the next `count` joins with `rejection`.
    pub(crate) fn fail_joins(&self, count: u32, rejection: JoinRejection) {
        let mut state = self.state.lock().unwrap();
        state.join_failures = count;
        state.rejection = Some(rejection);
    }

    /// Events surfaced right after the next successful join.
    pub(crate) fn script_next_join(&self, events: Vec<ClientEvent>) {
        self.state.lock().unwrap().scripts.push_back(events);
    }

    /// Room later joins land in.
    pub(crate) fn set_room(&self, room: Room) {
        self.state.lock().unwrap().room = room;
    }

    /// Surface `event` on the live session.
    pub(crate) fn push(&self, event: ClientEvent) {
        let _ = self.live.send(FakeStep::Event(event));
    }

    /// Change the live session's room before the next pushed event.
    pub(crate) fn mutate(&self, change: impl FnOnce(&mut Room) + Send + 'static) {
        let _ = self.live.send(FakeStep::Mutate(Box::new(change)));
    }

    /// End every session's event stream once its script is exhausted.
    pub(crate) fn close_streams(&self) {
        self.state.lock().unwrap().streams_closed = true;
        // Wakes a client blocked on the live channel.
        self.mutate(|_| {});
    }

    pub(crate) fn connect_calls(&self) -> u32 {
        self.state.lock().unwrap().connect_calls
    }

    pub(crate) fn join_calls(&self) -> u32 {
        self.state.lock().unwrap().join_calls
    }

    pub(crate) fn disconnect_calls(&self) -> u32 {
        self.state.lock().unwrap().disconnect_calls
    }
}

/// The client half.
pub(crate) struct FakeClient {
    state: Arc<Mutex<ServerState>>,
    live: mpsc::UnboundedReceiver<FakeStep>,
    script: VecDeque<ClientEvent>,
    room: Option<Room>,
    connected: bool,
}

impl FakeClient {
    fn do_connect(&mut self) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(ProtocolError::Transport("connection refused".into()));
        }
        self.connected = true;
        Ok(())
    }

    fn do_join(&mut self) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        state.join_calls += 1;
        if !self.connected {
            return Err(ProtocolError::Transport("not connected".into()));
        }
        if state.join_failures > 0 {
            state.join_failures -= 1;
            let rejection = state.rejection.clone().unwrap_or(JoinRejection::GameFull);
            return Err(rejection.into());
        }
        self.room = Some(state.room.clone());
        self.script = state.scripts.pop_front().unwrap_or_default().into();
        Ok(())
    }
}

impl ProtocolClient for FakeClient {
    async fn connect(&mut self, _endpoint: &MasterEndpoint) -> Result<(), ProtocolError> {
        self.do_connect()
    }

    async fn identify(&mut self, _username: &str) -> Result<(), ProtocolError> {
        if self.connected {
            Ok(())
        } else {
            Err(ProtocolError::Transport("not connected".into()))
        }
    }

    async fn join(&mut self, _code: &str, _spawn: bool) -> Result<(), ProtocolError> {
        self.do_join()
    }

    async fn disconnect(&mut self) {
        self.state.lock().unwrap().disconnect_calls += 1;
        self.connected = false;
        self.room = None;
        self.script.clear();
    }

    async fn next_event(&mut self) -> Option<ClientEvent> {
        loop {
            if !self.connected {
                return None;
            }
            let closed = self.state.lock().unwrap().streams_closed;
            let step = match self.script.pop_front() {
                Some(event) => FakeStep::Event(event),
                None if closed => return None,
                None => self.live.recv().await?,
            };
            match step {
                FakeStep::Mutate(change) => {
                    if let Some(room) = self.room.as_mut() {
                        change(room);
                    }
                }
                FakeStep::Event(event) => {
                    if let ClientEvent::Disconnected { .. } = event {
                        self.connected = false;
                    }
                    return Some(event);
                }
            }
        }
    }

    fn client_id(&self) -> ClientId {
        LOCAL_ID
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    fn room_mut(&mut self) -> Option<&mut Room> {
        self.room.as_mut()
    }
}

fn component(net_id: NetId, owner_id: ClientId, kind: ComponentKind) -> NetComponent {
    NetComponent {
        net_id,
        owner_id,
        kind,
    }
}

/// Lobby "ABCDEF" hosted by client 1, with players 1 "red", 2 "blue" and
/// 3 "green" (controls 101 to 103, player ids 0 to 2) and a ship status
/// carrying `comms`.
pub(crate) fn lobby_room_with(comms: CommsSystem) -> Room {
    let mut room = Room::new("ABCDEF");
    room.host_id = Some(1);
    for (index, (client_id, name)) in [(1, "red"), (2, "blue"), (3, "green")]
        .into_iter()
        .enumerate()
    {
        let control = 100 + client_id;
        let mut player = PlayerObject::new(client_id, index as u8);
        player.info = Some(PlayerInfo {
            name: name.to_string(),
            color: index as u8,
        });
        player.control = Some(control);
        room.objects.insert(client_id, player);
        room.components.insert(
            control,
            component(control, client_id, ComponentKind::PlayerControl),
        );
    }

    let game_data = component(GAME_DATA_NET_ID, NO_OWNER, ComponentKind::GameData);
    let ship = component(
        SHIP_NET_ID,
        NO_OWNER,
        ComponentKind::ShipStatus { comms: Some(comms) },
    );
    room.components.insert(GAME_DATA_NET_ID, game_data.clone());
    room.components.insert(SHIP_NET_ID, ship.clone());
    room.globals[GlobalSlot::GameData as usize] = Some(game_data);
    room.globals[GlobalSlot::ShipStatus as usize] = Some(ship);
    room
}

/// [`lobby_room_with`] a flag-model communications system.
pub(crate) fn lobby_room() -> Room {
    lobby_room_with(CommsSystem::HudOverride { sabotaged: false })
}

/// Host broadcast of settings for `map`.
pub(crate) fn settings_packet(map: MapId) -> Packet {
    Packet::reliable(vec![Payload::GameData {
        messages: vec![GameDataMessage::Rpc(RpcMessage {
            net_id: 101,
            call: Rpc::SyncSettings(GameSettings {
                map,
                ..GameSettings::default()
            }),
        })],
    }])
}

/// Warm-up burst for [`lobby_room`] on `map`. The settings sync arrives
/// before the spawn quorum is reached.
pub(crate) fn warm_up_script_on(map: MapId) -> Vec<ClientEvent> {
    let room = lobby_room();
    let spawned = |net_id: NetId| {
        room.components
            .get(&net_id)
            .cloned()
            .map(ClientEvent::Spawned)
    };
    let mut script = vec![ClientEvent::Packet(Packet::reliable(vec![
        Payload::JoinGame {
            bound: crate::protocol::Bound::Client,
            error: false,
        },
    ]))];
    script.extend(spawned(101));
    script.push(ClientEvent::Packet(settings_packet(map)));
    script.extend(spawned(GAME_DATA_NET_ID));
    script.extend(spawned(103));
    script.extend(spawned(102));
    script.extend(spawned(102));
    script
}

/// [`warm_up_script_on`] The Skeld.
pub(crate) fn warm_up_script() -> Vec<ClientEvent> {
    warm_up_script_on(MapId::TheSkeld)
}
