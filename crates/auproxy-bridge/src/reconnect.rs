//! Session lifecycle: join with a bounded retry budget, warm-up capture and
//! re-join with cached object re-attachment.
//!
//! [`ReconnectManager`] exclusively owns the protocol client, the live
//! session and the [`ObjectCache`]. The first join is a warm-up: it waits for
//! the spawn burst and the first settings sync, captures the room's objects
//! and disconnects. Every later join re-attaches the cached objects into the
//! new room before any handler sees it. [`ReconnectState`] computes the delay
//! between failed join attempts with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use auproxy_config::{ReconnectSettings, Region};
use rand::Rng;
use tokio::sync::watch;

use crate::error::{AdapterError, ProtocolError};
use crate::events::EventSink;
use crate::meeting_delay::SessionEpoch;
use crate::object_cache::ObjectCache;
use crate::protocol::{MasterEndpoint, ProtocolClient};
use crate::settings_waiter::await_settings;
use crate::spawn_sync::await_spawns;
use crate::translator::{SessionRef, WarmUp};

/// Port every master server listens on.
pub const MASTER_PORT: u16 = 22023;

/// Fixed master endpoint of a region.
pub fn master_endpoint(region: Region) -> MasterEndpoint {
    let host = match region {
        Region::NorthAmerica => "na.mm.among.us",
        Region::Europe => "eu.mm.among.us",
        Region::Asia => "as.mm.among.us",
    };
    MasterEndpoint::new(host, MASTER_PORT)
}

/// Upper bound for [`ReconnectConfig::backoff_multiplier`].
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// `delay * factor`, saturating at `cap`. Non-finite or negative products
/// yield `cap`.
fn scale(delay: Duration, factor: f64, cap: Duration) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
        .map_or(cap, |scaled| scaled.min(cap))
}

/// Configuration for join retries.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 250 ms.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt. Default: 2.0.
    pub backoff_multiplier: f64,
    /// Maximum delay between attempts. Default: 4 s.
    pub max_delay: Duration,
    /// Join attempts before giving up. Default: 5.
    pub max_attempts: u32,
    /// Jitter factor (0.0–1.0). Applied as ±jitter to the delay. Default: 0.1.
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::from(&ReconnectSettings::default())
    }
}

impl From<&ReconnectSettings> for ReconnectConfig {
    fn from(settings: &ReconnectSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            backoff_multiplier: if settings.backoff_multiplier.is_finite() {
                settings.backoff_multiplier.clamp(1.0, MAX_BACKOFF_MULTIPLIER)
            } else {
                1.0
            },
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_attempts: settings.max_attempts.max(1),
            jitter: if settings.jitter.is_finite() {
                settings.jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }
}

/// Counts failed attempts and computes the next backoff delay.
pub struct ReconnectState {
    config: ReconnectConfig,
    failures: u32,
    current_delay: Duration,
}

impl ReconnectState {
    /// Create a new state from the given config.
    pub fn new(config: ReconnectConfig) -> Self {
        let initial = config.initial_delay;
        Self {
            config,
            failures: 0,
            current_delay: initial,
        }
    }

    /// Record a failed attempt and return the delay before the next one.
    /// Returns `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.config.max_attempts {
            return None;
        }

        let base = self.current_delay;
        let cap = self.config.max_delay;

        // Uniform in [base * (1 - jitter), base * (1 + jitter)]
        let jitter = self.config.jitter;
        let jittered = if jitter > 0.0 && jitter <= 1.0 {
            let mut rng = rand::rng();
            let factor = rng.random_range((1.0 - jitter)..=(1.0 + jitter));
            scale(base, factor, cap)
        } else {
            base.min(cap)
        };

        self.current_delay = scale(base, self.config.backoff_multiplier, cap);

        Some(jittered)
    }

    /// Attempts still allowed after the failures recorded so far.
    pub fn remaining(&self) -> u32 {
        self.config.max_attempts.saturating_sub(self.failures)
    }

    /// Reset after a successful join.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.current_delay = self.config.initial_delay;
    }

    /// Number of failed attempts so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No session.
    Disconnected,
    /// Opening the transport and identifying.
    Connecting,
    /// Transport open, joining the room.
    Joining,
    /// Joined with cached objects attached.
    Active,
    /// Re-establishing a session after removal, game end or transport loss.
    Rejoining,
    /// Terminal: a fatal error was reported.
    Failed,
}

/// Observable [`LinkState`] backed by a [`watch`] channel.
pub struct LinkStateWatch {
    tx: watch::Sender<LinkState>,
    rx: watch::Receiver<LinkState>,
}

impl Default for LinkStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStateWatch {
    /// Create a new watch initialized to [`LinkState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(LinkState::Disconnected);
        Self { tx, rx }
    }

    /// Set the current state, notifying all subscribers.
    pub fn set(&self, state: LinkState) {
        let _ = self.tx.send(state);
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> LinkState {
        *self.rx.borrow()
    }
}

/// How to re-establish the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejoinMode {
    /// Disconnect, then connect and join again.
    Reconnect,
    /// Join again on the open connection (the round ended).
    Lobby,
}

/// Where and how to join.
#[derive(Debug, Clone)]
pub struct JoinTarget {
    /// Room code.
    pub game_code: String,
    /// Master server.
    pub endpoint: MasterEndpoint,
    /// Name sent when identifying.
    pub username: String,
}

/// Optional limits for the warm-up synchronization stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncTimeouts {
    /// Limit for the spawn quorum. `None` waits forever.
    pub spawn: Option<Duration>,
    /// Limit for the first settings sync. `None` waits forever.
    pub settings: Option<Duration>,
}

async fn within<T>(
    limit: Option<Duration>,
    stage: &'static str,
    fut: impl Future<Output = Result<T, AdapterError>>,
) -> Result<T, AdapterError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| AdapterError::SyncTimeout(stage))?,
        None => fut.await,
    }
}

/// Owns the client, the session lifecycle and the object cache.
pub struct ReconnectManager<C> {
    client: C,
    target: JoinTarget,
    config: ReconnectConfig,
    timeouts: SyncTimeouts,
    cache: Option<ObjectCache>,
    link: LinkStateWatch,
    epoch: SessionEpoch,
    events: EventSink,
    rejoins: ReconnectState,
    quiet_session: bool,
}

impl<C: ProtocolClient> ReconnectManager<C> {
    /// Create a manager around `client`.
    pub fn new(
        client: C,
        target: JoinTarget,
        config: ReconnectConfig,
        timeouts: SyncTimeouts,
        events: EventSink,
    ) -> Self {
        Self {
            client,
            target,
            rejoins: ReconnectState::new(config.clone()),
            config,
            timeouts,
            cache: None,
            link: LinkStateWatch::new(),
            epoch: SessionEpoch::default(),
            events,
            quiet_session: false,
        }
    }

    /// Lifecycle state.
    pub fn link(&self) -> &LinkStateWatch {
        &self.link
    }

    /// Captured objects, once warm-up completed.
    pub fn cache(&self) -> Option<&ObjectCache> {
        self.cache.as_ref()
    }

    /// Epoch of the current (or last) session.
    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Borrow the live session, if one is active.
    pub fn session(&self) -> Option<SessionRef<'_>> {
        if self.link.current() != LinkState::Active {
            return None;
        }
        Some(SessionRef {
            room: self.client.room()?,
            local_id: self.client.client_id(),
            epoch: self.epoch,
        })
    }

    /// Record that the live session delivered an event. Clears the backoff
    /// between consecutive rejoins.
    pub fn note_activity(&mut self) {
        if self.quiet_session {
            self.quiet_session = false;
            self.rejoins.reset();
        }
    }

    /// Next event of the live session.
    pub async fn next_event(&mut self) -> Option<crate::protocol::ClientEvent> {
        self.client.next_event().await
    }

    /// First join: wait for the spawn burst, then the first settings sync,
    /// capture the object cache and disconnect.
    pub async fn warm_up(&mut self) -> Result<WarmUp, AdapterError> {
        self.join_with_retry(true).await?;

        let mut backlog = Vec::new();
        let ready = within(
            self.timeouts.spawn,
            "spawn quorum",
            await_spawns(&mut self.client, &self.events, &mut backlog),
        )
        .await?;
        let settings = within(
            self.timeouts.settings,
            "settings sync",
            await_settings(&mut self.client, backlog),
        )
        .await?;

        let room = self.client.room().ok_or(AdapterError::MissingRoom)?;
        let host_name = room.host().and_then(|host| host.name()).map(str::to_string);
        let cache = ObjectCache::capture(room, self.client.client_id(), &ready);
        tracing::info!(
            players = cache.players().len(),
            components = cache.components().len(),
            map = ?settings.map,
            "captured lobby state"
        );
        self.cache = Some(cache);

        self.client.disconnect().await;
        self.link.set(LinkState::Disconnected);

        Ok(WarmUp {
            settings,
            host_name,
        })
    }

    /// The real join: re-attach the cached objects into the new room.
    pub async fn establish(&mut self) -> Result<(), AdapterError> {
        self.join_with_retry(false).await?;
        self.attach()
    }

    /// Re-establish the session with the cached objects. Spawn and settings
    /// synchronization are not repeated. Ignored while a rejoin is running.
    ///
    /// When the session being replaced never delivered an event (see
    /// [`note_activity`](Self::note_activity)), the rejoin first waits a
    /// backoff delay. Once the attempt budget is spent on such sessions in a
    /// row, it fails with [`AdapterError::UnstableSession`].
    pub async fn rejoin(&mut self, mode: RejoinMode) -> Result<(), AdapterError> {
        if self.link.current() == LinkState::Rejoining {
            tracing::debug!(?mode, "rejoin already in progress");
            return Ok(());
        }
        self.link.set(LinkState::Rejoining);

        if self.quiet_session {
            let Some(delay) = self.rejoins.next_delay() else {
                return Err(AdapterError::UnstableSession {
                    rejoins: self.rejoins.failures(),
                });
            };
            tracing::warn!(?delay, "previous session closed without traffic, backing off");
            tokio::time::sleep(delay).await;
        }
        tracing::info!(?mode, code = %self.target.game_code, "re-joining");

        if mode == RejoinMode::Reconnect {
            self.client.disconnect().await;
        }
        self.join_with_retry(false).await?;
        self.attach()
    }

    /// Report `err` as the single fatal error and enter [`LinkState::Failed`].
    pub fn fail(&mut self, err: &AdapterError) {
        self.link.set(LinkState::Failed);
        self.events.fatal(err.to_string());
    }

    /// Tear the session down.
    pub async fn shutdown(&mut self) {
        if self.client.is_connected() {
            self.client.disconnect().await;
        }
        if self.link.current() != LinkState::Failed {
            self.link.set(LinkState::Disconnected);
        }
    }

    fn attach(&mut self) -> Result<(), AdapterError> {
        let room = self.client.room_mut().ok_or(AdapterError::MissingRoom)?;
        if let Some(cache) = &self.cache {
            cache.attach(room);
        }
        self.epoch = self.epoch.next();
        self.quiet_session = true;
        self.link.set(LinkState::Active);
        tracing::info!(epoch = self.epoch.0, code = %self.target.game_code, "session active");
        Ok(())
    }

    async fn join_with_retry(&mut self, spawn: bool) -> Result<(), AdapterError> {
        let mut backoff = ReconnectState::new(self.config.clone());

        loop {
            match self.try_join(spawn).await {
                Ok(()) => return Ok(()),
                Err(err) => match backoff.next_delay() {
                    Some(delay) => {
                        self.events.warn(format!(
                            "{err}. Retrying {} more times.",
                            backoff.remaining()
                        ));
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(AdapterError::JoinBudgetExhausted {
                            attempts: backoff.failures(),
                            last: err,
                        });
                    }
                },
            }
        }
    }

    async fn try_join(&mut self, spawn: bool) -> Result<(), ProtocolError> {
        let rejoining = self.link.current() == LinkState::Rejoining;
        if !self.client.is_connected() {
            if !rejoining {
                self.link.set(LinkState::Connecting);
            }
            self.client.connect(&self.target.endpoint).await?;
            self.client.identify(&self.target.username).await?;
        }
        if !rejoining {
            self.link.set(LinkState::Joining);
        }
        self.client.join(&self.target.game_code, spawn).await
    }
}
