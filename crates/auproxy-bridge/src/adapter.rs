//! Public-lobby adapter: owns the run loop that ties the session lifecycle to
//! the event translator.
//!
//! A single tokio task owns the [`ReconnectManager`] (and through it the
//! client, the live room and the object cache) together with the
//! [`EventTranslator`]. It selects over the shutdown signal, fired meeting
//! delays and the next client event. Rejoins are awaited inline, so cached
//! objects are re-attached before the translator sees the new session.

use std::time::Duration;

use auproxy_config::{Config, Region};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::AdapterError;
use crate::events::{AdapterEvent, EventSink};
use crate::meeting_delay::{DEFAULT_MEETING_GRACE, Deferred, MeetingDelay};
use crate::protocol::{ClientEvent, MasterEndpoint, ProtocolClient};
use crate::reconnect::{
    JoinTarget, LinkState, ReconnectConfig, ReconnectManager, RejoinMode, SyncTimeouts,
    master_endpoint,
};
use crate::translator::{Directive, EventTranslator};

/// How long `destroy` waits for the run loop before aborting it.
const DESTROY_TIMEOUT: Duration = Duration::from_secs(5);

/// Name the bridge identifies with.
pub const DEFAULT_USERNAME: &str = "auproxy";

/// Everything needed to start an adapter.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Room code to join.
    pub game_code: String,
    /// Master server to connect to.
    pub endpoint: MasterEndpoint,
    /// Name sent when identifying.
    pub username: String,
    /// Join retry budget and backoff.
    pub reconnect: ReconnectConfig,
    /// Delay before meeting outcomes are applied.
    pub meeting_grace: Duration,
    /// Limits for the warm-up synchronization stages.
    pub timeouts: SyncTimeouts,
}

impl AdapterOptions {
    /// Options for `game_code` in `region` with default behaviour.
    pub fn new(game_code: impl Into<String>, region: Region) -> Self {
        Self {
            game_code: game_code.into().to_uppercase(),
            endpoint: master_endpoint(region),
            username: DEFAULT_USERNAME.to_string(),
            reconnect: ReconnectConfig::default(),
            meeting_grace: DEFAULT_MEETING_GRACE,
            timeouts: SyncTimeouts::default(),
        }
    }

    /// Options built from the loaded configuration.
    ///
    /// Embedding the bridge in a binary:
    ///
    /// ```no_run
    /// use auproxy_bridge::{AdapterOptions, ProtocolClient, PublicLobbyAdapter};
    /// use auproxy_config::{CliArgs, Config, default_config_dir, default_log_dir};
    /// use clap::Parser;
    ///
    /// async fn run_bridge(client: impl ProtocolClient) -> Result<(), Box<dyn std::error::Error>> {
    ///     let args = CliArgs::parse();
    ///     let config_dir = match &args.config {
    ///         Some(dir) => dir.clone(),
    ///         None => default_config_dir()?,
    ///     };
    ///     let mut config = Config::load_or_create(&config_dir)?;
    ///     config.apply_cli_overrides(&args);
    ///
    ///     let log_dir = default_log_dir().ok();
    ///     auproxy_log::init_logging(log_dir.as_deref(), config.debug.log_to_file, Some(&config));
    ///
    ///     let (mut adapter, mut events) =
    ///         PublicLobbyAdapter::start(client, AdapterOptions::from_config(&config));
    ///     while let Some(event) = events.recv().await {
    ///         tracing::info!(?event, "lobby event");
    ///     }
    ///     adapter.destroy().await;
    ///     Ok(())
    /// }
    /// ```
    pub fn from_config(config: &Config) -> Self {
        let username = if config.lobby.username.trim().is_empty() {
            DEFAULT_USERNAME.to_string()
        } else {
            config.lobby.username.clone()
        };

        Self {
            username,
            reconnect: ReconnectConfig::from(&config.reconnect),
            meeting_grace: Duration::from_millis(config.timing.meeting_grace_ms),
            timeouts: SyncTimeouts {
                spawn: config.timing.spawn_timeout_secs.map(Duration::from_secs),
                settings: config.timing.settings_timeout_secs.map(Duration::from_secs),
            },
            ..Self::new(config.lobby.game_code.as_str(), config.lobby.region)
        }
    }
}

/// Handle of a running adapter.
///
/// Dropping the handle without calling [`destroy`](Self::destroy) also stops
/// the run loop, without waiting for it.
pub struct PublicLobbyAdapter {
    code: String,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    state: watch::Receiver<LinkState>,
}

impl PublicLobbyAdapter {
    /// Spawn the run loop for `client` and return the handle together with
    /// the receiver of downstream events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<C: ProtocolClient>(
        client: C,
        options: AdapterOptions,
    ) -> (Self, mpsc::UnboundedReceiver<AdapterEvent>) {
        let (events, rx) = EventSink::channel();
        let code = options.game_code.clone();

        let manager = ReconnectManager::new(
            client,
            JoinTarget {
                game_code: options.game_code,
                endpoint: options.endpoint,
                username: options.username,
            },
            options.reconnect,
            options.timeouts,
            events.clone(),
        );
        let state = manager.link().subscribe();

        let (meetings, deferred) = MeetingDelay::new(options.meeting_grace);
        let translator = EventTranslator::new(events, meetings);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(manager, translator, deferred, shutdown_rx));

        tracing::info!(code = %code, "Initialized public lobby adapter");
        (
            Self {
                code,
                shutdown_tx,
                task: Some(task),
                state,
            },
            rx,
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle changes.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Stop the run loop, disconnect and wait for teardown. Calling it again
    /// does nothing.
    pub async fn destroy(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(DESTROY_TIMEOUT, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "run loop ended abnormally"),
            Err(_) => {
                tracing::warn!("run loop did not stop in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }
        tracing::info!(code = %self.code, "Destroyed public lobby adapter");
    }
}

/// Resolves once shutdown was requested or the handle was dropped.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn start_session<C: ProtocolClient>(
    manager: &mut ReconnectManager<C>,
    translator: &mut EventTranslator,
) -> Result<(), AdapterError> {
    let warm_up = manager.warm_up().await?;
    translator.apply_warm_up(&warm_up);
    manager.establish().await?;
    if let Some(session) = manager.session() {
        translator.begin_session(session);
    }
    Ok(())
}

async fn run<C: ProtocolClient>(
    mut manager: ReconnectManager<C>,
    mut translator: EventTranslator,
    mut deferred: mpsc::UnboundedReceiver<Deferred>,
    mut shutdown: watch::Receiver<bool>,
) {
    let started = tokio::select! {
        result = start_session(&mut manager, &mut translator) => Some(result),
        _ = shutdown_requested(&mut shutdown) => None,
    };
    match started {
        Some(Ok(())) => {}
        Some(Err(err)) => {
            manager.fail(&err);
            manager.shutdown().await;
            return;
        }
        None => {
            manager.shutdown().await;
            return;
        }
    }

    loop {
        let directive = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            Some(fired) = deferred.recv() => {
                if let Some(session) = manager.session() {
                    translator.on_deferred(fired, session);
                }
                Directive::Continue
            }
            event = manager.next_event() => match event {
                Some(event) => {
                    if !matches!(event, ClientEvent::Disconnected { .. }) {
                        manager.note_activity();
                    }
                    match manager.session() {
                        Some(session) => translator.handle(&event, session),
                        None => Directive::Continue,
                    }
                }
                None => {
                    tracing::warn!("client event stream closed");
                    Directive::Reconnect
                }
            },
        };

        let mode = match directive {
            Directive::Continue => continue,
            Directive::RejoinLobby => RejoinMode::Lobby,
            Directive::Reconnect => RejoinMode::Reconnect,
        };

        translator.end_session();
        let rejoined = tokio::select! {
            result = manager.rejoin(mode) => result,
            _ = shutdown_requested(&mut shutdown) => break,
        };
        if let Err(err) = rejoined {
            manager.fail(&err);
            break;
        }
        if let Some(session) = manager.session() {
            translator.begin_session(session);
            translator.announce_host(session.room);
        }
    }

    translator.end_session();
    manager.shutdown().await;
}
