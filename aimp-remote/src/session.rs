//! The session controller
//!
//! [`SessionController`] owns the connection lifecycle and everything that
//! lives for the length of one session: the player client, the command
//! worker and the sync loops. The state store and the registered observers
//! outlive sessions; the store is cleared on every disconnect.
//!
//! ```rust,ignore
//! use aimp_remote::{SessionController, SyncParams};
//! use std::time::Duration;
//!
//! let controller = SessionController::new()?;
//! controller.add_listener(|event: &ConnectionEvent| println!("{:?}", event));
//! controller.connect("192.168.1.20", 38475, Duration::from_secs(5), SyncParams::default())?;
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use aimp_api::{ClientConfig, PlayState, PlayerApi, Playlist, Song, WebCtlClient};
use aimp_state::{Delivery, Dispatcher, NowPlaying, PlayerState, StateObserver, StateStore, SubscriptionId};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::budget::ErrorBudgetConfig;
use crate::config::{Endpoint, Settings, SyncParams};
use crate::connection::{ConnectionEvent, ConnectionListener, ConnectionStatus};
use crate::error::{Result, SessionError};
use crate::executor::{Command, CommandExecutor};
use crate::scope::SessionScope;
use crate::sync::loaders;
use crate::sync::SyncScheduler;
use crate::volume_ramp::{RampDirection, VolumeRamp, VolumeRampHandle, RAMP_STEP_INTERVAL};

const DEFAULT_CLIENT_NAME: &str = "aimp-remote";

/// Creates the player client for a session
///
/// The default connector talks HTTP through [`WebCtlClient`]; tests plug in
/// an in-memory player.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn PlayerApi>>;
}

/// Connector producing a [`WebCtlClient`]
#[derive(Debug, Clone, Copy, Default)]
pub struct WebCtlConnector;

impl Connector for WebCtlConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn PlayerApi>> {
        let config = ClientConfig::new(endpoint.host.clone(), endpoint.port)
            .with_timeout(endpoint.timeout)
            .with_client_name(endpoint.client_name.clone());
        Ok(Arc::new(WebCtlClient::with_config(config)?))
    }
}

/// Builder for [`SessionController`]
pub struct SessionBuilder {
    runtime: Option<Handle>,
    connector: Arc<dyn Connector>,
    delivery: Delivery,
    error_budget: ErrorBudgetConfig,
}

impl SessionBuilder {
    fn new() -> Self {
        Self {
            runtime: None,
            connector: Arc::new(WebCtlConnector),
            delivery: Delivery::default(),
            error_budget: ErrorBudgetConfig::default(),
        }
    }

    /// Runtime the session tasks are spawned on; defaults to the current one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Where observer and listener callbacks run
    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn error_budget(mut self, config: ErrorBudgetConfig) -> Self {
        self.error_budget = config;
        self
    }

    pub fn build(self) -> Result<SessionController> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                SessionError::Runtime(format!("No tokio runtime available: {}", e))
            })?,
        };

        if self.error_budget.threshold == 0 {
            return Err(SessionError::Configuration(
                "Error budget threshold must be greater than 0".to_string(),
            ));
        }

        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);

        Ok(SessionController {
            inner: Arc::new(Inner {
                runtime,
                connector: self.connector,
                error_budget: self.error_budget,
                store: Arc::new(StateStore::new(self.delivery)),
                listeners: Dispatcher::new(self.delivery, "aimp-connection"),
                emit_order: ReentrantMutex::new(()),
                lifecycle: Mutex::new(Lifecycle::default()),
                status_tx,
            }),
        })
    }
}

/// Workers of a session that made it to `Connected`
struct ActiveSession {
    scope: Arc<SessionScope>,
    executor: Option<CommandExecutor>,
    scheduler: Option<SyncScheduler>,
}

impl ActiveSession {
    async fn stop_workers(self) {
        if let Some(executor) = self.executor {
            executor.shutdown().await;
        }
        if let Some(scheduler) = self.scheduler {
            scheduler.shutdown().await;
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    status: ConnectionStatus,
    endpoint: Option<Endpoint>,
    session: Option<ActiveSession>,
    connect_task: Option<JoinHandle<()>>,
}

struct Inner {
    runtime: Handle,
    connector: Arc<dyn Connector>,
    error_budget: ErrorBudgetConfig,
    store: Arc<StateStore>,
    listeners: Dispatcher<ConnectionEvent>,
    /// Keeps listener notifications in transition order
    emit_order: ReentrantMutex<()>,
    lifecycle: Mutex<Lifecycle>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl Inner {
    /// Run `apply` under the lifecycle lock and announce a status change
    ///
    /// Listeners are called after the lock is released.
    fn transition<T>(&self, apply: impl FnOnce(&mut Lifecycle) -> Result<T>) -> Result<T> {
        let _order = self.emit_order.lock();

        let (result, before, after) = {
            let mut lifecycle = self.lifecycle.lock();
            let before = lifecycle.status;
            let result = apply(&mut *lifecycle);
            (result, before, lifecycle.status)
        };

        if before != after {
            info!("Connection status: {} -> {}", before, after);
            self.status_tx.send_replace(after);
            self.listeners
                .publish(vec![ConnectionEvent::StatusChanged(after)]);
        }
        result
    }

    fn emit(&self, event: ConnectionEvent) {
        let _order = self.emit_order.lock();
        self.listeners.publish(vec![event]);
    }

    fn request_disconnect(self: &Arc<Self>) -> Result<()> {
        let (session, connect_task) = self.transition(|lifecycle| {
            match lifecycle.status {
                ConnectionStatus::Disconnected => return Err(SessionError::NotConnected),
                ConnectionStatus::Disconnecting => return Err(SessionError::AlreadyDisconnecting),
                _ => {}
            }

            lifecycle.status = ConnectionStatus::Disconnecting;
            let session = lifecycle.session.take();
            if let Some(session) = &session {
                session.scope.shut_down();
            }
            Ok((session, lifecycle.connect_task.take()))
        })?;

        let inner = Arc::clone(self);
        self.runtime
            .spawn(async move { inner.teardown(session, connect_task).await });
        Ok(())
    }

    async fn teardown(self: Arc<Self>, session: Option<ActiveSession>, connect_task: Option<JoinHandle<()>>) {
        if let Some(task) = connect_task {
            task.abort();
            let _ = task.await;
        }

        if let Some(session) = session {
            session.stop_workers().await;
        }

        self.store.clear();

        let _ = self.transition(|lifecycle| {
            lifecycle.status = ConnectionStatus::Disconnected;
            lifecycle.endpoint = None;
            Ok(())
        });
    }

    async fn run_connect(self: Arc<Self>, scope: Arc<SessionScope>, endpoint: Endpoint, params: SyncParams) {
        let error = match self.connect_sequence(&scope, &endpoint, params).await {
            Ok(()) => {
                info!("Connected to {}:{}", endpoint.host, endpoint.port);
                return;
            }
            Err(error) => error,
        };

        match error {
            SessionError::Cancelled => {
                debug!("Connect to {} cancelled", endpoint.host);
                return;
            }
            SessionError::HostNotFound(host) => {
                warn!("Host not found: {}", host);
                self.emit(ConnectionEvent::HostNotFound { host });
            }
            SessionError::RemoteNotFound { host, port } => {
                warn!("No player answering at {}:{}", host, port);
                self.emit(ConnectionEvent::RemoteNotFound { host, port });
            }
            other => {
                warn!("Connect to {} failed: {}", endpoint.host, other);
                self.emit(ConnectionEvent::UnresolvedError(Arc::new(other)));
            }
        }

        if let Err(e) = self.request_disconnect() {
            debug!("Disconnect after failed connect not needed: {}", e);
        }
    }

    async fn connect_sequence(
        self: &Arc<Self>,
        scope: &Arc<SessionScope>,
        endpoint: &Endpoint,
        params: SyncParams,
    ) -> Result<()> {
        resolve_within(
            &endpoint.host,
            endpoint.timeout,
            tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port)),
        )
        .await?;
        scope.checkpoint()?;

        if !scope.api().ping().await {
            return Err(SessionError::RemoteNotFound {
                host: endpoint.host.clone(),
                port: endpoint.port,
            });
        }
        scope.checkpoint()?;

        self.transition(|lifecycle| {
            if scope.is_shut_down() || lifecycle.status != ConnectionStatus::Connecting {
                return Err(SessionError::Cancelled);
            }
            lifecycle.status = ConnectionStatus::Initializing;
            Ok(())
        })?;

        loaders::load_initial_state(scope.api(), scope.store()).await?;
        scope.checkpoint()?;

        self.transition(|lifecycle| {
            if scope.is_shut_down() || lifecycle.status != ConnectionStatus::Initializing {
                return Err(SessionError::Cancelled);
            }
            let session = lifecycle.session.as_mut().ok_or(SessionError::Cancelled)?;
            session.executor = Some(CommandExecutor::start(Arc::clone(scope), &self.runtime));
            session.scheduler = Some(SyncScheduler::start(Arc::clone(scope), params, &self.runtime));
            lifecycle.status = ConnectionStatus::Connected;
            Ok(())
        })
    }
}

/// Await a host lookup for at most `timeout`
///
/// Lookup errors, an empty address list and an expired timeout all mean
/// `HostNotFound`.
async fn resolve_within<I>(
    host: &str,
    timeout: Duration,
    lookup: impl Future<Output = io::Result<I>>,
) -> Result<()>
where
    I: Iterator<Item = SocketAddr>,
{
    let not_found = || SessionError::HostNotFound(host.to_string());

    let mut addresses = match time::timeout(timeout, lookup).await {
        Ok(Ok(addresses)) => addresses,
        Ok(Err(e)) => {
            debug!("Resolving {} failed: {}", host, e);
            return Err(not_found());
        }
        Err(_) => {
            debug!("Resolving {} timed out after {:?}", host, timeout);
            return Err(not_found());
        }
    };

    if addresses.next().is_none() {
        return Err(not_found());
    }
    Ok(())
}

/// Handle to the session engine
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Controller with default settings on the current tokio runtime
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start connecting to a player
    ///
    /// Parameter errors and a session that is not `Disconnected` are reported
    /// here; everything after that arrives through connection listeners.
    pub fn connect(
        &self,
        host: impl Into<String>,
        port: u16,
        timeout: Duration,
        params: SyncParams,
    ) -> Result<()> {
        let endpoint = Endpoint {
            host: host.into(),
            port,
            timeout,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        };
        self.start_session(endpoint, params)
    }

    /// Start connecting using a settings record
    pub fn connect_with(&self, settings: &Settings) -> Result<()> {
        self.start_session(settings.endpoint(), settings.sync_params())
    }

    fn start_session(&self, endpoint: Endpoint, params: SyncParams) -> Result<()> {
        endpoint.validate()?;
        params.validate()?;

        let status = self.status();
        if status.is_active() {
            return Err(SessionError::AlreadyActive(status));
        }

        let api = self.inner.connector.connect(&endpoint)?;

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let scope = Arc::new(SessionScope::new(
            api,
            Arc::clone(&self.inner.store),
            self.inner.error_budget,
            move |reason: &SessionError| {
                if let Some(inner) = weak.upgrade() {
                    warn!("{}; disconnecting", reason);
                    if let Err(e) = inner.request_disconnect() {
                        debug!("Disconnect on exhausted budget not needed: {}", e);
                    }
                }
            },
        ));

        self.inner.transition(|lifecycle| {
            if lifecycle.status.is_active() {
                return Err(SessionError::AlreadyActive(lifecycle.status));
            }

            info!("Connecting to {}:{}", endpoint.host, endpoint.port);
            lifecycle.status = ConnectionStatus::Connecting;
            lifecycle.endpoint = Some(endpoint.clone());
            lifecycle.session = Some(ActiveSession {
                scope: Arc::clone(&scope),
                executor: None,
                scheduler: None,
            });
            lifecycle.connect_task = Some(self.inner.runtime.spawn(Arc::clone(&self.inner).run_connect(
                scope,
                endpoint,
                params,
            )));
            Ok(())
        })
    }

    /// Begin tearing the session down
    ///
    /// Returns immediately; the final `Disconnected` status is announced to
    /// listeners once all session work has stopped.
    pub fn disconnect(&self) -> Result<()> {
        self.inner.request_disconnect()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lifecycle.lock().status
    }

    /// Receiver that always holds the latest status
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.inner.lifecycle.lock().endpoint.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn subscribe(&self, observer: impl StateObserver + 'static) -> SubscriptionId {
        self.inner.store.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.store.unsubscribe(id)
    }

    pub fn add_listener(&self, listener: impl ConnectionListener + 'static) -> SubscriptionId {
        self.inner
            .listeners
            .subscribe(move |event: &ConnectionEvent| listener.on_connection_event(event))
    }

    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Queue a command for the connected session
    ///
    /// Without a connected session the command is dropped.
    pub fn execute(&self, command: Command) {
        let lifecycle = self.inner.lifecycle.lock();
        let executor = lifecycle
            .session
            .as_ref()
            .and_then(|session| session.executor.as_ref())
            .filter(|_| lifecycle.status == ConnectionStatus::Connected);

        match executor {
            Some(executor) => {
                if !executor.submit(command) {
                    debug!("Command worker is gone, dropping command");
                }
            }
            None => debug!("Ignoring {} while {}", command.name(), lifecycle.status),
        }
    }

    pub fn play(&self) {
        self.execute(Command::Play)
    }

    pub fn stop(&self) {
        self.execute(Command::Stop)
    }

    pub fn pause(&self) {
        self.execute(Command::Pause)
    }

    pub fn next(&self) {
        self.execute(Command::Next)
    }

    pub fn previous(&self) {
        self.execute(Command::Previous)
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.execute(Command::SetRepeat(repeat))
    }

    pub fn set_shuffle(&self, shuffle: bool) {
        self.execute(Command::SetShuffle(shuffle))
    }

    pub fn set_mute(&self, mute: bool) {
        self.execute(Command::SetMute(mute))
    }

    pub fn set_volume(&self, volume: u8) {
        self.execute(Command::SetVolume(volume))
    }

    pub fn adjust_volume(&self, delta: i32) {
        self.execute(Command::AdjustVolume(delta))
    }

    pub fn change_song(&self, playlist_id: i64, song_position: i32) {
        self.execute(Command::ChangeSong {
            playlist_id,
            song_position,
        })
    }

    pub fn change_song_play_position(&self, seconds: u32) {
        self.execute(Command::ChangeSongPlayPosition(seconds))
    }

    pub fn remove_song(&self, playlist_id: i64, song_position: i32) {
        self.execute(Command::RemoveSong {
            playlist_id,
            song_position,
        })
    }

    /// Start a press-and-hold volume ramp
    ///
    /// The first step is applied right away; the ramp runs until the handle
    /// is stopped or dropped.
    pub fn start_volume_ramp(&self, direction: RampDirection) -> VolumeRampHandle {
        let controller = self.clone();
        let task = self.inner.runtime.spawn(async move {
            let mut ramp = VolumeRamp::new(direction);
            let mut interval = tokio::time::interval(RAMP_STEP_INTERVAL);
            loop {
                interval.tick().await;
                if !controller.is_connected() {
                    break;
                }
                controller.adjust_volume(ramp.next_step());
            }
        });
        VolumeRampHandle::new(direction, task)
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> PlayerState {
        self.inner.store.snapshot()
    }

    pub fn now_playing(&self) -> NowPlaying {
        self.inner.store.now_playing()
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.inner.store.playlists()
    }

    pub fn has_playlists(&self) -> bool {
        self.inner.store.has_playlists()
    }

    pub fn playlist(&self, id: i64) -> Option<Playlist> {
        self.inner.store.playlist(id)
    }

    /// Index of a playlist in the catalog
    pub fn playlist_position(&self, id: i64) -> Option<usize> {
        self.inner.store.read(|s| s.playlist_index(id))
    }

    pub fn current_playlist(&self) -> Option<Playlist> {
        self.inner.store.read(|s| s.current_playlist().cloned())
    }

    pub fn current_song(&self) -> Option<Song> {
        self.inner.store.read(|s| s.current_song().cloned())
    }

    pub fn current_song_position(&self) -> i32 {
        self.inner.store.read(|s| s.song_position)
    }

    pub fn play_state(&self) -> PlayState {
        self.inner.store.play_state()
    }

    /// Seconds into the current song; 0 while stopped
    pub fn play_position(&self) -> u32 {
        self.inner.store.read(|s| {
            if s.play_state == PlayState::Stopped {
                0
            } else {
                s.play_position
            }
        })
    }

    pub fn volume(&self) -> u8 {
        self.inner.store.volume()
    }

    pub fn is_shuffle(&self) -> bool {
        self.inner.store.read(|s| s.shuffle)
    }

    pub fn is_repeat(&self) -> bool {
        self.inner.store.read(|s| s.repeat)
    }

    pub fn is_mute(&self) -> bool {
        self.inner.store.read(|s| s.mute)
    }
}
