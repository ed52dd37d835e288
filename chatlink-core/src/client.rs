//! The connection engine
//!
//! One [`ChatClient`] drives at most one live session. A session is the
//! connected socket plus its receive and heartbeat tasks; it is installed
//! only after both handshake phases succeed and is torn down exactly once,
//! either by [`ChatClient::disconnect`] or by the receive loop on loss.

use crate::address;
use crate::dispatcher::{Dispatcher, LoopExit};
use crate::event::{ClientEvent, EventSink, EventStream};
use crate::handshake;
use crate::heartbeat::{self, HeartbeatState};
use crate::outbound::{self, now_millis};
use crate::reconnect::{self, ReconnectManager, SupervisorOutcome};
use crate::state::{ConnectionParams, ConnectionState};
use crate::store::{FsObjectStore, ObjectStore};
use crate::transport::{self, FrameWriter};
use chatlink_common::{ChatError, ClientConfig, Result};
use chatlink_protocol::{ChatCodec, Message};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Bound on the goodbye frame sent by a manual disconnect.
const GOODBYE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default location for received files, under the system temp dir.
const DEFAULT_STORE_DIR: &str = "chatlink/images";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Session {
    id: u64,
    params: ConnectionParams,
    writer: Arc<FrameWriter>,
    shutdown: watch::Sender<bool>,
    receiver: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

#[derive(Default)]
struct Link {
    state: ConnectionState,
    session: Option<Session>,
}

/// The running reconnection supervisor, if any. `active` holds its
/// generation until it either installs a session or gives up.
#[derive(Default)]
struct SupervisorSlot {
    active: Option<u64>,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    config: ClientConfig,
    store: Arc<dyn ObjectStore>,
    events: EventSink,
    link: Mutex<Link>,
    reconnect: Arc<Mutex<ReconnectManager>>,
    supervisor: Mutex<SupervisorSlot>,
    /// Held for the whole of one connect attempt
    connect_gate: tokio::sync::Mutex<()>,
    /// Bumped by every manual disconnect
    epoch: AtomicU64,
    next_id: AtomicU64,
}

/// Resets a half-open attempt back to `Disconnected` when the attempt ends
/// without installing a session, including when its future is dropped.
struct AttemptGuard<'a> {
    link: &'a Mutex<Link>,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut link = lock(self.link);
        if link.session.is_none() && link.state.is_connecting() {
            link.state = ConnectionState::Disconnected;
        }
    }
}

impl Inner {
    fn codec(&self) -> ChatCodec {
        ChatCodec::with_max_frame_size(self.config.max_frame_size)
    }

    fn set_state(&self, state: ConnectionState) {
        let mut link = lock(&self.link);
        debug!("State {} -> {}", link.state, state);
        link.state = state;
    }

    /// Run one connect attempt. `supervisor` is the generation of the
    /// reconnection supervisor making the attempt, if any.
    async fn establish(
        self: &Arc<Self>,
        params: ConnectionParams,
        supervisor: Option<u64>,
    ) -> Result<()> {
        let _gate = self
            .connect_gate
            .try_lock()
            .map_err(|_| ChatError::ConnectInProgress)?;
        let epoch = self.epoch.load(Ordering::SeqCst);

        {
            let mut link = lock(&self.link);
            if link.session.is_some() || link.state == ConnectionState::Connected {
                return Err(ChatError::AlreadyConnected);
            }
            link.state = ConnectionState::Connecting;
        }
        let _guard = AttemptGuard { link: &self.link };

        self.open_session(params, epoch, supervisor).await
    }

    async fn open_session(
        self: &Arc<Self>,
        params: ConnectionParams,
        epoch: u64,
        supervisor: Option<u64>,
    ) -> Result<()> {
        let config = &self.config;

        info!("Connecting to {}:{}", params.host, params.port);
        let stream =
            transport::tcp::connect(&params.host, params.port, config.connect_timeout).await?;
        let (mut reader, writer) = transport::split(stream, self.codec());
        let writer = writer.with_write_timeout(config.write_timeout);

        self.set_state(ConnectionState::HandshakingVersion);
        handshake::negotiate_version(
            &mut reader,
            &writer,
            &config.client_version,
            config.read_timeout,
        )
        .await?;

        self.set_state(ConnectionState::HandshakingUsername);
        handshake::register_username(&mut reader, &writer, &params.username, config.read_timeout)
            .await?;

        let writer = Arc::new(writer);
        let heartbeat_state = Arc::new(HeartbeatState::new(
            config.heartbeat_interval,
            config.heartbeat_timeout_factor,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut link = lock(&self.link);
        {
            let mut manager = lock(&self.reconnect);
            if self.epoch.load(Ordering::SeqCst) != epoch {
                info!("Connect to {} superseded by disconnect", params);
                return Err(ChatError::Cancelled);
            }
            manager.on_connected(params.clone());
        }
        if let Some(generation) = supervisor {
            let mut slot = lock(&self.supervisor);
            if slot.active == Some(generation) {
                slot.active = None;
            }
        }

        link.state = ConnectionState::Connected;
        // Emitted before the tasks start so it precedes every message event.
        self.events.emit(ClientEvent::Connected);

        let span = info_span!("session", id, user = %params.username);

        let heartbeat = tokio::spawn(
            heartbeat::run(
                Arc::clone(&heartbeat_state),
                Arc::clone(&writer),
                shutdown_rx.clone(),
            )
            .instrument(span.clone()),
        );

        let dispatcher = Dispatcher::new(
            self.events.clone(),
            Arc::clone(&self.store),
            heartbeat_state,
            config.read_timeout,
        );
        let weak = Arc::downgrade(self);
        let mut shutdown = shutdown_rx;
        let receiver = tokio::spawn(
            async move {
                let exit = dispatcher.run(&mut reader, &mut shutdown).await;
                drop(reader);
                if let LoopExit::Lost(reason) = exit {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_connection_lost(id, reason).await;
                    }
                }
            }
            .instrument(span),
        );

        info!("Connected to {}", params);
        link.session = Some(Session {
            id,
            params,
            writer,
            shutdown: shutdown_tx,
            receiver,
            heartbeat,
        });
        Ok(())
    }

    /// Called from the receive task of session `id` when its loop ends on
    /// its own. A session already taken by `disconnect` is left alone.
    async fn on_connection_lost(self: &Arc<Self>, id: u64, reason: ChatError) {
        let session = {
            let mut link = lock(&self.link);
            match link.session.take() {
                Some(session) if session.id == id => session,
                other => {
                    link.session = other;
                    return;
                }
            }
        };

        warn!("Connection to {} lost: {}", session.params, reason);

        let Session {
            writer,
            shutdown,
            heartbeat,
            ..
        } = session;
        let _ = shutdown.send(true);
        stop(heartbeat, "heartbeat").await;
        writer.close().await;

        self.set_state(ConnectionState::Disconnected);
        self.events.emit(ClientEvent::Disconnected);

        self.spawn_supervisor();
    }

    fn spawn_supervisor(self: &Arc<Self>) {
        let mut slot = lock(&self.supervisor);
        if slot.active.is_some() {
            debug!("Reconnection already in progress");
            return;
        }
        if lock(&self.reconnect).next_params().is_none() {
            info!("Automatic reconnection not available");
            return;
        }

        let generation = self.next_id.fetch_add(1, Ordering::SeqCst);
        slot.active = Some(generation);

        let weak = Arc::downgrade(self);
        let manager = Arc::clone(&self.reconnect);
        let events = self.events.clone();
        let delay = self.config.reconnect_delay;

        let task = async move {
            let outcome = reconnect::supervise(&manager, delay, |params| {
                let inner = weak.upgrade();
                async move {
                    match inner {
                        Some(inner) => inner.establish(params, Some(generation)).await,
                        None => Err(ChatError::Cancelled),
                    }
                }
            })
            .await;

            match outcome {
                SupervisorOutcome::Reconnected { attempt } => {
                    debug!("Supervisor finished after attempt {}", attempt);
                }
                SupervisorOutcome::Exhausted { attempts } => {
                    let err = ChatError::ReconnectExhausted { attempts };
                    error!("{}", err);
                    events.emit(ClientEvent::Error(err.to_string()));
                }
                SupervisorOutcome::Suppressed => debug!("Reconnection suppressed"),
            }

            if let Some(inner) = weak.upgrade() {
                let mut slot = lock(&inner.supervisor);
                if slot.active == Some(generation) {
                    slot.active = None;
                }
            }
        };

        slot.handle = Some(tokio::spawn(task.instrument(info_span!("reconnect"))));
    }

    /// Abort the supervisor, if any, and wait until it is gone.
    async fn cancel_supervisor(&self) {
        let handle = {
            let mut slot = lock(&self.supervisor);
            slot.active = None;
            slot.handle.take()
        };
        if let Some(handle) = handle {
            stop(handle, "reconnect").await;
        }
    }

    fn report_failure(&self, err: &ChatError) {
        error!("Connect failed: {}", err);
        match err {
            ChatError::VersionRejected { required_version } => self
                .events
                .emit(ClientEvent::VersionMismatch(required_version.clone())),
            other => self.events.emit(ClientEvent::Error(other.to_string())),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self
            .supervisor
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }

        let link = self.link.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = link.session.take() {
            let _ = session.shutdown.send(true);
        }
    }
}

/// Abort a task that may be parked on a stalled write, then reap it.
async fn stop(handle: JoinHandle<()>, task: &str) {
    handle.abort();
    join(handle, task).await;
}

async fn join(handle: JoinHandle<()>, task: &str) {
    if let Err(e) = handle.await {
        if e.is_panic() {
            error!("{} task panicked: {}", task, e);
        }
    }
}

/// Chat client engine. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<Inner>,
}

impl ChatClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect and complete the handshake.
    ///
    /// `host` may carry a scheme, path and port (see [`address::normalize`]).
    /// On failure exactly one [`ClientEvent::Error`] or
    /// [`ClientEvent::VersionMismatch`] is emitted and the same error is
    /// returned. A pending automatic reconnection is cancelled first.
    pub async fn connect(&self, host: &str, port: u16, username: &str) -> Result<()> {
        let result = self.try_connect(host, port, username).await;
        if let Err(e) = &result {
            self.inner.report_failure(e);
        }
        result
    }

    async fn try_connect(&self, host: &str, port: u16, username: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ChatError::Config("username is required".into()));
        }
        let (host, port) = address::normalize(host, port);
        if host.is_empty() {
            return Err(ChatError::Config("host is required".into()));
        }
        if port == 0 {
            return Err(ChatError::Config("port must be in 1..=65535".into()));
        }

        self.inner.cancel_supervisor().await;
        self.inner
            .establish(ConnectionParams::new(host, port, username), None)
            .await
    }

    /// Close the connection and turn off automatic reconnection.
    ///
    /// When this returns, the session's tasks have finished and no
    /// reconnection attempt is pending. Idempotent.
    pub async fn disconnect(&self) {
        let inner = &self.inner;

        {
            let mut manager = lock(&inner.reconnect);
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            manager.suppress();
        }
        inner.cancel_supervisor().await;

        let session = lock(&inner.link).session.take();
        let Some(session) = session else {
            debug!("Disconnect with no active session");
            return;
        };

        info!("Disconnecting from {}", session.params);
        let Session {
            params,
            writer,
            shutdown,
            receiver,
            heartbeat,
            ..
        } = session;

        let goodbye = Message::disconnect(params.username);
        match timeout(GOODBYE_TIMEOUT, writer.send(&goodbye)).await {
            Ok(Ok(())) => debug!("Sent disconnect notice"),
            Ok(Err(e)) => debug!("Disconnect notice not sent: {}", e),
            Err(_) => debug!("Disconnect notice timed out"),
        }

        let _ = shutdown.send(true);
        stop(heartbeat, "heartbeat").await;
        writer.close().await;
        join(receiver, "receive").await;

        inner.set_state(ConnectionState::Disconnected);
        inner.events.emit(ClientEvent::Disconnected);
    }

    fn live_writer(&self) -> Result<Arc<FrameWriter>> {
        let link = lock(&self.inner.link);
        match (&link.state, &link.session) {
            (ConnectionState::Connected, Some(session)) => Ok(Arc::clone(&session.writer)),
            _ => Err(ChatError::NotConnected),
        }
    }

    fn obfuscate(&self, original: &str) -> String {
        outbound::obfuscated_file_name(
            &mut rand::thread_rng(),
            original,
            self.inner.config.obfuscated_name_len,
        )
    }

    pub async fn send_text_message(&self, content: &str) -> Result<()> {
        let writer = self.live_writer()?;
        writer
            .send(&outbound::text_message(content, now_millis()))
            .await
    }

    /// Send image bytes. The real name travels only in `original_file_name`.
    pub async fn send_image_message(&self, bytes: &[u8], file_name: &str) -> Result<()> {
        let writer = self.live_writer()?;
        let wire_name = self.obfuscate(file_name);
        debug!("Sending image {} as {}", file_name, wire_name);
        writer
            .send(&outbound::image_message(
                file_name,
                wire_name,
                bytes,
                now_millis(),
            ))
            .await
    }

    /// Read `path` and send it as a file of `file_type`.
    pub async fn send_file_message(
        &self,
        path: impl AsRef<Path>,
        file_name: &str,
        file_type: &str,
    ) -> Result<()> {
        let writer = self.live_writer()?;
        let path = path.as_ref();

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ChatError::FileNotFound(path.to_path_buf())
            } else {
                ChatError::Io(e)
            }
        })?;

        let wire_name = self.obfuscate(file_name);
        debug!("Sending file {} ({} bytes) as {}", file_name, bytes.len(), wire_name);
        writer
            .send(&outbound::file_message(
                file_name,
                wire_name,
                file_type,
                &bytes,
                now_millis(),
            ))
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.link).state
    }

    /// Automatic attempts spent since the last successful handshake.
    pub fn reconnect_attempts(&self) -> u32 {
        lock(&self.inner.reconnect).attempts()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

/// Builder for [`ChatClient`]
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn ObjectStore>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub fn heartbeat_timeout_factor(mut self, factor: u32) -> Self {
        self.config.heartbeat_timeout_factor = factor;
        self
    }

    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.config.client_version = version.into();
        self
    }

    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Where received files are stored. Defaults to a directory under the
    /// system temp dir.
    #[must_use]
    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration and create the client together with the
    /// stream its events are delivered on.
    pub fn build(self) -> Result<(ChatClient, EventStream)> {
        self.config.validate()?;

        let store = self.store.unwrap_or_else(|| {
            Arc::new(FsObjectStore::new(std::env::temp_dir().join(DEFAULT_STORE_DIR)))
        });
        let (events, stream) = EventSink::channel();
        let max_attempts = self.config.max_reconnect_attempts;

        let inner = Inner {
            config: self.config,
            store,
            events,
            link: Mutex::new(Link::default()),
            reconnect: Arc::new(Mutex::new(ReconnectManager::new(max_attempts))),
            supervisor: Mutex::new(SupervisorSlot::default()),
            connect_gate: tokio::sync::Mutex::new(()),
            epoch: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
        };

        Ok((
            ChatClient {
                inner: Arc::new(inner),
            },
            stream,
        ))
    }
}
