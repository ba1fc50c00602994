//! Reconnecting WebSocket transport.
//!
//! ```text
//!   connect() ──► Connecting ──open──► Open ──close──┬──► ClosedRetrying ──timer──► Connecting
//!                     │                              │
//!                     └──────────fail────────────────┴──► ClosedFinal (budget spent)
//!   disconnect() from any state ──► ClosedFinal
//! ```
//!
//! Every transport task is tagged with a generation number. `connect`,
//! `disconnect` and each retry bump the generation, so a superseded task
//! can still finish its own I/O but can no longer deliver messages or
//! change the connection state.
//!
//! The public operations never fail: connection problems show up as state
//! transitions and log lines, and `send` reports whether the frame was
//! handed to a live socket.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::backoff::{CloseOutcome, ReconnectPolicy, ReconnectSupervisor};
use crate::protocol::{ClientMessage, OutgoingMessage, ProtocolError, Role, ServerMessage};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Closed; a reconnect timer is pending.
    ClosedRetrying,
    /// Closed; nothing happens until `connect()` is called.
    ClosedFinal,
}

/// Why a transport task ended.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not connect: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("transport error: {0}")]
    Transport(#[source] tungstenite::Error),
    #[error("connection closed by server")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Full WebSocket URL, e.g. `ws://localhost:8787/events/abc123/ws`.
    pub url: String,
    pub session_id: String,
    pub role: Role,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub base_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::from("ws://localhost:8787"),
            session_id: String::new(),
            role: Role::Participant,
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            base_reconnect_delay: Duration::from_millis(1000),
            max_reconnect_delay: Duration::from_millis(30_000),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>, role: Role) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
            role,
            ..Self::default()
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.auto_reconnect,
            max_attempts: self.max_reconnect_attempts,
            base_delay: self.base_reconnect_delay,
            max_delay: self.max_reconnect_delay,
        }
    }
}

/// Mutable half of the connection, guarded by one mutex.
struct Link {
    generation: u64,
    supervisor: ReconnectSupervisor,
    /// Cancels the live transport task.
    transport: Option<CancellationToken>,
    /// Writer queue of the live transport; `Some` only while open.
    outgoing: Option<mpsc::UnboundedSender<Message>>,
    retry_timer: Option<JoinHandle<()>>,
}

struct Inner {
    config: ConnectionConfig,
    link: Mutex<Link>,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: mpsc::UnboundedSender<ServerMessage>,
}

/// One logical connection to the event backend.
///
/// Must be used from within a Tokio runtime. Dropping it disconnects.
pub struct RealtimeConnection {
    inner: Arc<Inner>,
    event_rx: Option<mpsc::UnboundedReceiver<ServerMessage>>,
}

impl RealtimeConnection {
    pub fn new(config: ConnectionConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::ClosedFinal);
        let supervisor = ReconnectSupervisor::new(config.reconnect_policy());
        Self {
            inner: Arc::new(Inner {
                config,
                link: Mutex::new(Link {
                    generation: 0,
                    supervisor,
                    transport: None,
                    outgoing: None,
                    retry_timer: None,
                }),
                state_tx,
                event_tx,
            }),
            event_rx: Some(event_rx),
        }
    }

    /// Decoded inbound messages, in arrival order. Can be taken once.
    pub fn take_event_rx(&mut self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.event_rx.take()
    }

    /// Open the transport. No-op while already open; otherwise any
    /// in-flight attempt or pending retry is superseded.
    pub fn connect(&self) {
        let mut link = self.inner.lock_link();
        if self.state() == ConnectionState::Open {
            log::debug!("connect() ignored: already open");
            return;
        }
        self.inner.start_transport(&mut link);
    }

    /// Send a message with this connection's session id attached.
    ///
    /// Returns `false` (and logs a warning) when the connection is not open.
    /// Nothing is queued for later.
    pub fn send(&self, message: OutgoingMessage) -> bool {
        let link = self.inner.lock_link();
        let outgoing = match &link.outgoing {
            Some(tx) if self.state() == ConnectionState::Open => tx,
            _ => {
                log::warn!("WebSocket is not connected; dropping outgoing message");
                return false;
            }
        };
        match message.with_session(&self.inner.config.session_id).encode() {
            Ok(text) => outgoing.send(Message::Text(text.into())).is_ok(),
            Err(e) => {
                log::warn!("Failed to encode outgoing message: {e}");
                false
            }
        }
    }

    /// Cancel any pending retry and close the live transport. Idempotent.
    pub fn disconnect(&self) {
        let mut link = self.inner.lock_link();
        link.generation += 1;
        if let Some(timer) = link.retry_timer.take() {
            timer.abort();
        }
        if let Some(token) = link.transport.take() {
            token.cancel();
        }
        link.outgoing = None;
        if self.state() != ConnectionState::ClosedFinal {
            log::info!("Disconnected from {}", self.inner.config.url);
        }
        self.inner.set_state(ConnectionState::ClosedFinal);
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Automatic retries used since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock_link().supervisor.attempts()
    }

    /// True while a reconnect timer is scheduled.
    pub fn has_pending_retry(&self) -> bool {
        self.inner
            .lock_link()
            .retry_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn session_id(&self) -> &str {
        &self.inner.config.session_id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl Inner {
    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Supersede whatever transport exists and spawn a fresh one.
    fn start_transport(self: &Arc<Self>, link: &mut Link) {
        link.generation += 1;
        let generation = link.generation;
        if let Some(timer) = link.retry_timer.take() {
            timer.abort();
        }
        if let Some(token) = link.transport.take() {
            token.cancel();
        }
        link.outgoing = None;

        let token = CancellationToken::new();
        link.transport = Some(token.clone());
        self.set_state(ConnectionState::Connecting);
        log::info!("Connecting to {}", self.config.url);

        tokio::spawn(Arc::clone(self).run_transport(generation, token));
    }

    async fn run_transport(self: Arc<Self>, generation: u64, token: CancellationToken) {
        match self.drive(generation, &token).await {
            Ok(()) => log::debug!("Transport {generation} stopped"),
            Err(e) => {
                log::warn!("Connection to {} lost: {e}", self.config.url);
                self.handle_close(generation);
            }
        }
    }

    /// Runs one transport until it fails (`Err`) or is cancelled (`Ok`).
    async fn drive(&self, generation: u64, token: &CancellationToken) -> Result<(), ConnectionError> {
        let (stream, _) = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            result = connect_async(self.config.url.as_str()) => result.map_err(ConnectionError::Connect)?,
        };
        if token.is_cancelled() || !self.is_current(generation) {
            // Superseded during the handshake; leave without joining.
            return Ok(());
        }
        let (mut writer, mut reader) = stream.split();

        let join = ClientMessage::Join {
            session_id: self.config.session_id.clone(),
            role: self.config.role,
        }
        .encode()?;
        writer
            .send(Message::Text(join.into()))
            .await
            .map_err(ConnectionError::Transport)?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        if !self.mark_open(generation, out_tx) {
            let _ = writer.close().await;
            return Ok(());
        }

        let ping = ClientMessage::Ping {
            session_id: self.config.session_id.clone(),
        }
        .encode()?;
        let period = self.config.heartbeat_interval.max(Duration::from_millis(1));
        let mut heartbeat = tokio::time::interval(period);
        // Skip the immediate first tick.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    let _ = writer.close().await;
                    return Ok(());
                }
                frame = reader.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.deliver(generation, ServerMessage::decode(text.as_str()));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        self.deliver(generation, ServerMessage::decode_bytes(&bytes));
                    }
                    Some(Ok(Message::Close(_))) | None => return Err(ConnectionError::Closed),
                    Some(Ok(_)) => {} // control frames are answered by tungstenite
                    Some(Err(e)) => return Err(ConnectionError::Transport(e)),
                },
                Some(frame) = out_rx.recv() => {
                    writer.send(frame).await.map_err(ConnectionError::Transport)?;
                }
                _ = heartbeat.tick() => {
                    log::debug!("Heartbeat ping");
                    writer
                        .send(Message::Text(ping.clone().into()))
                        .await
                        .map_err(ConnectionError::Transport)?;
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_link().generation == generation
    }

    fn mark_open(&self, generation: u64, outgoing: mpsc::UnboundedSender<Message>) -> bool {
        let mut link = self.lock_link();
        if link.generation != generation {
            return false;
        }
        link.supervisor.on_open();
        link.outgoing = Some(outgoing);
        self.set_state(ConnectionState::Open);
        log::info!("Connected to {} as {:?}", self.config.url, self.config.role);
        true
    }

    fn deliver(&self, generation: u64, decoded: Result<ServerMessage, ProtocolError>) {
        match decoded {
            Ok(message) => {
                if self.lock_link().generation != generation {
                    return;
                }
                log::debug!("Received {}", message.kind());
                // Receiver gone means nobody is listening; nothing to do.
                let _ = self.event_tx.send(message);
            }
            Err(e) => log::warn!("Dropping undecodable frame: {e}"),
        }
    }

    fn handle_close(self: &Arc<Self>, generation: u64) {
        let mut link = self.lock_link();
        if link.generation != generation {
            return;
        }
        link.transport = None;
        link.outgoing = None;

        match link.supervisor.on_close() {
            CloseOutcome::Retry { attempt, delay } => {
                log::info!(
                    "Reconnecting in {}ms (attempt {attempt}/{})",
                    delay.as_millis(),
                    link.supervisor.policy().max_attempts
                );
                self.set_state(ConnectionState::ClosedRetrying);
                let inner = Arc::clone(self);
                link.retry_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.retry(generation);
                }));
            }
            CloseOutcome::Final => {
                log::warn!("Giving up on {}: reconnect budget spent", self.config.url);
                self.set_state(ConnectionState::ClosedFinal);
            }
        }
    }

    fn retry(self: &Arc<Self>, generation: u64) {
        let mut link = self.lock_link();
        if link.generation != generation {
            return;
        }
        // This task is the timer; let it finish instead of aborting it.
        link.retry_timer = None;
        self.start_transport(&mut link);
    }
}
