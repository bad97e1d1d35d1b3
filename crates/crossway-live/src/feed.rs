//! Connection lifecycle manager for the simulation feed.
//!
//! [`LiveFeed`] keeps at most one logical connection open, reconnects with
//! exponential back-off after unexpected closures, and fans events out to
//! subscribers through [`Listeners`].
//!
//! # State machine
//!
//! ```text
//!                connect()            open ok
//! Disconnected ───────────► Connecting ───────► Connected
//!      ▲  ▲                     │                   │
//!      │  │ timer fires         │ open failed       │ abnormal close
//!      │  └─────────────────────┴───────────────────┤
//!      │                                            │ disconnect()
//!      │               handshake done               ▼
//!      └────────────────────────────────────────── Closing
//!
//! Disconnected ──(budget exhausted)──► Failed
//! ```
//!
//! Every session and reconnect timer carries the generation number that was
//! current when it started. [`LiveFeed::connect`] and
//! [`LiveFeed::disconnect`] bump the generation, so a stale timer or session
//! that wakes up afterwards sees the mismatch and does nothing. A session
//! the caller asked to close never schedules a reconnect, however it ends.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crossway_types::ConnectionState;

use crate::backoff::ReconnectPolicy;
use crate::error::{LiveError, TransportError};
use crate::listeners::{Listeners, Subscription};
use crate::transport::{Connection, Frame, NORMAL_CLOSURE, Transport, is_normal_closure};

/// Commands from the feed handle to the running session.
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close(u16),
}

/// How a session ended.
#[derive(Debug)]
enum SessionEnd {
    /// The peer sent a close frame, or the stream ended.
    PeerClosed(Option<u16>),
    /// We sent a close frame on request.
    LocalClose,
    /// I/O failed.
    Failed(TransportError),
}

#[derive(Debug, Default)]
struct Inner {
    endpoint: Option<String>,
    attempts: u32,
    generation: u64,
    /// Set by `disconnect()` on an open session; cleared per session.
    close_requested: bool,
    reconnect: Option<JoinHandle<()>>,
    session: Option<JoinHandle<()>>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

struct Shared<T: Transport> {
    transport: T,
    policy: ReconnectPolicy,
    listeners: Listeners,
    state: watch::Sender<ConnectionState>,
    inner: Mutex<Inner>,
}

impl<T: Transport> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "connection state changed");
        }
    }
}

/// A live, reconnecting connection to the simulation feed.
///
/// Cloning yields another handle to the same connection.
pub struct LiveFeed<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for LiveFeed<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> fmt::Debug for LiveFeed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveFeed")
            .field("state", &self.state())
            .field("attempts", &self.reconnect_attempts())
            .field("listeners", &self.shared.listeners)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> LiveFeed<T> {
    /// Create a disconnected feed.
    pub fn new(transport: T, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                transport,
                policy,
                listeners: Listeners::new(),
                state,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open a connection to `endpoint`.
    ///
    /// Does nothing while a connection is being opened or is open. Cancels
    /// any pending reconnect timer otherwise. A connection still closing is
    /// abandoned and reported closed before the new one opens. Must be
    /// called from within a Tokio runtime.
    pub fn connect(&self, endpoint: &str) {
        let mut inner = self.shared.lock();
        let state = self.shared.state();
        if state.is_active() {
            debug!(endpoint, %state, "connect ignored; feed already active");
            return;
        }
        let superseded = state == ConnectionState::Closing;
        inner.endpoint = Some(endpoint.to_owned());
        start_session(&self.shared, &mut inner);
        drop(inner);

        if superseded {
            debug!("closing session superseded by connect");
            self.shared.listeners.notify_connection(false);
        }
    }

    /// Close the connection with a normal-closure code and stop
    /// reconnecting.
    ///
    /// A live connection passes through [`ConnectionState::Closing`] while
    /// the close frame is sent. The reconnect counter is reset.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        if let Some(timer) = inner.reconnect.take() {
            timer.abort();
        }
        inner.attempts = 0;

        let state = self.shared.state();
        match state {
            ConnectionState::Connected => {
                let sent = inner
                    .outbound
                    .as_ref()
                    .is_some_and(|tx| tx.send(Outbound::Close(NORMAL_CLOSURE)).is_ok());
                if sent {
                    inner.close_requested = true;
                    self.shared.set_state(ConnectionState::Closing);
                    info!("live feed closing");
                    return;
                }
                inner.generation = inner.generation.wrapping_add(1);
                drop_session(&mut inner);
                self.shared.set_state(ConnectionState::Disconnected);
                drop(inner);
                self.shared.listeners.notify_connection(false);
            }
            ConnectionState::Closing => {}
            ConnectionState::Connecting
            | ConnectionState::Disconnected
            | ConnectionState::Failed => {
                inner.generation = inner.generation.wrapping_add(1);
                drop_session(&mut inner);
                self.shared.set_state(ConnectionState::Disconnected);
                info!("live feed disconnected");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Whether the connection is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Reconnect attempts made since the last successful open or
    /// [`disconnect`](Self::disconnect).
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().attempts
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Queue a text frame. Returns `false` when not connected.
    pub fn send(&self, text: impl Into<String>) -> bool {
        if !self.is_connected() {
            warn!("live feed not connected; message dropped");
            return false;
        }
        let inner = self.shared.lock();
        inner
            .outbound
            .as_ref()
            .is_some_and(|tx| tx.send(Outbound::Text(text.into())).is_ok())
    }

    /// Serialize `message` as JSON and queue it. Returns `false` when not
    /// connected or when serialization fails.
    pub fn send_json<M: Serialize>(&self, message: &M) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.send(text),
            Err(err) => {
                warn!(error = %err, "outbound message not serializable");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register a handler called with `true` on open and `false` on close.
    pub fn on_connection_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.shared.listeners.on_connection_change(handler)
    }

    /// Register an error handler.
    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&LiveError) + Send + Sync + 'static,
    {
        self.shared.listeners.on_error(handler)
    }

    /// Register a handler for inbound messages of `kind`. See
    /// [`Listeners::subscribe`].
    pub fn subscribe<F>(&self, kind: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(kind, handler)
    }
}

// ---------------------------------------------------------------------------
// Session management
// ---------------------------------------------------------------------------

fn drop_session(inner: &mut Inner) {
    inner.outbound = None;
    if let Some(session) = inner.session.take() {
        session.abort();
    }
}

/// Start a new session under a fresh generation. Caller holds the lock.
fn start_session<T: Transport>(shared: &Arc<Shared<T>>, inner: &mut Inner) {
    if let Some(timer) = inner.reconnect.take() {
        timer.abort();
    }
    let Some(endpoint) = inner.endpoint.clone() else {
        return;
    };
    drop_session(inner);
    inner.generation = inner.generation.wrapping_add(1);
    inner.close_requested = false;
    let generation = inner.generation;

    let (tx, rx) = mpsc::unbounded_channel();
    inner.outbound = Some(tx);
    shared.set_state(ConnectionState::Connecting);
    info!(%endpoint, generation, attempt = inner.attempts, "opening live feed");

    let task_shared = Arc::clone(shared);
    inner.session = Some(tokio::spawn(run_session(task_shared, endpoint, generation, rx)));
}

async fn run_session<T: Transport>(
    shared: Arc<Shared<T>>,
    endpoint: String,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let mut conn = match shared.transport.open(&endpoint).await {
        Ok(conn) => conn,
        Err(err) => {
            warn!(%endpoint, error = %err, "failed to open live feed");
            end_session(&shared, generation, Some(LiveError::Transport(err)));
            return;
        }
    };

    let current = {
        let mut inner = shared.lock();
        if inner.generation == generation {
            inner.attempts = 0;
            shared.set_state(ConnectionState::Connected);
            true
        } else {
            false
        }
    };
    if !current {
        debug!(generation, "session superseded before open completed");
        let _ = conn.close(NORMAL_CLOSURE).await;
        return;
    }
    info!(%endpoint, "live feed connected");
    shared.listeners.notify_connection(true);

    let end = pump(&shared, &mut conn, &mut outbound).await;
    let failure = match end {
        SessionEnd::LocalClose => None,
        SessionEnd::PeerClosed(Some(code)) if is_normal_closure(code) => {
            info!(code, "live feed closed by server");
            None
        }
        SessionEnd::PeerClosed(code) => {
            warn!(?code, "live feed closed unexpectedly");
            Some(LiveError::UnexpectedClose { code })
        }
        SessionEnd::Failed(err) => {
            warn!(error = %err, "live feed connection failed");
            Some(LiveError::Transport(err))
        }
    };
    end_session(&shared, generation, failure);
}

async fn pump<T: Transport>(
    shared: &Shared<T>,
    conn: &mut T::Conn,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
) -> SessionEnd {
    loop {
        tokio::select! {
            biased;

            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(err) = conn.send_text(text).await {
                        return SessionEnd::Failed(err);
                    }
                }
                Some(Outbound::Close(code)) => {
                    if let Err(err) = conn.close(code).await {
                        debug!(error = %err, "close frame not delivered");
                    }
                    return SessionEnd::LocalClose;
                }
                None => {
                    let _ = conn.close(NORMAL_CLOSURE).await;
                    return SessionEnd::LocalClose;
                }
            },
            frame = conn.recv() => match frame {
                Some(Ok(Frame::Text(text))) => deliver(shared, &text),
                Some(Ok(Frame::Close(code))) => return SessionEnd::PeerClosed(code),
                Some(Err(err)) => return SessionEnd::Failed(err),
                None => return SessionEnd::PeerClosed(None),
            },
        }
    }
}

fn deliver<T: Transport>(shared: &Shared<T>, text: &str) {
    match serde_json::from_str::<Value>(text) {
        Ok(message) => shared.listeners.dispatch(&message),
        Err(source) => {
            warn!(error = %source, "dropping malformed frame");
            shared.listeners.notify_error(&LiveError::Decode { source });
        }
    }
}

/// Settle state after a session ends, whether it opened or not, and
/// schedule a reconnect if the end was unexpected. Stale sessions do
/// nothing.
fn end_session<T: Transport>(
    shared: &Arc<Shared<T>>,
    generation: u64,
    mut failure: Option<LiveError>,
) {
    let mut exhausted = None;
    {
        let mut inner = shared.lock();
        if inner.generation != generation {
            return;
        }
        inner.outbound = None;
        inner.session = None;
        if inner.close_requested {
            if let Some(err) = failure.take() {
                debug!(error = %err, "session ended during requested close");
            }
            inner.close_requested = false;
        }
        shared.set_state(ConnectionState::Disconnected);
        if failure.is_some() {
            exhausted = schedule_reconnect(shared, &mut inner);
        }
    }

    shared.listeners.notify_connection(false);
    if let Some(err) = failure {
        shared.listeners.notify_error(&err);
    }
    if let Some(err) = exhausted {
        shared.listeners.notify_error(&err);
    }
}

/// Arm the reconnect timer, or move to `Failed` once the budget is spent.
/// Caller holds the lock.
fn schedule_reconnect<T: Transport>(shared: &Arc<Shared<T>>, inner: &mut Inner) -> Option<LiveError> {
    let policy = shared.policy;
    if inner.attempts >= policy.max_attempts {
        warn!(attempts = inner.attempts, "reconnect budget exhausted");
        shared.set_state(ConnectionState::Failed);
        return Some(LiveError::ReconnectExhausted {
            attempts: inner.attempts,
        });
    }

    inner.attempts = inner.attempts.saturating_add(1);
    let attempt = inner.attempts;
    let delay = policy.delay_for(attempt);
    let generation = inner.generation;
    info!(
        attempt,
        max_attempts = policy.max_attempts,
        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        "scheduling reconnect"
    );

    let task_shared = Arc::clone(shared);
    inner.reconnect = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let mut inner = task_shared.lock();
        if inner.generation != generation || task_shared.state() != ConnectionState::Disconnected {
            debug!(generation, "stale reconnect timer ignored");
            return;
        }
        inner.reconnect = None;
        start_session(&task_shared, &mut inner);
    }));
    None
}
