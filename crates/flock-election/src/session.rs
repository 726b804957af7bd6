//! Coordination session lifecycle
//!
//! Owns the connection to the coordination service and folds its
//! notifications into a single connection-state value. The state lives in a
//! watch channel, so a waiter that arrives after the session already ended
//! still observes the terminal state instead of missing the wake.

use crate::client::{CoordinationClient, CoordinationService, EventListener};
use crate::error::{ElectionError, Result};
use crate::event::{CoordinationEvent, NullWatchHandler, SessionEvent, WatchHandler};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection requested, outcome not yet observed
    Connecting,

    /// Session established and synchronized
    Connected,

    /// Session ended by disconnect, expiry or authentication failure
    Disconnected,

    /// Session terminated by this client
    Closed,
}

impl SessionState {
    /// Whether the session has reached a terminal state
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Live session with the coordination service
pub struct Session {
    address: String,
    timeout: Duration,
    client: Arc<dyn CoordinationClient>,
    state_rx: watch::Receiver<SessionState>,
    events_tx: EventListener,
    closed: AtomicBool,
    pump: JoinHandle<()>,
}

impl Session {
    /// Establish a session, discarding watch notifications
    pub async fn establish(
        service: &dyn CoordinationService,
        address: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::establish_with_watcher(service, address, timeout, Arc::new(NullWatchHandler)).await
    }

    /// Establish a session, routing watch notifications to `watcher`
    pub async fn establish_with_watcher(
        service: &dyn CoordinationService,
        address: &str,
        timeout: Duration,
        watcher: Arc<dyn WatchHandler>,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);

        let client = service
            .connect(address, timeout, events_tx.clone())
            .await
            .map_err(|e| {
                ElectionError::connection_setup(format!("Cannot reach service at {}: {}", address, e))
            })?;

        let pump = tokio::spawn(pump_events(
            address.to_string(),
            events_rx,
            state_tx,
            watcher,
        ));

        Ok(Self {
            address: address.to_string(),
            timeout,
            client,
            state_rx,
            events_tx,
            closed: AtomicBool::new(false),
            pump,
        })
    }

    /// Address this session was established against
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Service-assigned session identifier
    pub fn session_id(&self) -> u64 {
        self.client.session_id()
    }

    /// Handle for issuing requests on this session
    pub fn client(&self) -> Arc<dyn CoordinationClient> {
        self.client.clone()
    }

    /// Current connection state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection-state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Block until the session is connected.
    ///
    /// Fails if the session ends first or if no connection is observed
    /// within the session timeout.
    pub async fn wait_until_connected(&self) -> Result<()> {
        let mut state_rx = self.state_rx.clone();
        let wait = async move {
            loop {
                match *state_rx.borrow_and_update() {
                    SessionState::Connected => return Ok(()),
                    SessionState::Disconnected | SessionState::Closed => {
                        return Err(ElectionError::connection_setup(
                            "Session ended before a connection was established",
                        ));
                    }
                    SessionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(ElectionError::connection_setup(
                        "Session event channel dropped before a connection was established",
                    ));
                }
            }
        };

        tokio::time::timeout(self.timeout, wait).await.map_err(|_| {
            ElectionError::timeout(format!(
                "No connection to {} within {:?}",
                self.address, self.timeout
            ))
        })?
    }

    /// Block until the session ends, for any reason.
    ///
    /// Returns immediately when the session already ended.
    pub async fn wait_until_ended(&self) -> SessionState {
        let mut state_rx = self.state_rx.clone();
        loop {
            let state = *state_rx.borrow_and_update();
            if state.is_ended() {
                return state;
            }
            if state_rx.changed().await.is_err() {
                return *state_rx.borrow();
            }
        }
    }

    /// Terminate the session. Safe to call more than once; failures are
    /// logged and not escalated, so shutdown always proceeds.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session to {} already closed", self.address);
            return;
        }

        if let Err(e) = self.client.close().await {
            tracing::warn!("Error while closing session to {}: {}", self.address, e);
        }

        // Local notification so waiters wake even if the service does not
        // echo the close back.
        let _ = self
            .events_tx
            .send(CoordinationEvent::Session(SessionEvent::Closed));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_events(
    address: String,
    mut events_rx: mpsc::UnboundedReceiver<CoordinationEvent>,
    state_tx: watch::Sender<SessionState>,
    watcher: Arc<dyn WatchHandler>,
) {
    while let Some(event) = events_rx.recv().await {
        match event {
            CoordinationEvent::Session(session_event) => {
                let current = *state_tx.borrow();
                let Some(next) = next_state(current, session_event) else {
                    continue;
                };
                match next {
                    SessionState::Connected => {
                        tracing::info!("Connected to coordination service at {}", address);
                    }
                    SessionState::Disconnected => {
                        tracing::warn!("Session to {} ended by {} event", address, session_event);
                    }
                    SessionState::Closed => {
                        tracing::debug!("Session to {} closed", address);
                    }
                    SessionState::Connecting => {}
                }
                if state_tx.send(next).is_err() {
                    break;
                }
            }
            CoordinationEvent::Watch(watch_event) => {
                watcher.handle_watch(&watch_event);
            }
        }
    }
}

/// State transition for one session event; `None` means the event is ignored.
///
/// Terminal states never revert: a late connected notification cannot
/// resurrect a session that was already seen ending.
fn next_state(current: SessionState, event: SessionEvent) -> Option<SessionState> {
    match (current, event) {
        (SessionState::Closed, _) => None,
        (_, SessionEvent::Closed) => Some(SessionState::Closed),
        (SessionState::Connecting, SessionEvent::Connected) => Some(SessionState::Connected),
        (_, SessionEvent::Connected) => None,
        (SessionState::Disconnected, _) => None,
        (_, _) => Some(SessionState::Disconnected),
    }
}
