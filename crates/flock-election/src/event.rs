//! Typed coordination-service notifications

use std::fmt;

/// Connection-state transitions reported for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session established and synchronized with the service
    Connected,

    /// Connection to the service was lost
    Disconnected,

    /// Session expired server-side
    Expired,

    /// Authentication with the service failed
    AuthFailed,

    /// Session terminated by the client
    Closed,
}

impl SessionEvent {
    /// Whether this event terminates the session from the client's point of view
    pub fn ends_session(&self) -> bool {
        !matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Expired => write!(f, "expired"),
            Self::AuthFailed => write!(f, "auth-failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Node-change notifications delivered for one-time watches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The set of children under `path` changed
    ChildrenChanged { path: String },

    /// A node was created at `path`
    NodeCreated { path: String },

    /// The node at `path` was deleted
    NodeDeleted { path: String },
}

impl WatchEvent {
    /// Path the notification refers to
    pub fn path(&self) -> &str {
        match self {
            Self::ChildrenChanged { path }
            | Self::NodeCreated { path }
            | Self::NodeDeleted { path } => path,
        }
    }
}

/// Every notification a coordination client can deliver to its listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinationEvent {
    Session(SessionEvent),
    Watch(WatchEvent),
}

/// Handler for node-change notifications.
///
/// The single-round election never consumes these; the handler is the seam
/// where a watch-driven re-evaluation loop would plug in.
pub trait WatchHandler: Send + Sync {
    fn handle_watch(&self, event: &WatchEvent);
}

/// Default handler that records watch notifications in the log and drops them
pub struct NullWatchHandler;

impl WatchHandler for NullWatchHandler {
    fn handle_watch(&self, event: &WatchEvent) {
        tracing::debug!("Ignoring watch notification for {}", event.path());
    }
}
