//! Abstract client interface to the coordination service
//!
//! The election core consumes the service through these traits only; any
//! backend that provides hierarchical paths, ephemeral nodes, sequential
//! naming and connection-state notifications can implement them.

use crate::error::ClientError;
use crate::event::CoordinationEvent;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Result type for coordination client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Channel on which a client delivers notifications for one session
pub type EventListener = mpsc::UnboundedSender<CoordinationEvent>;

/// Creation modes for nodes in the coordination namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Node persists until explicitly deleted
    Persistent,

    /// Node is removed by the service when the creating session ends
    Ephemeral,

    /// Ephemeral node whose name receives a service-assigned, zero-padded,
    /// monotonically increasing sequence suffix
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral | Self::EphemeralSequential)
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self, Self::EphemeralSequential)
    }
}

impl fmt::Display for CreateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => write!(f, "persistent"),
            Self::Ephemeral => write!(f, "ephemeral"),
            Self::EphemeralSequential => write!(f, "ephemeral-sequential"),
        }
    }
}

/// Connection endpoint of a coordination service
#[async_trait]
pub trait CoordinationService: Send + Sync {
    /// Begin establishing a session.
    ///
    /// Returns a client handle immediately; the connection outcome arrives
    /// later as a [`SessionEvent`](crate::event::SessionEvent) on `listener`.
    /// Fails only if the transport cannot be initialized at all, e.g. on a
    /// malformed address.
    async fn connect(
        &self,
        address: &str,
        timeout: Duration,
        listener: EventListener,
    ) -> ClientResult<Arc<dyn CoordinationClient>>;
}

/// One established session with the coordination service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Service-assigned identifier of this session
    fn session_id(&self) -> u64;

    /// Create a node at `path` and return the full path the service assigned,
    /// including any sequence suffix
    async fn create_node(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> ClientResult<String>;

    /// List the leaf names of the children of `path`, optionally leaving a
    /// one-time watch on the children set
    async fn list_children(&self, path: &str, watch: bool) -> ClientResult<Vec<String>>;

    /// Terminate the session. The service removes every ephemeral node this
    /// session owns.
    async fn close(&self) -> ClientResult<()>;
}
