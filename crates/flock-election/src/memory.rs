//! In-memory coordination service
//!
//! A process-local backend implementing the client traits with the guarantees
//! the election depends on: per-parent monotonically increasing, zero-padded
//! sequence suffixes, removal of ephemeral nodes when the owning session
//! ends, and children listings taken under a single lock.

use crate::client::{
    ClientResult, CoordinationClient, CoordinationService, CreateMode, EventListener,
};
use crate::error::ClientError;
use crate::event::{CoordinationEvent, SessionEvent, WatchEvent};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Width of the sequence suffix appended to sequential nodes
const SEQUENCE_WIDTH: usize = 10;

/// In-memory coordination service shared by any number of sessions
#[derive(Clone, Default)]
pub struct MemoryCoordination {
    shared: Arc<Mutex<ServiceState>>,
}

#[derive(Default)]
struct ServiceState {
    znodes: BTreeMap<String, Znode>,
    sequences: HashMap<String, u64>,
    sessions: HashMap<u64, SessionRecord>,
    child_watches: HashMap<String, Vec<u64>>,
    next_session_id: u64,
}

struct Znode {
    data: Vec<u8>,
    owner: Option<u64>,
}

struct SessionRecord {
    listener: EventListener,
    status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Alive,
    Expired,
    Closed,
}

impl MemoryCoordination {
    /// Create an empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Force-expire a session, as the service would after missed heartbeats.
    ///
    /// Removes the session's ephemeral nodes and delivers an
    /// [`SessionEvent::Expired`] notification. Returns whether the session
    /// was alive.
    pub async fn expire_session(&self, session_id: u64) -> bool {
        let mut state = self.shared.lock().await;
        let alive = state.sessions.get(&session_id).map(|record| record.status)
            == Some(SessionStatus::Alive);
        if alive {
            state.end_session(session_id, SessionEvent::Expired, SessionStatus::Expired);
            tracing::debug!("Expired session {}", session_id);
        }
        alive
    }

    /// Number of sessions the service has ever opened
    pub async fn session_count(&self) -> usize {
        self.shared.lock().await.sessions.len()
    }

    /// Payload stored at `path`, if the node exists
    pub async fn node_data(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.shared.lock().await;
        state.znodes.get(path).map(|znode| znode.data.clone())
    }
}

#[async_trait]
impl CoordinationService for MemoryCoordination {
    async fn connect(
        &self,
        address: &str,
        _timeout: Duration,
        listener: EventListener,
    ) -> ClientResult<Arc<dyn CoordinationClient>> {
        validate_address(address)?;

        let mut state = self.shared.lock().await;
        let session_id = state.next_session_id;
        state.next_session_id += 1;
        state.sessions.insert(
            session_id,
            SessionRecord {
                listener: listener.clone(),
                status: SessionStatus::Alive,
            },
        );

        // Connection outcome is reported through the listener, not the
        // return value; the caller observes it when it drains the channel.
        let _ = listener.send(CoordinationEvent::Session(SessionEvent::Connected));
        tracing::debug!("Opened session {} to {}", session_id, address);

        Ok(Arc::new(MemoryClient {
            shared: self.shared.clone(),
            session_id,
        }))
    }
}

/// Client handle for one session against a [`MemoryCoordination`] service
pub struct MemoryClient {
    shared: Arc<Mutex<ServiceState>>,
    session_id: u64,
}

#[async_trait]
impl CoordinationClient for MemoryClient {
    fn session_id(&self) -> u64 {
        self.session_id
    }

    async fn create_node(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> ClientResult<String> {
        let mut state = self.shared.lock().await;
        state.require_alive(self.session_id)?;
        state.create(self.session_id, path, data, mode)
    }

    async fn list_children(&self, path: &str, watch: bool) -> ClientResult<Vec<String>> {
        let mut state = self.shared.lock().await;
        state.require_alive(self.session_id)?;
        let children = state.children(path)?;
        if watch {
            state
                .child_watches
                .entry(path.to_string())
                .or_default()
                .push(self.session_id);
        }
        Ok(children)
    }

    async fn close(&self) -> ClientResult<()> {
        let mut state = self.shared.lock().await;
        let alive = state.sessions.get(&self.session_id).map(|record| record.status)
            == Some(SessionStatus::Alive);
        // Closing an already-ended session is a no-op
        if alive {
            state.end_session(self.session_id, SessionEvent::Closed, SessionStatus::Closed);
            tracing::debug!("Closed session {}", self.session_id);
        }
        Ok(())
    }
}

impl ServiceState {
    fn require_alive(&self, session_id: u64) -> ClientResult<()> {
        match self.sessions.get(&session_id).map(|record| record.status) {
            Some(SessionStatus::Alive) => Ok(()),
            Some(SessionStatus::Expired) => Err(ClientError::SessionExpired),
            _ => Err(ClientError::SessionClosed),
        }
    }

    fn create(
        &mut self,
        session_id: u64,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> ClientResult<String> {
        validate_path(path)?;
        let parent = parent_of(path);
        if let Some(parent) = parent {
            if !self.znodes.contains_key(parent) {
                return Err(ClientError::NoNode(parent.to_string()));
            }
        }

        let full_path = if mode.is_sequential() {
            let counter = self
                .sequences
                .entry(parent.unwrap_or("/").to_string())
                .or_insert(0);
            let sequence = *counter;
            *counter += 1;
            format!("{}{:0width$}", path, sequence, width = SEQUENCE_WIDTH)
        } else {
            if self.znodes.contains_key(path) {
                return Err(ClientError::NodeExists(path.to_string()));
            }
            path.to_string()
        };

        let owner = mode.is_ephemeral().then_some(session_id);
        self.znodes.insert(full_path.clone(), Znode {
            data: data.to_vec(),
            owner,
        });
        self.fire_child_watches(parent.unwrap_or("/"));

        Ok(full_path)
    }

    fn children(&self, path: &str) -> ClientResult<Vec<String>> {
        validate_path(path)?;
        if !self.znodes.contains_key(path) {
            return Err(ClientError::NoNode(path.to_string()));
        }

        let prefix = format!("{}/", path);
        // BTreeMap iteration keeps the listing ordered
        let children = self
            .znodes
            .range(prefix.clone()..)
            .take_while(|(child, _)| child.starts_with(&prefix))
            .filter(|(child, _)| !child[prefix.len()..].contains('/'))
            .map(|(child, _)| child[prefix.len()..].to_string())
            .collect();

        Ok(children)
    }

    fn end_session(&mut self, session_id: u64, event: SessionEvent, status: SessionStatus) {
        if let Some(record) = self.sessions.get_mut(&session_id) {
            record.status = status;
            let _ = record
                .listener
                .send(CoordinationEvent::Session(event));
        }

        let owned: Vec<String> = self
            .znodes
            .iter()
            .filter(|(_, znode)| znode.owner == Some(session_id))
            .map(|(path, _)| path.clone())
            .collect();

        let mut touched_parents = BTreeSet::new();
        for path in owned {
            self.znodes.remove(&path);
            touched_parents.insert(parent_of(&path).unwrap_or("/").to_string());
        }
        for parent in touched_parents {
            self.fire_child_watches(&parent);
        }
    }

    fn fire_child_watches(&mut self, parent: &str) {
        let Some(watchers) = self.child_watches.remove(parent) else {
            return;
        };
        for session_id in watchers {
            if let Some(record) = self.sessions.get(&session_id) {
                if record.status == SessionStatus::Alive {
                    let _ = record.listener.send(CoordinationEvent::Watch(
                        WatchEvent::ChildrenChanged {
                            path: parent.to_string(),
                        },
                    ));
                }
            }
        }
    }
}

fn validate_address(address: &str) -> ClientResult<()> {
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(ClientError::BadAddress(address.to_string()));
    };
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(ClientError::BadAddress(address.to_string()));
    }
    Ok(())
}

fn validate_path(path: &str) -> ClientResult<()> {
    if path.len() < 2 || !path.starts_with('/') || path.ends_with('/') {
        return Err(ClientError::NoNode(path.to_string()));
    }
    Ok(())
}

/// Parent path, or `None` when the parent is the root
fn parent_of(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(index) => Some(&path[..index]),
    }
}
