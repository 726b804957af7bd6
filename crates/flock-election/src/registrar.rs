//! Candidacy registration
//!
//! Creates this process's ephemeral, sequentially-named node under the
//! election namespace and remembers the assigned leaf name. Registration
//! happens exactly once per process run; the service removes the node when
//! the owning session ends, so nothing is ever deleted explicitly.

use crate::client::{CoordinationClient, CreateMode};
use crate::error::{ClientError, ElectionError, Result};
use crate::session::{Session, SessionState};
use std::sync::Arc;
use tokio::sync::watch;

/// Registers one candidacy per process run
pub struct CandidacyRegistrar {
    client: Arc<dyn CoordinationClient>,
    session_state: watch::Receiver<SessionState>,
    candidate_name: String,
    leaf_name: Option<String>,
}

impl CandidacyRegistrar {
    /// Create a registrar bound to an established session
    pub fn new(session: &Session, candidate_name: impl Into<String>) -> Self {
        Self::from_client(session.client(), session.watch_state(), candidate_name)
    }

    /// Create a registrar from its raw parts
    pub fn from_client(
        client: Arc<dyn CoordinationClient>,
        session_state: watch::Receiver<SessionState>,
        candidate_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            session_state,
            candidate_name: candidate_name.into(),
            leaf_name: None,
        }
    }

    /// Name of the candidate this registrar acts for
    pub fn candidate_name(&self) -> &str {
        &self.candidate_name
    }

    /// Leaf name assigned by the service, once registered
    pub fn leaf_name(&self) -> Option<&str> {
        self.leaf_name.as_deref()
    }

    /// Create the persistent namespace node if it does not exist yet
    pub async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        match self
            .client
            .create_node(namespace, &[], CreateMode::Persistent)
            .await
        {
            Ok(_) => {
                tracing::debug!("Created election namespace {}", namespace);
                Ok(())
            }
            Err(ClientError::NodeExists(_)) => Ok(()),
            Err(e) => Err(ElectionError::registration(format!(
                "Namespace {} unavailable: {}",
                namespace, e
            ))),
        }
    }

    /// Register this process's candidacy under `namespace`.
    ///
    /// The created node carries the candidate name as payload and receives a
    /// service-assigned sequence suffix; only the leaf name is retained. The
    /// session must be connected, and a second call is an error: candidacy
    /// is registered at most once per run.
    pub async fn register(&mut self, namespace: &str, prefix: &str) -> Result<String> {
        if self.leaf_name.is_some() {
            return Err(ElectionError::registration(
                "Candidacy is already registered",
            ));
        }

        let state = *self.session_state.borrow();
        if state != SessionState::Connected {
            return Err(ElectionError::registration(format!(
                "Session is {}, not connected",
                state
            )));
        }

        let path = format!("{}/{}", namespace, prefix);
        let full_path = self
            .client
            .create_node(&path, self.candidate_name.as_bytes(), CreateMode::EphemeralSequential)
            .await
            .map_err(|e| ElectionError::registration(format!("Create {}: {}", path, e)))?;

        let leaf = full_path
            .rsplit('/')
            .next()
            .unwrap_or(full_path.as_str())
            .to_string();
        tracing::info!(
            "Registered candidacy of {} as {}",
            self.candidate_name,
            leaf
        );
        self.leaf_name = Some(leaf.clone());

        Ok(leaf)
    }
}
