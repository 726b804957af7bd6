//! Election orchestration
//!
//! Sequences the election: connect, register, evaluate, then hold the
//! process until the session ends and release the session. One pass per
//! run; a candidate that loses its session is done.

use crate::client::CoordinationService;
use crate::config::ElectionConfig;
use crate::election::{ElectionEvaluator, Role};
use crate::error::Result;
use crate::registrar::CandidacyRegistrar;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

/// Phases an election run moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionPhase {
    /// Not started
    Idle,

    /// Establishing the coordination session
    Connecting,

    /// Creating the candidacy node
    Registering,

    /// Deciding leadership from the candidate snapshot
    Evaluating,

    /// Role reported, holding until the session ends
    Waiting,

    /// Session released, run finished
    Closed,
}

impl fmt::Display for ElectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Registering => write!(f, "registering"),
            Self::Evaluating => write!(f, "evaluating"),
            Self::Waiting => write!(f, "waiting"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Progress notifications emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElectionEvent {
    SessionEstablished { address: String, session_id: u64 },
    CandidacyRegistered { leaf: String },
    RoleAssigned { role: Role },
    SessionEnded,
    Closed,
}

/// Handle for ending a run's waiting phase from outside
#[derive(Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Request shutdown. Effective at most once; safe before the run waits.
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

/// Orchestrates one complete election run
pub struct ElectionCoordinator {
    config: ElectionConfig,
    service: Arc<dyn CoordinationService>,
    phase: ElectionPhase,
    session: Option<Session>,
    event_tx: broadcast::Sender<ElectionEvent>,
    shutdown: Arc<Notify>,
}

impl ElectionCoordinator {
    /// Create a coordinator for the given service and configuration
    pub fn new(service: Arc<dyn CoordinationService>, config: ElectionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(16);

        Self {
            config,
            service,
            phase: ElectionPhase::Idle,
            session: None,
            event_tx,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Configuration this coordinator runs with
    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    /// Current phase of the run
    pub fn phase(&self) -> ElectionPhase {
        self.phase
    }

    /// Subscribe to progress notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ElectionEvent> {
        self.event_tx.subscribe()
    }

    /// Handle that ends the waiting phase early, e.g. on operator shutdown
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: self.shutdown.clone(),
        }
    }

    /// Run the election to completion.
    ///
    /// Establishes the session, registers the candidacy, evaluates
    /// leadership, then blocks until the session ends (or shutdown is
    /// requested) and closes the session. Fatal errors abort the run after
    /// a best-effort close and are returned to the caller.
    pub async fn run(&mut self) -> Result<Role> {
        let role = match self.elect().await {
            Ok(role) => role,
            Err(e) => {
                tracing::error!("Election run failed: {}", e);
                self.finish().await;
                return Err(e);
            }
        };

        self.set_phase(ElectionPhase::Waiting);
        if let Some(session) = &self.session {
            tokio::select! {
                state = session.wait_until_ended() => {
                    tracing::info!("Session ended ({}) while holding role", state);
                    let _ = self.event_tx.send(ElectionEvent::SessionEnded);
                }
                _ = self.shutdown.notified() => {
                    tracing::info!("Shutdown requested, leaving the election");
                }
            }
        }

        self.finish().await;
        Ok(role)
    }

    async fn elect(&mut self) -> Result<Role> {
        self.config.validate()?;

        self.set_phase(ElectionPhase::Connecting);
        let session = Session::establish(
            self.service.as_ref(),
            &self.config.address,
            self.config.session_timeout,
        )
        .await?;

        let outcome = self.campaign(&session).await;
        self.session = Some(session);
        outcome
    }

    async fn campaign(&mut self, session: &Session) -> Result<Role> {
        session.wait_until_connected().await?;
        let _ = self.event_tx.send(ElectionEvent::SessionEstablished {
            address: self.config.address.clone(),
            session_id: session.session_id(),
        });

        self.set_phase(ElectionPhase::Registering);
        let mut registrar = CandidacyRegistrar::new(session, self.config.candidate_name.clone());
        registrar.ensure_namespace(&self.config.namespace).await?;
        let leaf = registrar
            .register(&self.config.namespace, &self.config.candidate_prefix)
            .await?;
        let _ = self
            .event_tx
            .send(ElectionEvent::CandidacyRegistered { leaf: leaf.clone() });

        self.set_phase(ElectionPhase::Evaluating);
        let evaluator = ElectionEvaluator::new(session.client());
        let role = evaluator.evaluate(&self.config.namespace, &leaf).await?;
        tracing::info!(
            "Candidate {} assumes role: {}",
            self.config.candidate_name,
            role
        );
        let _ = self
            .event_tx
            .send(ElectionEvent::RoleAssigned { role: role.clone() });

        Ok(role)
    }

    async fn finish(&mut self) {
        if let Some(session) = &self.session {
            session.close().await;
        }
        let _ = self.event_tx.send(ElectionEvent::Closed);
        self.set_phase(ElectionPhase::Closed);
    }

    fn set_phase(&mut self, phase: ElectionPhase) {
        if self.phase != phase {
            tracing::debug!("Election phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCoordination;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    fn test_config(name: &str) -> ElectionConfig {
        ElectionConfig {
            candidate_name: name.to_string(),
            ..ElectionConfig::default()
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<ElectionEvent>) -> ElectionEvent {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_single_candidate_run() {
        let service = MemoryCoordination::new();
        let mut coordinator =
            ElectionCoordinator::new(Arc::new(service.clone()), test_config("solo"));
        let mut events = coordinator.subscribe();

        let runner = tokio::spawn(async move {
            let outcome = coordinator.run().await;
            (outcome, coordinator)
        });

        let ElectionEvent::SessionEstablished { session_id, .. } = next_event(&mut events).await
        else {
            panic!("expected session establishment first");
        };
        assert_eq!(
            next_event(&mut events).await,
            ElectionEvent::CandidacyRegistered {
                leaf: "c_0000000000".to_string()
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            ElectionEvent::RoleAssigned { role: Role::Leader }
        );

        // End the session out from under the waiting coordinator
        assert!(service.expire_session(session_id).await);
        assert_eq!(next_event(&mut events).await, ElectionEvent::SessionEnded);
        assert_eq!(next_event(&mut events).await, ElectionEvent::Closed);

        let (outcome, coordinator) = timeout(WAIT, runner).await.unwrap().unwrap();
        assert_eq!(outcome.unwrap(), Role::Leader);
        assert_eq!(coordinator.phase(), ElectionPhase::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_ends_waiting_phase() {
        let service = MemoryCoordination::new();
        let mut coordinator =
            ElectionCoordinator::new(Arc::new(service), test_config("stoppable"));
        let mut events = coordinator.subscribe();
        let shutdown = coordinator.shutdown_handle();

        let runner = tokio::spawn(async move { coordinator.run().await });

        loop {
            if let ElectionEvent::RoleAssigned { .. } = next_event(&mut events).await {
                break;
            }
        }
        shutdown.shutdown();

        let outcome = timeout(WAIT, runner).await.unwrap().unwrap();
        assert_eq!(outcome.unwrap(), Role::Leader);
    }

    #[tokio::test]
    async fn test_shutdown_before_waiting_is_not_lost() {
        let service = MemoryCoordination::new();
        let mut coordinator = ElectionCoordinator::new(Arc::new(service), test_config("early"));
        coordinator.shutdown_handle().shutdown();

        let role = timeout(WAIT, coordinator.run()).await.unwrap().unwrap();
        assert_eq!(role, Role::Leader);
        assert_eq!(coordinator.phase(), ElectionPhase::Closed);
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let service = MemoryCoordination::new();
        let mut config = test_config("misconfigured");
        config.session_timeout = Duration::from_millis(10);
        let mut coordinator = ElectionCoordinator::new(Arc::new(service), config);

        let result = coordinator.run().await;
        assert!(matches!(
            result,
            Err(crate::error::ElectionError::Configuration(_))
        ));
        assert_eq!(coordinator.phase(), ElectionPhase::Closed);
    }

    #[tokio::test]
    async fn test_registration_failure_is_fatal() {
        let service = MemoryCoordination::new();
        let mut config = test_config("orphaned");
        config.namespace = "/deep/missing".to_string();
        let mut coordinator = ElectionCoordinator::new(Arc::new(service.clone()), config);

        // The namespace parent does not exist, so registration fails and the
        // run must close its session on the way out
        let result = coordinator.run().await;
        assert!(matches!(
            result,
            Err(crate::error::ElectionError::Registration(_))
        ));
        assert_eq!(coordinator.phase(), ElectionPhase::Closed);
    }
}
