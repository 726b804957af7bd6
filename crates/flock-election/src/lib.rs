//! Single-round leader election over a coordination service
//!
//! This crate elects a leader among independently running candidate
//! processes through an external coordination service that provides
//! hierarchical namespaces, ephemeral nodes, sequential naming and
//! connection-state notifications. Each candidate registers an ephemeral,
//! sequentially-named node under a shared namespace; the candidacy with the
//! lowest sequence suffix is the leader. The decision is made once per run,
//! after which the process holds its registration until the session ends.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod election;
pub mod error;
pub mod event;
pub mod memory;
pub mod registrar;
pub mod session;

pub use client::{CoordinationClient, CoordinationService, CreateMode, EventListener};
pub use config::ElectionConfig;
pub use coordinator::{ElectionCoordinator, ElectionEvent, ElectionPhase, ShutdownHandle};
pub use election::{ElectionEvaluator, Role};
pub use error::{ClientError, ElectionError, Result};
pub use event::{CoordinationEvent, SessionEvent, WatchEvent, WatchHandler};
pub use memory::MemoryCoordination;
pub use registrar::CandidacyRegistrar;
pub use session::{Session, SessionState};

use std::sync::Arc;

/// Run one complete election against `service`.
///
/// Convenience wrapper around [`ElectionCoordinator`]: registers a
/// candidacy, reports the role, and blocks until the session ends. Returns
/// the role this candidate held.
pub async fn run_election(
    service: Arc<dyn CoordinationService>,
    config: ElectionConfig,
) -> Result<Role> {
    let mut coordinator = ElectionCoordinator::new(service, config);
    coordinator.run().await
}
