//! Leadership evaluation
//!
//! Decides leadership from a single snapshot of the candidate set: the
//! candidacy with the lowest sequence suffix wins. The service zero-pads
//! suffixes to a fixed width, so plain lexicographic ordering is the
//! numeric ordering.

use crate::client::CoordinationClient;
use crate::error::{ElectionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Role of a candidate after evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// This candidate holds the lowest-ranked registration
    Leader,

    /// Another candidate leads; its leaf name is reported
    Follower { leader: String },
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leader => write!(f, "leader"),
            Self::Follower { leader } => write!(f, "follower of {}", leader),
        }
    }
}

/// Computes the local candidate's role from a snapshot of the candidate set
pub struct ElectionEvaluator {
    client: Arc<dyn CoordinationClient>,
}

impl ElectionEvaluator {
    pub fn new(client: Arc<dyn CoordinationClient>) -> Self {
        Self { client }
    }

    /// Evaluate leadership once.
    ///
    /// Lists the current candidacies under `namespace`, ranks them, and
    /// compares the minimum against `local_leaf`. The snapshot may be stale
    /// the moment it is read; the decision is still final for this run.
    pub async fn evaluate(&self, namespace: &str, local_leaf: &str) -> Result<Role> {
        let mut candidates = self
            .client
            .list_children(namespace, false)
            .await
            .map_err(|e| ElectionError::evaluation(format!("List {}: {}", namespace, e)))?;
        candidates.sort();

        let Some(smallest) = candidates.first() else {
            return Err(ElectionError::inconsistent_state(format!(
                "No candidates under {} although registration succeeded",
                namespace
            )));
        };

        if !candidates.iter().any(|candidate| candidate == local_leaf) {
            return Err(ElectionError::inconsistent_state(format!(
                "Own candidacy {} is missing from its snapshot",
                local_leaf
            )));
        }

        if smallest == local_leaf {
            tracing::info!("Candidacy {} won the election", local_leaf);
            Ok(Role::Leader)
        } else {
            tracing::info!(
                "Candidacy {} follows leader {}",
                local_leaf,
                smallest
            );
            Ok(Role::Follower {
                leader: smallest.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockCoordinationClient;
    use crate::error::ClientError;

    fn evaluator_with_children(children: Vec<&str>) -> ElectionEvaluator {
        let children: Vec<String> = children.into_iter().map(String::from).collect();
        let mut client = MockCoordinationClient::new();
        client
            .expect_list_children()
            .returning(move |_, _| Ok(children.clone()));
        ElectionEvaluator::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_lowest_candidacy_wins() {
        let evaluator =
            evaluator_with_children(vec!["c_0000000003", "c_0000000004", "c_0000000007"]);
        let role = evaluator.evaluate("/election", "c_0000000003").await.unwrap();
        assert_eq!(role, Role::Leader);
        assert!(role.is_leader());
    }

    #[tokio::test]
    async fn test_follower_identifies_leader() {
        let evaluator = evaluator_with_children(vec!["c_0000000003", "c_0000000004"]);
        let role = evaluator.evaluate("/election", "c_0000000004").await.unwrap();
        assert_eq!(
            role,
            Role::Follower {
                leader: "c_0000000003".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_single_candidate_is_leader() {
        let evaluator = evaluator_with_children(vec!["c_0000000000"]);
        let role = evaluator.evaluate("/election", "c_0000000000").await.unwrap();
        assert_eq!(role, Role::Leader);
    }

    #[tokio::test]
    async fn test_unordered_snapshot_is_ranked() {
        let evaluator =
            evaluator_with_children(vec!["c_0000000010", "c_0000000002", "c_0000000005"]);
        let role = evaluator.evaluate("/election", "c_0000000005").await.unwrap();
        assert_eq!(
            role,
            Role::Follower {
                leader: "c_0000000002".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_inconsistent() {
        let evaluator = evaluator_with_children(vec![]);
        let result = evaluator.evaluate("/election", "c_0000000000").await;
        assert!(matches!(result, Err(ElectionError::InconsistentState(_))));
    }

    #[tokio::test]
    async fn test_missing_own_candidacy_is_inconsistent() {
        let evaluator = evaluator_with_children(vec!["c_0000000001", "c_0000000002"]);
        let result = evaluator.evaluate("/election", "c_0000000009").await;
        assert!(matches!(result, Err(ElectionError::InconsistentState(_))));
    }

    #[tokio::test]
    async fn test_listing_failure_is_an_evaluation_error() {
        let mut client = MockCoordinationClient::new();
        client
            .expect_list_children()
            .returning(|_, _| Err(ClientError::ConnectionLoss));
        let evaluator = ElectionEvaluator::new(Arc::new(client));

        let result = evaluator.evaluate("/election", "c_0000000000").await;
        assert!(matches!(result, Err(ElectionError::Evaluation(_))));
    }

    #[test]
    fn test_role_serialization() {
        let role = Role::Follower {
            leader: "c_0000000001".to_string(),
        };
        let serialized = serde_json::to_string(&role).unwrap();
        let deserialized: Role = serde_json::from_str(&serialized).unwrap();
        assert_eq!(role, deserialized);
    }
}
