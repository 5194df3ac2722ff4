//! `Deployment` and its closed-set `DeploymentStatus` state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Id;

/// The seven deployment statuses, a closed set. The string form
/// (`#[serde(rename_all = "snake_case")]`) is also the persistence encoding
/// in `dockyard-store`'s `status` column, per spec's design note that sum
/// types should encode directly as their string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Building,
    Deploying,
    Live,
    Failed,
    Cancelled,
    Superseded,
}

impl DeploymentStatus {
    /// `fail` and `cancel` are legal from every non-terminal state;
    /// `superseded` is set only by the orchestrator's promotion step, never
    /// observed as a user-chosen target.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentStatus::Failed | DeploymentStatus::Cancelled | DeploymentStatus::Superseded
        )
    }

    /// Whether `to` is a legal `advance` target from `self`. Every
    /// transition function in `dockyard-core` enumerates its legal
    /// predecessors by calling this rather than re-deriving the graph.
    pub fn can_advance_to(self, to: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        match (self, to) {
            (Pending, Building) => true,
            (Building, Deploying) => true,
            (Deploying, Live) => true,
            (Live, Superseded) => true,
            // fail is legal from any non-terminal state, cancel only before
            // a container is actually serving traffic: a live deployment is
            // superseded by a fresh deploy, never cancelled.
            (from, Failed) => !from.is_terminal(),
            (Pending, Cancelled) | (Building, Cancelled) | (Deploying, Cancelled) => true,
            _ => false,
        }
    }

    /// `as_str` is the persistence encoding used directly in SQL
    /// `WHERE status = $1` clauses, avoiding a round-trip through
    /// `serde_json` for the hot path.
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Live => "live",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Cancelled => "cancelled",
            DeploymentStatus::Superseded => "superseded",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => DeploymentStatus::Pending,
            "building" => DeploymentStatus::Building,
            "deploying" => DeploymentStatus::Deploying,
            "live" => DeploymentStatus::Live,
            "failed" => DeploymentStatus::Failed,
            "cancelled" => DeploymentStatus::Cancelled,
            "superseded" => DeploymentStatus::Superseded,
            _ => return None,
        })
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to build and run a specific commit of a [`crate::Project`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Id,
    pub project_id: Id,
    /// 40-character hex commit SHA.
    pub commit_sha: String,
    pub commit_message: Option<String>,
    pub commit_author: Option<String>,
    pub branch: String,
    pub status: DeploymentStatus,
    pub image_ref: Option<String>,
    pub container_id: Option<String>,
    pub public_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub build_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Deployment {
    /// Short image tag suffix: the first 8 hex characters of the commit.
    pub fn short_sha(&self) -> &str {
        &self.commit_sha[..self.commit_sha.len().min(8)]
    }

    /// Image tag the build worker pushes to: `<registry>/<project-id>:<short-sha>`.
    pub fn image_tag(&self, registry: &str) -> String {
        format!("{registry}/{}:{}", self.project_id, self.short_sha())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        use DeploymentStatus::*;
        assert!(Pending.can_advance_to(Building));
        assert!(Building.can_advance_to(Deploying));
        assert!(Deploying.can_advance_to(Live));
        assert!(Live.can_advance_to(Superseded));
    }

    #[test]
    fn fail_legal_from_any_non_terminal() {
        use DeploymentStatus::*;
        for state in [Pending, Building, Deploying, Live] {
            assert!(state.can_advance_to(Failed), "{state:?} -> Failed");
        }
    }

    #[test]
    fn cancel_legal_only_before_live() {
        use DeploymentStatus::*;
        for state in [Pending, Building, Deploying] {
            assert!(state.can_advance_to(Cancelled), "{state:?} -> Cancelled");
        }
        assert!(
            !Live.can_advance_to(Cancelled),
            "a live deployment is superseded, never cancelled"
        );
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        use DeploymentStatus::*;
        for terminal in [Failed, Cancelled, Superseded] {
            for target in [Pending, Building, Deploying, Live, Failed, Cancelled, Superseded] {
                assert!(
                    !terminal.can_advance_to(target),
                    "{terminal:?} must not advance to {target:?}"
                );
            }
        }
    }

    #[test]
    fn no_skipping_states() {
        use DeploymentStatus::*;
        assert!(!Pending.can_advance_to(Deploying));
        assert!(!Pending.can_advance_to(Live));
        assert!(!Building.can_advance_to(Live));
    }

    #[test]
    fn status_string_roundtrips() {
        for status in [
            DeploymentStatus::Pending,
            DeploymentStatus::Building,
            DeploymentStatus::Deploying,
            DeploymentStatus::Live,
            DeploymentStatus::Failed,
            DeploymentStatus::Cancelled,
            DeploymentStatus::Superseded,
        ] {
            let s = status.as_str();
            assert_eq!(DeploymentStatus::from_str_opt(s), Some(status));
        }
    }

    #[test]
    fn short_sha_truncates_to_eight() {
        let deployment = Deployment {
            id: crate::new_id(),
            project_id: crate::new_id(),
            commit_sha: "abc123def456abc123def456abc123def456abc".into(),
            commit_message: None,
            commit_author: None,
            branch: "main".into(),
            status: DeploymentStatus::Pending,
            image_ref: None,
            container_id: None,
            public_url: None,
            error_message: None,
            created_at: Utc::now(),
            build_started_at: None,
            completed_at: None,
        };
        assert_eq!(deployment.short_sha(), "abc123de");
    }
}
