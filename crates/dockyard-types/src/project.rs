//! The repo-to-deployment binding and its detected runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Id;

/// A link between a [`crate::User`] and a source repository that dockyard
/// builds and deploys.
///
/// Invariants (enforced by `dockyard-store`, not by this type alone):
/// `slug` is globally unique and matches [`Project::SLUG_PATTERN`];
/// `(owner, repo)` — i.e. `repo_full_name` — is unique across all projects;
/// `webhook_id` and `sealed_webhook_secret` are set together or both `None`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    /// URL-safe, globally unique proxy hostname label. See
    /// [`Project::SLUG_PATTERN`].
    pub slug: String,
    /// `<owner>/<name>` on the source host.
    pub repo_full_name: String,
    pub clone_url: String,
    /// Tracked branch; defaults to `main`.
    pub branch: String,
    /// Root subdirectory within the repo to build from; defaults to `.`.
    pub root_dir: String,
    pub build_command: Option<String>,
    pub start_command: Option<String>,
    pub runtime: Option<Runtime>,
    /// Port the container listens on; set once detected or configured.
    pub listen_port: u16,
    /// Opaque webhook identifier on the source host. Set together with
    /// `sealed_webhook_secret` or left `None` (webhook creation is
    /// best-effort, see `dockyard-core`'s project service).
    pub webhook_id: Option<String>,
    pub sealed_webhook_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Slugs must be lowercase, start with a letter, and contain only
    /// `[a-z0-9-]`, at most 50 characters total.
    pub const SLUG_PATTERN: &'static str = "^[a-z][a-z0-9-]{0,49}$";
    pub const MAX_SLUG_LEN: usize = 50;
    pub const DEFAULT_BRANCH: &'static str = "main";
    pub const DEFAULT_ROOT_DIR: &'static str = ".";

    /// Validate a slug against [`Project::SLUG_PATTERN`] without pulling in
    /// a regex dependency for a pattern this simple.
    pub fn is_valid_slug(slug: &str) -> bool {
        if slug.is_empty() || slug.len() > Self::MAX_SLUG_LEN {
            return false;
        }
        let mut chars = slug.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        if !first.is_ascii_lowercase() {
            return false;
        }
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    /// Canonical container name the deploy worker creates/removes:
    /// `<prefix>-<slug>`.
    pub fn container_name(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.slug)
    }

    /// Public URL once `live`: `https://<slug>.<base-domain>`.
    pub fn public_url(&self, base_domain: &str) -> String {
        format!("https://{}.{base_domain}", self.slug)
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("slug", &self.slug)
            .field("repo_full_name", &self.repo_full_name)
            .field("clone_url", &self.clone_url)
            .field("branch", &self.branch)
            .field("root_dir", &self.root_dir)
            .field("build_command", &self.build_command)
            .field("start_command", &self.start_command)
            .field("runtime", &self.runtime)
            .field("listen_port", &self.listen_port)
            .field("webhook_id", &self.webhook_id)
            .field("sealed_webhook_secret", &self.sealed_webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Runtime detected by `dockyard-detect` from files at the project's working
/// directory. The string form (`#[serde(rename_all = "snake_case")]`) is
/// also the persistence encoding in `dockyard-store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Runtime {
    Docker,
    NodeJs,
    Python,
    Go,
    Static,
    Unknown,
}

impl Runtime {
    /// Default listen port for this runtime when nothing overrides it.
    pub fn default_port(self) -> u16 {
        match self {
            Runtime::Docker => 3000,
            Runtime::NodeJs => 3000,
            Runtime::Python => 8000,
            Runtime::Go => 8080,
            Runtime::Static => 80,
            Runtime::Unknown => 3000,
        }
    }

    /// Persistence encoding used in `dockyard-store`'s `runtime` column,
    /// the same string-form-is-the-encoding convention as
    /// [`crate::DeploymentStatus::as_str`].
    pub fn to_persisted_str(self) -> &'static str {
        match self {
            Runtime::Docker => "docker",
            Runtime::NodeJs => "nodejs",
            Runtime::Python => "python",
            Runtime::Go => "go",
            Runtime::Static => "static",
            Runtime::Unknown => "unknown",
        }
    }

    pub fn from_persisted_str(s: &str) -> Option<Self> {
        Some(match s {
            "docker" => Runtime::Docker,
            "nodejs" => Runtime::NodeJs,
            "python" => Runtime::Python,
            "go" => Runtime::Go,
            "static" => Runtime::Static,
            "unknown" => Runtime::Unknown,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_persisted_str_roundtrips() {
        for runtime in [
            Runtime::Docker,
            Runtime::NodeJs,
            Runtime::Python,
            Runtime::Go,
            Runtime::Static,
            Runtime::Unknown,
        ] {
            let s = runtime.to_persisted_str();
            assert_eq!(Runtime::from_persisted_str(s), Some(runtime));
        }
    }

    #[test]
    fn slug_validation_accepts_spec_examples() {
        assert!(Project::is_valid_slug("app"));
        assert!(Project::is_valid_slug("my-app-2"));
        assert!(Project::is_valid_slug(&"a".repeat(50)));
    }

    #[test]
    fn slug_validation_rejects_bad_forms() {
        assert!(!Project::is_valid_slug(""));
        assert!(!Project::is_valid_slug("-app"));
        assert!(!Project::is_valid_slug("App"));
        assert!(!Project::is_valid_slug("my_app"));
        assert!(!Project::is_valid_slug(&"a".repeat(51)));
        assert!(!Project::is_valid_slug("1app"));
    }

    #[test]
    fn debug_redacts_webhook_secret() {
        let project = Project {
            id: crate::new_id(),
            user_id: crate::new_id(),
            name: "demo".into(),
            slug: "demo".into(),
            repo_full_name: "acme/demo".into(),
            clone_url: "https://example.com/acme/demo.git".into(),
            branch: Project::DEFAULT_BRANCH.into(),
            root_dir: Project::DEFAULT_ROOT_DIR.into(),
            build_command: None,
            start_command: None,
            runtime: Some(Runtime::NodeJs),
            listen_port: 3000,
            webhook_id: Some("123".into()),
            sealed_webhook_secret: Some("sealed-secret-blob".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let debug = format!("{project:?}");
        assert!(!debug.contains("sealed-secret-blob"));
    }
}
