//! Response shapes returned to the browser dashboard. Kept separate from
//! `dockyard_types`' persisted entities so a field that must never leave
//! the process (a sealed secret, a cleartext access token) simply has no
//! corresponding field here, rather than relying on every call site to
//! remember to scrub it.

use chrono::{DateTime, Utc};
use dockyard_types::{Deployment, DeploymentStatus, EnvironmentVariable, Id, Project, Runtime, User};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct UserDto {
    pub id: Id,
    pub login: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            email: user.email,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ProjectDto {
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub repo_full_name: String,
    pub branch: String,
    pub root_dir: String,
    pub build_command: Option<String>,
    pub start_command: Option<String>,
    pub runtime: Option<Runtime>,
    pub listen_port: u16,
    /// Whether a webhook is currently wired up on the source host — the
    /// opaque id itself and the sealed secret never leave this process.
    pub webhook_configured: bool,
    /// Present once a deployment for this project has gone `live`.
    pub live_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectDto {
    pub fn new(project: Project, live_url: Option<String>) -> Self {
        Self {
            id: project.id,
            name: project.name,
            slug: project.slug,
            repo_full_name: project.repo_full_name,
            branch: project.branch,
            root_dir: project.root_dir,
            build_command: project.build_command,
            start_command: project.start_command,
            runtime: project.runtime,
            listen_port: project.listen_port,
            webhook_configured: project.webhook_id.is_some(),
            live_url,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct EnvVarDto {
    pub id: Id,
    pub key: String,
    pub value: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EnvironmentVariable> for EnvVarDto {
    fn from(var: EnvironmentVariable) -> Self {
        Self {
            id: var.id,
            key: var.key,
            value: var.masked_value(),
            created_at: var.created_at,
            updated_at: var.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct DeploymentDto {
    pub id: Id,
    pub project_id: Id,
    pub commit_sha: String,
    pub commit_message: Option<String>,
    pub commit_author: Option<String>,
    pub branch: String,
    pub status: DeploymentStatus,
    pub image_ref: Option<String>,
    pub public_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub build_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Deployment> for DeploymentDto {
    fn from(deployment: Deployment) -> Self {
        Self {
            id: deployment.id,
            project_id: deployment.project_id,
            commit_sha: deployment.commit_sha,
            commit_message: deployment.commit_message,
            commit_author: deployment.commit_author,
            branch: deployment.branch,
            status: deployment.status,
            image_ref: deployment.image_ref,
            public_url: deployment.public_url,
            error_message: deployment.error_message,
            created_at: deployment.created_at,
            build_started_at: deployment.build_started_at,
            completed_at: deployment.completed_at,
        }
    }
}

#[derive(Serialize)]
pub struct RepoDto {
    pub full_name: String,
    pub clone_url: String,
    pub default_branch: String,
    pub private: bool,
}

impl From<dockyard_sourcehost::SourceRepo> for RepoDto {
    fn from(repo: dockyard_sourcehost::SourceRepo) -> Self {
        Self {
            full_name: repo.full_name,
            clone_url: repo.clone_url,
            default_branch: repo.default_branch,
            private: repo.private,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateProjectBody {
    pub name: String,
    pub repo_full_name: String,
    pub clone_url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub root_dir: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateProjectBody {
    pub name: Option<String>,
    pub branch: Option<String>,
    pub root_dir: Option<String>,
    /// Double `Option` lets a present-but-null field clear a command,
    /// distinct from an absent field that leaves it unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_command: Option<Option<String>>,
}

#[derive(Deserialize)]
pub struct SetEnvVarBody {
    pub key: String,
    pub value: String,
}

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
