//! # Types
//!
//! Core domain types shared across the dockyard workspace: the five
//! persisted entities (`User`, `Project`, `EnvironmentVariable`,
//! `Deployment`, and the job broker's task payloads), the deployment state
//! machine, and the error taxonomy every crate above the persistence layer
//! maps its failures into.
//!
//! This crate has no I/O of its own — no database driver, no HTTP client.
//! It is the vocabulary the rest of the workspace shares.
//!
//! ## Modules
//!
//! - [`user`] — `User`, the authenticated-human record.
//! - [`project`] — `Project`, the repo-to-deployment binding, and `Runtime`.
//! - [`env_var`] — `EnvironmentVariable`, the sealed per-project config pair.
//! - [`deployment`] — `Deployment` and the `DeploymentStatus` state machine.
//! - [`job`] — task payloads enqueued onto the `builds`/`deploys` queues.
//! - [`error`] — the behavioral error taxonomy (`Error`), not tied to any
//!   particular transport.

pub mod deployment;
pub mod env_var;
pub mod error;
pub mod job;
pub mod project;
pub mod user;

pub use deployment::{Deployment, DeploymentStatus};
pub use env_var::EnvironmentVariable;
pub use error::Error;
pub use job::{BuildTask, DeployTask};
pub use project::{Project, Runtime};
pub use user::User;

/// Stable 128-bit identifier used for every entity's primary key.
pub type Id = uuid::Uuid;

/// Generate a fresh random entity identifier.
pub fn new_id() -> Id {
    uuid::Uuid::new_v4()
}
