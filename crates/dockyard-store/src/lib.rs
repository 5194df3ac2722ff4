//! Postgres-backed persistence for users, projects, environment variables,
//! deployments, and the job broker.
//!
//! One [`PgStore`] wraps a single [`sqlx::PgPool`]; every entity's
//! operations live in their own module (mirroring `dockyard_types`' module
//! split) as `impl PgStore` blocks rather than separate repository traits —
//! there is exactly one backend, so a `StateStore`-style trait indirection
//! for swappable backends buys nothing here and is dropped in favor of a
//! plain struct, the way other sqlx-backed services structure their
//! persistence layer.

#![forbid(unsafe_code)]

mod broker;
mod deployment;
mod env_var;
mod project;
mod schema;
mod user;

pub use broker::{LeasedJob, Queue};
pub use project::{NewProject, ProjectUpdate};
pub use deployment::{AdvanceExtra, NewDeployment};
pub use user::UpsertUser;

use dockyard_types::Error;
use sqlx::postgres::{PgPoolOptions, PgPool};

/// Default pool size when the caller doesn't override it. Matches the
/// teacher's default worker concurrency in spirit: small enough that a
/// misbehaving query can't starve the whole process.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run the idempotent schema script. Call once at process
    /// startup in `dockyard-server` and `dockyard-worker` alike — both
    /// processes share one database, so either can be first to create the
    /// tables.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        Self::connect_with_pool_size(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn connect_with_pool_size(database_url: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| Error::Fatal(format!("failed to connect to database: {e}")))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an already-constructed pool, used by tests that set up their
    /// own `PgPoolOptions` (e.g. against a per-test schema).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::raw_sql(schema::SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Fatal(format!("failed to apply schema: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Translate a raw driver error into the behavioral taxonomy. A unique
/// constraint violation becomes [`Error::Conflict`] (the slug/repo/project-key
/// uniqueness invariants); anything else — connection loss,
/// timeout, protocol error — becomes [`Error::Upstream`], since from a
/// worker's perspective a database hiccup is exactly as transient as a
/// registry or source-host hiccup and should be retried the same way.
fn map_sqlx_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return Error::Conflict(db_err.message().to_string());
        }
        if db_err.is_check_violation() {
            return Error::BadInput(db_err.message().to_string());
        }
    }
    match err {
        sqlx::Error::RowNotFound => Error::NotFound,
        other => Error::Upstream(other.to_string()),
    }
}
