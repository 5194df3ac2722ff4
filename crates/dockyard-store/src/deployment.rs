//! Deployment persistence: the state machine's durable half.
//!
//! [`PgStore::advance`] is a single `UPDATE ... WHERE id = $1 AND status =
//! $2` statement — the affected-row count (via `RETURNING`, here: "did a row
//! come back") is the "was this my transition?" signal. A worker that
//! re-delivers an already-handled task sees `Ok(None)` and aborts silently;
//! it is never surfaced as an error, since losing the race is an expected
//! outcome, not a failure.

use chrono::{DateTime, Utc};
use dockyard_types::{Deployment, DeploymentStatus, Error, Id};

use crate::PgStore;

pub struct NewDeployment<'a> {
    pub project_id: Id,
    pub commit_sha: &'a str,
    pub commit_message: Option<&'a str>,
    pub commit_author: Option<&'a str>,
    pub branch: &'a str,
}

/// Extra columns to persist alongside a successful [`PgStore::advance`],
/// e.g. the image reference produced by `building -> deploying`, or the
/// container id and public URL produced by `deploying -> live`.
#[derive(Default)]
pub struct AdvanceExtra<'a> {
    pub image_ref: Option<&'a str>,
    pub container_id: Option<&'a str>,
    pub public_url: Option<&'a str>,
}

impl PgStore {
    pub async fn create_deployment(&self, fields: NewDeployment<'_>) -> Result<Deployment, Error> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            INSERT INTO deployments
                (id, project_id, commit_sha, commit_message, commit_author, branch, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, project_id, commit_sha, commit_message, commit_author, branch, status,
                      image_ref, container_id, public_url, error_message, created_at,
                      build_started_at, completed_at
            "#,
        )
        .bind(dockyard_types::new_id())
        .bind(fields.project_id)
        .bind(fields.commit_sha)
        .bind(fields.commit_message)
        .bind(fields.commit_author)
        .bind(fields.branch)
        .bind(DeploymentStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        let deployment: Deployment = row.into();
        self.record_event(deployment.id, None, DeploymentStatus::Pending, None).await?;
        Ok(deployment)
    }

    pub async fn find_deployment(&self, id: Id) -> Result<Deployment, Error> {
        let row = sqlx::query_as::<_, DeploymentRow>(&format!("{DEPLOYMENT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?
            .ok_or(Error::NotFound)?;
        Ok(row.into())
    }

    pub async fn list_deployments_for_project(&self, project_id: Id) -> Result<Vec<Deployment>, Error> {
        let rows = sqlx::query_as::<_, DeploymentRow>(&format!(
            "{DEPLOYMENT_COLUMNS} WHERE project_id = $1 ORDER BY created_at DESC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// At most one row per project can be `live`; this is how callers
    /// find it, e.g. to report a project's current
    /// public URL.
    pub async fn find_live_deployment(&self, project_id: Id) -> Result<Option<Deployment>, Error> {
        let row = sqlx::query_as::<_, DeploymentRow>(&format!(
            "{DEPLOYMENT_COLUMNS} WHERE project_id = $1 AND status = $2"
        ))
        .bind(project_id)
        .bind(DeploymentStatus::Live.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    /// Atomic `from -> to` transition. Returns `Ok(None)` if the row's
    /// current status was not `from` — the caller lost the race (or the
    /// task was redelivered after already succeeding) and must abort
    /// silently rather than retry or error.
    pub async fn advance(
        &self,
        id: Id,
        from: DeploymentStatus,
        to: DeploymentStatus,
        extra: AdvanceExtra<'_>,
    ) -> Result<Option<Deployment>, Error> {
        let now = Utc::now();
        let build_started_at = matches!(to, DeploymentStatus::Building).then_some(now);
        let completed_at = to.is_terminal().then_some(now);

        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            UPDATE deployments
            SET status = $3,
                image_ref = COALESCE($4, image_ref),
                container_id = COALESCE($5, container_id),
                public_url = COALESCE($6, public_url),
                build_started_at = COALESCE($7, build_started_at),
                completed_at = COALESCE($8, completed_at)
            WHERE id = $1 AND status = $2
            RETURNING id, project_id, commit_sha, commit_message, commit_author, branch, status,
                      image_ref, container_id, public_url, error_message, created_at,
                      build_started_at, completed_at
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(extra.image_ref)
        .bind(extra.container_id)
        .bind(extra.public_url)
        .bind(build_started_at)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        let Some(row) = row else { return Ok(None) };
        let deployment: Deployment = row.into();
        self.record_event(id, Some(from), to, None).await?;
        Ok(Some(deployment))
    }

    /// Demote every other `live` deployment of `project_id` to
    /// `superseded`, in one statement. Returns the ids that were
    /// superseded, for the event log.
    pub async fn supersede(&self, project_id: Id, except: Id) -> Result<Vec<Id>, Error> {
        let ids: Vec<Id> = sqlx::query_scalar(
            r#"
            UPDATE deployments
            SET status = $3, completed_at = $4
            WHERE project_id = $1 AND status = $2 AND id <> $5
            RETURNING id
            "#,
        )
        .bind(project_id)
        .bind(DeploymentStatus::Live.as_str())
        .bind(DeploymentStatus::Superseded.as_str())
        .bind(Utc::now())
        .bind(except)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        for id in &ids {
            self.record_event(*id, Some(DeploymentStatus::Live), DeploymentStatus::Superseded, None)
                .await?;
        }
        Ok(ids)
    }

    /// Terminal, from any non-terminal state. Unlike [`Self::advance`] this
    /// does not pin an expected `from` status — a build or deploy worker
    /// calling `fail` knows only that something went wrong, not which
    /// status the row was last observed in.
    pub async fn fail(&self, id: Id, reason: &str) -> Result<Option<Deployment>, Error> {
        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            UPDATE deployments
            SET status = $2, error_message = $3, completed_at = $4
            WHERE id = $1 AND status NOT IN ($5, $6, $7)
            RETURNING id, project_id, commit_sha, commit_message, commit_author, branch, status,
                      image_ref, container_id, public_url, error_message, created_at,
                      build_started_at, completed_at
            "#,
        )
        .bind(id)
        .bind(DeploymentStatus::Failed.as_str())
        .bind(reason)
        .bind(Utc::now())
        .bind(DeploymentStatus::Failed.as_str())
        .bind(DeploymentStatus::Cancelled.as_str())
        .bind(DeploymentStatus::Superseded.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        let Some(row) = row else { return Ok(None) };
        let deployment: Deployment = row.into();
        self.record_event(id, None, DeploymentStatus::Failed, Some(reason)).await?;
        Ok(Some(deployment))
    }

    /// Terminal, legal only from `{pending, building, deploying}` —
    /// enforced here by excluding every terminal status (including `live`,
    /// which cancel cannot touch: a live
    /// deployment is rolled back with a fresh deploy, not cancelled).
    pub async fn cancel(&self, id: Id) -> Result<Option<Deployment>, Error> {
        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            UPDATE deployments
            SET status = $2, completed_at = $3
            WHERE id = $1 AND status IN ($4, $5, $6)
            RETURNING id, project_id, commit_sha, commit_message, commit_author, branch, status,
                      image_ref, container_id, public_url, error_message, created_at,
                      build_started_at, completed_at
            "#,
        )
        .bind(id)
        .bind(DeploymentStatus::Cancelled.as_str())
        .bind(Utc::now())
        .bind(DeploymentStatus::Pending.as_str())
        .bind(DeploymentStatus::Building.as_str())
        .bind(DeploymentStatus::Deploying.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        let Some(row) = row else { return Ok(None) };
        let deployment: Deployment = row.into();
        self.record_event(id, None, DeploymentStatus::Cancelled, None).await?;
        Ok(Some(deployment))
    }

    async fn record_event(
        &self,
        deployment_id: Id,
        from: Option<DeploymentStatus>,
        to: DeploymentStatus,
        detail: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO deployment_events (id, deployment_id, from_status, to_status, detail, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(dockyard_types::new_id())
        .bind(deployment_id)
        .bind(from.map(|s| s.as_str()))
        .bind(to.as_str())
        .bind(detail)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;
        Ok(())
    }
}

const DEPLOYMENT_COLUMNS: &str = "SELECT id, project_id, commit_sha, commit_message, commit_author, \
    branch, status, image_ref, container_id, public_url, error_message, created_at, \
    build_started_at, completed_at FROM deployments";

#[derive(sqlx::FromRow)]
struct DeploymentRow {
    id: Id,
    project_id: Id,
    commit_sha: String,
    commit_message: Option<String>,
    commit_author: Option<String>,
    branch: String,
    status: String,
    image_ref: Option<String>,
    container_id: Option<String>,
    public_url: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    build_started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<DeploymentRow> for Deployment {
    fn from(row: DeploymentRow) -> Self {
        Deployment {
            id: row.id,
            project_id: row.project_id,
            commit_sha: row.commit_sha,
            commit_message: row.commit_message,
            commit_author: row.commit_author,
            branch: row.branch,
            status: DeploymentStatus::from_str_opt(&row.status)
                .unwrap_or(DeploymentStatus::Failed),
            image_ref: row.image_ref,
            container_id: row.container_id,
            public_url: row.public_url,
            error_message: row.error_message,
            created_at: row.created_at,
            build_started_at: row.build_started_at,
            completed_at: row.completed_at,
        }
    }
}
