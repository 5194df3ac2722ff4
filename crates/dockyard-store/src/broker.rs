//! The job broker: the `builds`/`deploys` queue pair treated as an external
//! collaborator, backed here by a `jobs` table.
//!
//! `lease` claims the oldest ready row for a queue with a single
//! `SELECT ... FOR UPDATE SKIP LOCKED` CTE feeding an `UPDATE`, so two
//! worker pool tasks racing the same queue never claim the same job — no
//! explicit advisory lock needed, since conditional updates already remove
//! the need for one.

use std::time::Duration;

use chrono::Utc;
use dockyard_types::{Error, Id};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::PgStore;

/// The two logical queues the build and deploy pipelines run through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    Builds,
    Deploys,
}

impl Queue {
    pub fn as_str(self) -> &'static str {
        match self {
            Queue::Builds => "builds",
            Queue::Deploys => "deploys",
        }
    }
}

/// A job claimed by [`PgStore::lease`]. `attempts` already reflects this
/// claim (incremented before the row is returned), so a worker comparing
/// it against `max_attempts` sees the count including the in-flight try.
pub struct LeasedJob {
    pub id: Id,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub max_attempts: i32,
}

impl LeasedJob {
    /// Deserialize the payload into the caller's task type
    /// ([`dockyard_types::BuildTask`] or [`dockyard_types::DeployTask`]).
    pub fn task<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| Error::Upstream(format!("job payload did not match expected task shape: {e}")))
    }

    pub fn exhausted_retries(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

const DEFAULT_MAX_ATTEMPTS: i32 = 3;

impl PgStore {
    /// Enqueue `payload` onto `queue`, ready immediately.
    pub async fn enqueue<T: Serialize>(&self, queue: Queue, payload: &T) -> Result<Id, Error> {
        self.enqueue_delayed(queue, payload, Duration::ZERO).await
    }

    /// Enqueue `payload` onto `queue`, not eligible for [`Self::lease`]
    /// until `delay` has elapsed — used by [`Self::release`]'s backoff and
    /// directly by callers that want a deferred first attempt.
    pub async fn enqueue_delayed<T: Serialize>(
        &self,
        queue: Queue,
        payload: &T,
        delay: Duration,
    ) -> Result<Id, Error> {
        let id = dockyard_types::new_id();
        let now = Utc::now();
        let available_at = now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        let payload = serde_json::to_value(payload)
            .map_err(|e| Error::Upstream(format!("failed to serialize job payload: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, queue, payload, status, attempts, max_attempts, available_at, created_at, updated_at)
            VALUES ($1, $2, $3, 'ready', 0, $4, $5, $6, $6)
            "#,
        )
        .bind(id)
        .bind(queue.as_str())
        .bind(payload)
        .bind(DEFAULT_MAX_ATTEMPTS)
        .bind(available_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        Ok(id)
    }

    /// Claim the oldest ready job on `queue`, marking it `in_progress` with
    /// a lease expiring after `lease_duration`. Returns `None` if nothing
    /// is ready — callers poll, they don't block here.
    pub async fn lease(&self, queue: Queue, lease_duration: Duration) -> Result<Option<LeasedJob>, Error> {
        let now = Utc::now();
        let lease_expires_at =
            now + chrono::Duration::from_std(lease_duration).unwrap_or(chrono::Duration::minutes(5));

        let row: Option<(Id, serde_json::Value, i32, i32)> = sqlx::query_as(
            r#"
            WITH next AS (
                SELECT id FROM jobs
                WHERE queue = $1 AND status = 'ready' AND available_at <= $2
                ORDER BY available_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET status = 'in_progress', attempts = jobs.attempts + 1,
                lease_expires_at = $3, updated_at = $2
            FROM next
            WHERE jobs.id = next.id
            RETURNING jobs.id, jobs.payload, jobs.attempts, jobs.max_attempts
            "#,
        )
        .bind(queue.as_str())
        .bind(now)
        .bind(lease_expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        Ok(row.map(|(id, payload, attempts, max_attempts)| LeasedJob {
            id,
            payload,
            attempts,
            max_attempts,
        }))
    }

    /// Mark a job permanently done, called after the consuming worker
    /// finishes the step the job represents (whether or not the
    /// deployment itself ended up `live` — the job's job is done once the
    /// worker has run to completion, under an "each step aborts the whole
    /// task on failure" model: a handled failure is still
    /// a completed job, not a job to retry).
    pub async fn complete(&self, job_id: Id) -> Result<(), Error> {
        sqlx::query("UPDATE jobs SET status = 'done', updated_at = $2 WHERE id = $1")
            .bind(job_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?;
        Ok(())
    }

    /// Return a job to `ready` after a transient ([`Error::is_retryable`])
    /// failure, available again after `backoff`. If the job has exhausted
    /// its retry budget, dead-letters it instead and returns `false`.
    pub async fn release(&self, job_id: Id, attempts: i32, max_attempts: i32, backoff: Duration) -> Result<bool, Error> {
        if attempts >= max_attempts {
            self.dead_letter(job_id).await?;
            return Ok(false);
        }
        let now = Utc::now();
        let available_at = now + chrono::Duration::from_std(backoff).unwrap_or(chrono::Duration::zero());
        sqlx::query(
            "UPDATE jobs SET status = 'ready', available_at = $2, lease_expires_at = NULL, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(available_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;
        Ok(true)
    }

    pub async fn dead_letter(&self, job_id: Id) -> Result<(), Error> {
        sqlx::query("UPDATE jobs SET status = 'dead', updated_at = $2 WHERE id = $1")
            .bind(job_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?;
        Ok(())
    }

    /// Reclaim jobs whose lease expired without the worker calling
    /// `complete`/`release` (a crashed worker process) back to `ready`, so
    /// a task that lost its runner is not stuck `in_progress` forever.
    /// Returns the number of jobs reclaimed.
    pub async fn reclaim_expired_leases(&self) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'ready', lease_expires_at = NULL, updated_at = $1 \
             WHERE status = 'in_progress' AND lease_expires_at < $1",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_are_stable() {
        assert_eq!(Queue::Builds.as_str(), "builds");
        assert_eq!(Queue::Deploys.as_str(), "deploys");
    }

    #[test]
    fn exhausted_retries_compares_attempts_to_max() {
        let job = LeasedJob {
            id: dockyard_types::new_id(),
            payload: serde_json::json!({}),
            attempts: 3,
            max_attempts: 3,
        };
        assert!(job.exhausted_retries());

        let job = LeasedJob { attempts: 2, ..job };
        assert!(!job.exhausted_retries());
    }

    #[test]
    fn task_deserializes_matching_payload() {
        let job = LeasedJob {
            id: dockyard_types::new_id(),
            payload: serde_json::json!({
                "deployment_id": dockyard_types::new_id(),
                "project_id": dockyard_types::new_id(),
            }),
            attempts: 1,
            max_attempts: 3,
        };
        let task: dockyard_types::BuildTask = job.task().expect("payload matches BuildTask");
        assert_eq!(task.deployment_id, job.task::<dockyard_types::BuildTask>().unwrap().deployment_id);
    }
}
