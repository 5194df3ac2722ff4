//! The deployment orchestrator: five operations (`create`, `advance`,
//! `supersede`, `fail`, `cancel`), as a thin, logged wrapper over
//! `dockyard-store`'s linearizable persistence layer.
//!
//! This layer's only job beyond the store's own guarantees is to reject an
//! illegal transition *before* issuing the `UPDATE` (using
//! [`DeploymentStatus::can_advance_to`] as the single source of truth for
//! the transition graph) and to log every attempt, success, and lost race
//! keyed by deployment id — callers never need to inspect `Ok(None)`
//! themselves to know whether to log anything.

use dockyard_store::{AdvanceExtra, NewDeployment, PgStore};
use dockyard_types::{Deployment, DeploymentStatus, Error, Id};

pub async fn create(store: &PgStore, fields: NewDeployment<'_>) -> Result<Deployment, Error> {
    let project_id = fields.project_id;
    let deployment = store.create_deployment(fields).await?;
    tracing::info!(deployment_id = %deployment.id, %project_id, "deployment created, pending");
    Ok(deployment)
}

/// Attempt `from -> to`. Returns `Ok(None)` if another worker already
/// moved the row past `from` — the caller must abort silently, not retry
/// or surface an error.
pub async fn advance(
    store: &PgStore,
    id: Id,
    from: DeploymentStatus,
    to: DeploymentStatus,
    extra: AdvanceExtra<'_>,
) -> Result<Option<Deployment>, Error> {
    if !from.can_advance_to(to) {
        tracing::error!(deployment_id = %id, %from, %to, "rejected illegal transition before issuing it");
        return Err(Error::BadInput(format!("{from} cannot advance to {to}")));
    }

    match store.advance(id, from, to, extra).await? {
        Some(deployment) => {
            tracing::info!(deployment_id = %id, %from, %to, "transition applied");
            Ok(Some(deployment))
        }
        None => {
            tracing::info!(deployment_id = %id, %from, %to, "lost the race or already applied, aborting silently");
            Ok(None)
        }
    }
}

/// Demote every other `live` deployment of `project_id`, the final step of
/// every successful promotion, to keep "at most one live deployment per
/// project" true at all times.
pub async fn supersede(store: &PgStore, project_id: Id, except: Id) -> Result<Vec<Id>, Error> {
    let superseded = store.supersede(project_id, except).await?;
    if !superseded.is_empty() {
        tracing::info!(%project_id, promoted = %except, superseded = ?superseded, "promotion superseded prior live deployments");
    }
    Ok(superseded)
}

pub async fn fail(store: &PgStore, id: Id, reason: &str) -> Result<Option<Deployment>, Error> {
    let result = store.fail(id, reason).await?;
    match &result {
        Some(_) => tracing::warn!(deployment_id = %id, reason, "deployment failed"),
        None => tracing::info!(deployment_id = %id, "fail no-op, already terminal"),
    }
    Ok(result)
}

/// User-initiated cancel. Legal only from `{pending, building, deploying}`
/// (enforced by the store); a `live` deployment cannot be cancelled, only
/// superseded by a fresh deploy.
pub async fn cancel(store: &PgStore, id: Id) -> Result<Option<Deployment>, Error> {
    let result = store.cancel(id).await?;
    match &result {
        Some(_) => tracing::info!(deployment_id = %id, "deployment cancelled"),
        None => tracing::info!(deployment_id = %id, "cancel no-op, already terminal"),
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_transition_is_rejected_before_touching_the_store() {
        assert!(!DeploymentStatus::Pending.can_advance_to(DeploymentStatus::Live));
        assert!(!DeploymentStatus::Live.can_advance_to(DeploymentStatus::Building));
    }
}
