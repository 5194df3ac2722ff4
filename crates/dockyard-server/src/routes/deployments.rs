//! Deployment listing, rollback, and cancellation. Not named in the route
//! table the rest of the API grew from, but `dockyard_core::deployment`'s
//! `cancel` operation and the rollback mechanism both need *some* HTTP
//! entry point — grounded on the same create/advance plumbing the build and
//! deploy workers use, just driven from a handler instead of a leased job.

use axum::Json;
use axum::extract::{Path, State};
use dockyard_store::{AdvanceExtra, NewDeployment, Queue};
use dockyard_types::{DeployTask, DeploymentStatus, Error, Id};

use crate::auth::{self, Session};
use crate::dto::DeploymentDto;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_deployments(
    State(state): State<AppState>,
    session: Session,
    Path(project_id): Path<Id>,
) -> ApiResult<Json<Vec<DeploymentDto>>> {
    let project = state.ctx.store.find_project(project_id).await?;
    auth::require_owner(&session, project.user_id)?;

    let deployments = state.ctx.store.list_deployments_for_project(project_id).await?;
    Ok(Json(deployments.into_iter().map(DeploymentDto::from).collect()))
}

/// Rollback: a user-initiated redeploy of an already-built commit,
/// bypassing the build worker entirely by enqueueing a deploy task that
/// references the source deployment's existing image reference.
pub async fn redeploy(
    State(state): State<AppState>,
    session: Session,
    Path((project_id, source_id)): Path<(Id, Id)>,
) -> ApiResult<Json<DeploymentDto>> {
    let project = state.ctx.store.find_project(project_id).await?;
    auth::require_owner(&session, project.user_id)?;

    let source = state.ctx.store.find_deployment(source_id).await?;
    if source.project_id != project_id {
        return Err(Error::NotFound.into());
    }
    let Some(image_ref) = source.image_ref.clone() else {
        return Err(Error::BadInput("source deployment has no built image to redeploy".into()).into());
    };

    let deployment = dockyard_core::deployment::create(
        &state.ctx.store,
        NewDeployment {
            project_id,
            commit_sha: &source.commit_sha,
            commit_message: source.commit_message.as_deref(),
            commit_author: source.commit_author.as_deref(),
            branch: &source.branch,
        },
    )
    .await?;

    let Some(_) = dockyard_core::deployment::advance(
        &state.ctx.store,
        deployment.id,
        DeploymentStatus::Pending,
        DeploymentStatus::Building,
        AdvanceExtra::default(),
    )
    .await?
    else {
        return Err(Error::Fatal("freshly created deployment lost the race to itself".into()).into());
    };

    let Some(deployment) = dockyard_core::deployment::advance(
        &state.ctx.store,
        deployment.id,
        DeploymentStatus::Building,
        DeploymentStatus::Deploying,
        AdvanceExtra { image_ref: Some(&image_ref), ..Default::default() },
    )
    .await?
    else {
        return Err(Error::Fatal("freshly created deployment lost the race to itself".into()).into());
    };

    state
        .ctx
        .store
        .enqueue(
            Queue::Deploys,
            &DeployTask {
                deployment_id: deployment.id,
                project_id,
                image_ref,
                slug: project.slug.clone(),
                listen_port: project.listen_port,
            },
        )
        .await?;

    tracing::info!(deployment_id = %deployment.id, source_id = %source_id, "rollback deploy task enqueued");

    Ok(Json(deployment.into()))
}

pub async fn cancel_deployment(
    State(state): State<AppState>,
    session: Session,
    Path(deployment_id): Path<Id>,
) -> ApiResult<Json<DeploymentDto>> {
    let deployment = state.ctx.store.find_deployment(deployment_id).await?;
    let project = state.ctx.store.find_project(deployment.project_id).await?;
    auth::require_owner(&session, project.user_id)?;

    let Some(cancelled) = dockyard_core::deployment::cancel(&state.ctx.store, deployment_id).await? else {
        return Err(Error::Conflict("deployment is already in a terminal state".into()).into());
    };

    Ok(Json(cancelled.into()))
}
