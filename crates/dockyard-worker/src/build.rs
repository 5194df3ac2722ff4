//! The build worker: the nine steps that turn a pending deployment into an
//! image sitting in the registry, run once per leased `BuildTask`.
//!
//! Failure inside the actual build (clone, detect, image build/push) is
//! terminal for the deployment — caught in [`build_and_push`] and turned
//! into a call to `dockyard_core::deployment::fail`, with the job itself
//! still marked complete at the broker (see `main`'s dispatch loop: a
//! `fail`-and-`Ok(())` outcome is not a reason to retry). A failure reading
//! the deployment/project rows or issuing a transition propagates as an
//! `Error` instead, so the broker retries the whole task — that is a store
//! hiccup, not a verdict on the deployment.

use dockyard_core::{Context, deployment};
use dockyard_runtime::ContainerEngine;
use dockyard_store::{AdvanceExtra, Queue};
use dockyard_types::{BuildTask, Deployment, DeployTask, DeploymentStatus, Error, Project};

use crate::git;

pub async fn run<E: ContainerEngine>(ctx: &Context<E>, task: BuildTask) -> Result<(), Error> {
    let Some(_) = deployment::advance(
        &ctx.store,
        task.deployment_id,
        DeploymentStatus::Pending,
        DeploymentStatus::Building,
        AdvanceExtra::default(),
    )
    .await?
    else {
        return Ok(());
    };

    let deployment_row = ctx.store.find_deployment(task.deployment_id).await?;
    let project = ctx.store.find_project(task.project_id).await?;

    let (image_ref, listen_port) = match build_and_push(ctx, &deployment_row, &project).await {
        Ok(outcome) => outcome,
        Err(reason) => {
            tracing::warn!(deployment_id = %task.deployment_id, reason, "build failed");
            deployment::fail(&ctx.store, task.deployment_id, &reason).await?;
            return Ok(());
        }
    };

    let Some(_) = deployment::advance(
        &ctx.store,
        task.deployment_id,
        DeploymentStatus::Building,
        DeploymentStatus::Deploying,
        AdvanceExtra { image_ref: Some(&image_ref), ..Default::default() },
    )
    .await?
    else {
        return Ok(());
    };

    ctx.store
        .enqueue(
            Queue::Deploys,
            &DeployTask {
                deployment_id: task.deployment_id,
                project_id: task.project_id,
                image_ref,
                slug: project.slug.clone(),
                listen_port,
            },
        )
        .await?;

    tracing::info!(deployment_id = %task.deployment_id, "build complete, deploy task enqueued");
    Ok(())
}

/// Steps 2 through 7: checkout, detect, synthesize, build, push. Every
/// error here is already a human-readable reason for `deployment::fail` —
/// by this point the only question left is whether the deployment failed,
/// not whether to retry the broker task.
async fn build_and_push<E: ContainerEngine>(
    ctx: &Context<E>,
    deployment: &Deployment,
    project: &Project,
) -> Result<(String, u16), String> {
    let workdir =
        tempfile::tempdir().map_err(|e| format!("failed to create working directory: {e}"))?;
    let repo_root = workdir.path().join("repo");

    git::shallow_clone(&project.clone_url, &project.branch, &repo_root)
        .await
        .map_err(|e| e.to_string())?;
    git::fetch_commit(&repo_root, &deployment.commit_sha).await;
    git::checkout(&repo_root, &deployment.commit_sha)
        .await
        .map_err(|e| e.to_string())?;

    let build_dir = repo_root.join(&project.root_dir);
    let detection = dockyard_detect::detect(&build_dir);

    let listen_port = if project.runtime.is_some() { project.listen_port } else { detection.port };
    let build_command = project.build_command.as_deref().or(detection.build_command.as_deref());
    let start_command = project.start_command.as_deref().or(detection.start_command.as_deref());

    if !build_dir.join("Dockerfile").is_file() {
        if let Some(dockerfile) = dockyard_detect::synthesize_dockerfile(
            &detection,
            build_command,
            start_command,
            listen_port,
        ) {
            tokio::fs::write(build_dir.join("Dockerfile"), dockerfile)
                .await
                .map_err(|e| format!("failed to write synthesized Dockerfile: {e}"))?;
        }
    }

    if project.runtime.is_none() {
        ctx.store
            .set_project_runtime(project.id, detection.runtime, listen_port)
            .await
            .map_err(|e| format!("failed to persist detected runtime: {e}"))?;
    }

    let image_ref = deployment.image_tag(&ctx.config.registry_url);

    ctx.container_engine
        .build_image(&build_dir, &image_ref)
        .await
        .map_err(|e| e.to_string())?;
    ctx.container_engine
        .push_image(&image_ref)
        .await
        .map_err(|e| e.to_string())?;

    Ok((image_ref, listen_port))
}
