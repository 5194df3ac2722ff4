//! The deploy worker: the seven steps that take a built image and an empty
//! slot in the proxy's routing table to a live, traffic-serving container.
//!
//! Same failure-handling shape as [`crate::build`]: anything that goes
//! wrong driving the container engine is terminal for the deployment (a
//! call to `deployment::fail`, job still marked complete); a store-level
//! error reading rows or issuing a transition propagates so the broker
//! retries the task.

use dockyard_core::{Context, deployment, env_var};
use dockyard_runtime::{ContainerEngine, ContainerSpec, RoutingLabels};
use dockyard_store::AdvanceExtra;
use dockyard_types::{DeployTask, DeploymentStatus, Error, Project};

pub async fn run<E: ContainerEngine>(ctx: &Context<E>, task: DeployTask) -> Result<(), Error> {
    let deployment_row = ctx.store.find_deployment(task.deployment_id).await?;
    if deployment_row.status != DeploymentStatus::Deploying {
        tracing::info!(
            deployment_id = %task.deployment_id,
            status = %deployment_row.status,
            "deploy task redelivered after the deployment moved on, aborting silently"
        );
        return Ok(());
    }

    let project = ctx.store.find_project(task.project_id).await?;

    let container_id = match place_container(ctx, &task, &project).await {
        Ok(container_id) => container_id,
        Err(reason) => {
            tracing::warn!(deployment_id = %task.deployment_id, reason, "deploy failed");
            deployment::fail(&ctx.store, task.deployment_id, &reason).await?;
            return Ok(());
        }
    };

    let public_url = project.public_url(&ctx.config.base_domain);

    let Some(_) = deployment::advance(
        &ctx.store,
        task.deployment_id,
        DeploymentStatus::Deploying,
        DeploymentStatus::Live,
        AdvanceExtra {
            container_id: Some(&container_id),
            public_url: Some(&public_url),
            ..Default::default()
        },
    )
    .await?
    else {
        return Ok(());
    };

    deployment::supersede(&ctx.store, task.project_id, task.deployment_id).await?;

    tracing::info!(deployment_id = %task.deployment_id, public_url, "deployment live");
    Ok(())
}

/// Steps 2 through 6: inject env, retire the previous container, pull,
/// create, start. Returns the new container's engine-assigned id.
async fn place_container<E: ContainerEngine>(
    ctx: &Context<E>,
    task: &DeployTask,
    project: &Project,
) -> Result<String, String> {
    let mut env = env_var::decrypt_for_injection(&ctx.store, &ctx.config.encryption_key, task.project_id)
        .await
        .map_err(|e| e.to_string())?;
    env.entry("PORT".to_string()).or_insert_with(|| task.listen_port.to_string());

    let container_name = project.container_name(&ctx.config.container_name_prefix);

    if let Some(existing) = ctx
        .container_engine
        .find_by_name(&container_name)
        .await
        .map_err(|e| e.to_string())?
    {
        ctx.container_engine
            .stop_container(&existing.id)
            .await
            .map_err(|e| e.to_string())?;
        ctx.container_engine
            .remove_container(&existing.id)
            .await
            .map_err(|e| e.to_string())?;
    }

    ctx.container_engine
        .pull_image(&task.image_ref)
        .await
        .map_err(|e| e.to_string())?;

    let labels = RoutingLabels {
        slug: task.slug.clone(),
        base_domain: ctx.config.base_domain.clone(),
        listen_port: task.listen_port,
        tls_enabled: ctx.config.tls_enabled,
        cert_resolver: ctx.config.cert_resolver.clone(),
    }
    .build();

    let spec = ContainerSpec {
        name: container_name,
        image: task.image_ref.clone(),
        env,
        labels,
        network: ctx.config.proxy_network.clone(),
        memory_limit_bytes: ctx.config.container_memory_limit_bytes,
        cpu_limit: ctx.config.container_cpu_limit,
    };

    let container_id = ctx.container_engine.create_container(&spec).await.map_err(|e| e.to_string())?;
    ctx.container_engine
        .start_container(&container_id)
        .await
        .map_err(|e| e.to_string())?;

    Ok(container_id)
}
