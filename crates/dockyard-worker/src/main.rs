//! The build/deploy worker binary: two polling loops over the `builds` and
//! `deploys` queues, each bounded by a semaphore so a burst of leased jobs
//! never outruns the host's capacity to run `docker build`/`docker run`
//! concurrently.

mod build;
mod deploy;
mod git;

use std::sync::Arc;
use std::time::Duration;

use dockyard_config::Config;
use dockyard_core::Context;
use dockyard_runtime::BollardEngine;
use dockyard_store::{PgStore, Queue};
use dockyard_types::{BuildTask, DeployTask, Error};

/// How often an idle worker polls its queue for a ready job.
const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How often the reaper sweeps for jobs whose lease expired without the
/// worker calling `complete`/`release` (a crashed process).
const RECLAIM_INTERVAL: Duration = Duration::from_secs(30);
/// How many jobs per queue a single process runs concurrently.
const CONCURRENCY: usize = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url).await?;
    let engine = BollardEngine::connect()?;
    let build_deadline = config.build_task_deadline;
    let deploy_deadline = config.deploy_task_deadline;
    let ctx = Arc::new(Context::new(store, config, engine));

    tracing::info!("dockyard-worker starting");

    tokio::spawn(reclaim_loop(ctx.clone()));

    let builds = tokio::spawn(poll_loop(
        ctx.clone(),
        Queue::Builds,
        build_deadline,
        |ctx, task: BuildTask| async move { build::run(&ctx, task).await },
    ));
    let deploys = tokio::spawn(poll_loop(
        ctx.clone(),
        Queue::Deploys,
        deploy_deadline,
        |ctx, task: DeployTask| async move { deploy::run(&ctx, task).await },
    ));

    let _ = tokio::try_join!(builds, deploys)?;
    Ok(())
}

async fn reclaim_loop<E: dockyard_runtime::ContainerEngine>(ctx: Arc<Context<E>>) {
    let mut ticker = tokio::time::interval(RECLAIM_INTERVAL);
    loop {
        ticker.tick().await;
        match ctx.store.reclaim_expired_leases().await {
            Ok(0) => {}
            Ok(n) => tracing::warn!(reclaimed = n, "reclaimed jobs with an expired lease"),
            Err(e) => tracing::error!(error = %e, "failed to reclaim expired leases"),
        }
    }
}

/// Poll `queue` forever, leasing jobs up to `CONCURRENCY` at a time and
/// running each through `handler`. On `Ok(())` the job is marked complete
/// whether or not the deployment itself succeeded — a handled failure is
/// still a finished job, not a job to retry (see `build`/`deploy`'s own
/// doc comments). On `Err`, the job is released with an exponential
/// backoff computed from its attempt count, or dead-lettered if its retry
/// budget is exhausted.
async fn poll_loop<E, T, F, Fut>(
    ctx: Arc<Context<E>>,
    queue: Queue,
    lease_duration: Duration,
    handler: F,
) where
    E: dockyard_runtime::ContainerEngine + 'static,
    T: serde::de::DeserializeOwned + Send + 'static,
    F: Fn(Arc<Context<E>>, T) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = Result<(), Error>> + Send + 'static,
{
    let semaphore = Arc::new(tokio::sync::Semaphore::new(CONCURRENCY));
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        ticker.tick().await;

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => continue,
        };

        let job = match ctx.store.lease(queue, lease_duration).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                drop(permit);
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, ?queue, "failed to lease job");
                drop(permit);
                continue;
            }
        };

        let task: T = match job.task() {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "undeserializable job payload, dead-lettering");
                let _ = ctx.store.dead_letter(job.id).await;
                drop(permit);
                continue;
            }
        };

        let ctx = ctx.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let _permit = permit;
            // Bound the handler by the same duration its lease was granted
            // for: a hung clone/build/push or container call is aborted
            // here instead of running past `lease_expires_at` while
            // `reclaim_loop` hands the same job to a second worker.
            let outcome = match tokio::time::timeout(lease_duration, handler(ctx.clone(), task)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Upstream(format!(
                    "job exceeded its {lease_duration:?} deadline and was aborted"
                ))),
            };
            match outcome {
                Ok(()) => {
                    if let Err(e) = ctx.store.complete(job.id).await {
                        tracing::error!(job_id = %job.id, error = %e, "failed to mark job complete");
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "job attempt failed, releasing for retry");
                    let backoff = dockyard_retry::calculate_delay(
                        &dockyard_retry::RetryPolicy::Default.to_config(),
                        job.attempts as u32,
                    );
                    if let Err(e) = ctx.store.release(job.id, job.attempts, job.max_attempts, backoff).await {
                        tracing::error!(job_id = %job.id, error = %e, "failed to release job");
                    }
                }
            }
        });
    }
}
