//! The container-engine driver: a narrow seam (pull, create, start, stop,
//! remove, find-by-name, logs, build, push) the build and deploy workers
//! talk to instead of the Docker API directly, so a different runtime — or
//! a fake, in tests — can stand in without touching orchestration logic.
//!
//! `build_image` tars up a checked-out source tree into an in-memory build
//! context and hands it to `bollard`'s streaming build API, the same shape
//! a dedicated image-pushing CLI in the pack uses to assemble a context
//! with the `tar` crate before talking to a registry.
//!
//! [`BollardEngine`] is the production implementation, talking to the local
//! Docker socket via `bollard`: image config assembly, create-or-reuse-by-
//! name, label application. [`fake::FakeEngine`] is an in-memory stand-in
//! with the same trait, not built for production use, the same
//! swappable-backend pattern a `StorageBackend`/`StateStore` trait gives
//! other storage-facing services.

pub mod fake;
pub mod labels;

use std::collections::HashMap;
use std::path::Path;

use dockyard_types::Error;

pub use labels::RoutingLabels;

/// Everything needed to create a user workload container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub network: String,
    pub memory_limit_bytes: u64,
    pub cpu_limit: f64,
}

/// Lifecycle status of a container, as reported by `find_by_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Exited,
    Created,
    Unknown,
}

/// A container the engine knows about.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub state: ContainerState,
}

/// The narrow interface the deploy worker and the orchestrator use to
/// manage user workload containers. Implementors own all engine-specific
/// detail (API version, socket path, auth) behind this seam.
pub trait ContainerEngine: Send + Sync {
    /// Pull `image` from the configured registry, a no-op if already
    /// present locally.
    fn pull_image(
        &self,
        image: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Create (or, if a container by this name already exists, reuse) a
    /// container from `spec`. Returns the engine-assigned container id.
    fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    fn start_container(&self, id: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn stop_container(&self, id: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Remove a container, force-killing it first if still running.
    fn remove_container(&self, id: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Look up a container by its platform-assigned name, for idempotent
    /// create-or-reuse and for superseding an old deployment's container.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ContainerHandle>, Error>> + Send;

    /// Fetch the tail of a container's stdout/stderr, for surfacing build
    /// or boot failures in `error_message`.
    fn logs(&self, id: &str, tail_lines: usize) -> impl Future<Output = Result<String, Error>> + Send;

    /// Build an image from `context_dir` (a checked-out source tree with a
    /// `Dockerfile` at its root, synthesized or otherwise) tagged `tag`.
    fn build_image(
        &self,
        context_dir: &Path,
        tag: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Push a previously built image to the registry encoded in `tag`.
    fn push_image(&self, tag: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Production [`ContainerEngine`] backed by the local Docker socket.
pub struct BollardEngine {
    docker: bollard::Docker,
}

impl BollardEngine {
    /// Connect using the platform default (Unix socket on Linux, named
    /// pipe on Windows), matching `bollard::Docker::connect_with_local_defaults`.
    pub fn connect() -> Result<Self, Error> {
        let docker = bollard::Docker::connect_with_local_defaults()
            .map_err(|e| Error::Fatal(format!("failed to connect to docker: {e}")))?;
        Ok(Self { docker })
    }
}

impl ContainerEngine for BollardEngine {
    async fn pull_image(&self, image: &str) -> Result<(), Error> {
        use futures_util::StreamExt;

        let options = bollard::image::CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(chunk) = stream.next().await {
            chunk.map_err(|e| Error::Upstream(format!("image pull failed for {image}: {e}")))?;
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, Error> {
        if let Some(existing) = self.find_by_name(&spec.name).await? {
            return Ok(existing.id);
        }

        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let host_config = bollard::models::HostConfig {
            network_mode: Some(spec.network.clone()),
            memory: Some(spec.memory_limit_bytes as i64),
            nano_cpus: Some((spec.cpu_limit * 1_000_000_000.0) as i64),
            // Every user workload container restarts unless the platform
            // itself stopped it; the spec gives no per-project
            // configurability here, so this is not a `ContainerSpec` field.
            restart_policy: Some(bollard::models::RestartPolicy {
                name: Some(bollard::models::RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let config = bollard::container::Config {
            image: Some(spec.image.clone()),
            env: Some(env),
            labels: Some(spec.labels.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = bollard::container::CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| Error::Upstream(format!("container create failed for {}: {e}", spec.name)))?;

        Ok(created.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), Error> {
        self.docker
            .start_container::<String>(id, None)
            .await
            .map_err(|e| Error::Upstream(format!("container start failed for {id}: {e}")))
    }

    async fn stop_container(&self, id: &str) -> Result<(), Error> {
        self.docker
            .stop_container(id, None)
            .await
            .map_err(|e| Error::Upstream(format!("container stop failed for {id}: {e}")))
    }

    async fn remove_container(&self, id: &str) -> Result<(), Error> {
        let options = bollard::container::RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| Error::Upstream(format!("container remove failed for {id}: {e}")))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ContainerHandle>, Error> {
        match self.docker.inspect_container(name, None).await {
            Ok(inspected) => {
                let id = inspected.id.unwrap_or_default();
                let state = match inspected
                    .state
                    .and_then(|s| s.status)
                    .map(|s| s.to_string())
                    .as_deref()
                {
                    Some("running") => ContainerState::Running,
                    Some("exited") => ContainerState::Exited,
                    Some("created") => ContainerState::Created,
                    _ => ContainerState::Unknown,
                };
                Ok(Some(ContainerHandle { id, name: name.to_string(), state }))
            }
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                Ok(None)
            }
            Err(e) => Err(Error::Upstream(format!("container inspect failed for {name}: {e}"))),
        }
    }

    async fn logs(&self, id: &str, tail_lines: usize) -> Result<String, Error> {
        use futures_util::StreamExt;

        let options = bollard::container::LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail_lines.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(id, Some(options));
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Upstream(format!("container logs failed for {id}: {e}")))?;
            out.push_str(&chunk.to_string());
        }
        Ok(out)
    }

    async fn build_image(&self, context_dir: &Path, tag: &str) -> Result<(), Error> {
        use futures_util::StreamExt;

        let context_dir = context_dir.to_path_buf();
        let tarball = tokio::task::spawn_blocking(move || tar_build_context(&context_dir))
            .await
            .map_err(|e| Error::Upstream(format!("build context assembly panicked: {e}")))?
            .map_err(|e| Error::Upstream(format!("failed to assemble build context for {tag}: {e}")))?;

        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(tarball.into()));
        while let Some(chunk) = stream.next().await {
            let info = chunk.map_err(|e| Error::Upstream(format!("image build failed for {tag}: {e}")))?;
            if let Some(error) = info.error {
                return Err(Error::Upstream(format!("image build failed for {tag}: {error}")));
            }
        }
        Ok(())
    }

    async fn push_image(&self, tag: &str) -> Result<(), Error> {
        use futures_util::StreamExt;

        let mut stream = self.docker.push_image::<String>(tag, None, None);
        while let Some(chunk) = stream.next().await {
            let info = chunk.map_err(|e| Error::Upstream(format!("image push failed for {tag}: {e}")))?;
            if let Some(error) = info.error {
                return Err(Error::Upstream(format!("image push failed for {tag}: {error}")));
            }
        }
        Ok(())
    }
}

/// Tar up `context_dir` into an in-memory archive suitable as a Docker
/// build context body. Run on a blocking thread since `tar` is synchronous
/// I/O and a source tree can be large enough to matter.
fn tar_build_context(context_dir: &Path) -> std::io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_dir_all(".", context_dir)?;
    builder.into_inner()
}
