//! In-memory [`ContainerEngine`], not built for production use. Lets the
//! build/deploy workers be exercised in tests without a real Docker daemon.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use dockyard_types::Error;

use crate::{ContainerEngine, ContainerHandle, ContainerSpec, ContainerState};

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    name: String,
    state: ContainerState,
    logs: String,
}

/// A fake engine that tracks containers in memory. `pulled_images` and
/// `created` are exposed for assertions in tests that wire up the
/// orchestrator end to end.
#[derive(Default)]
pub struct FakeEngine {
    inner: Mutex<FakeEngineState>,
}

#[derive(Default)]
struct FakeEngineState {
    containers: HashMap<String, FakeContainer>,
    pulled_images: Vec<String>,
    built_images: Vec<String>,
    pushed_images: Vec<String>,
    next_id: u64,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.inner.lock().unwrap().pulled_images.clone()
    }

    /// Tags passed to `build_image`, in call order, for asserting the build
    /// worker picked the right tag without a real Docker daemon.
    pub fn built_images(&self) -> Vec<String> {
        self.inner.lock().unwrap().built_images.clone()
    }

    pub fn pushed_images(&self) -> Vec<String> {
        self.inner.lock().unwrap().pushed_images.clone()
    }

    /// Preload logs that `logs()` should return for a container, to drive
    /// failure-reporting tests.
    pub fn set_logs(&self, container_id: &str, logs: impl Into<String>) {
        let mut state = self.inner.lock().unwrap();
        if let Some(container) = state.containers.get_mut(container_id) {
            container.logs = logs.into();
        }
    }
}

impl ContainerEngine for FakeEngine {
    async fn pull_image(&self, image: &str) -> Result<(), Error> {
        self.inner.lock().unwrap().pulled_images.push(image.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, Error> {
        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state.containers.values().find(|c| c.name == spec.name) {
            return Ok(existing.id.clone());
        }
        state.next_id += 1;
        let id = format!("fake-{}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                id: id.clone(),
                name: spec.name.clone(),
                state: ContainerState::Created,
                logs: String::new(),
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), Error> {
        let mut state = self.inner.lock().unwrap();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::NotFound)?;
        container.state = ContainerState::Running;
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<(), Error> {
        let mut state = self.inner.lock().unwrap();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::NotFound)?;
        container.state = ContainerState::Exited;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), Error> {
        self.inner.lock().unwrap().containers.remove(id);
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ContainerHandle>, Error> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .containers
            .values()
            .find(|c| c.name == name)
            .map(|c| ContainerHandle {
                id: c.id.clone(),
                name: c.name.clone(),
                state: c.state,
            }))
    }

    async fn logs(&self, id: &str, _tail_lines: usize) -> Result<String, Error> {
        let state = self.inner.lock().unwrap();
        state
            .containers
            .get(id)
            .map(|c| c.logs.clone())
            .ok_or_else(|| Error::NotFound)
    }

    async fn build_image(&self, _context_dir: &Path, tag: &str) -> Result<(), Error> {
        self.inner.lock().unwrap().built_images.push(tag.to_string());
        Ok(())
    }

    async fn push_image(&self, tag: &str) -> Result<(), Error> {
        self.inner.lock().unwrap().pushed_images.push(tag.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn spec(name: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "registry.example.com/app:abc123".to_string(),
            env: Map::new(),
            labels: Map::new(),
            network: "dockyard-proxy".to_string(),
            memory_limit_bytes: 512 * 1024 * 1024,
            cpu_limit: 0.5,
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_by_name() {
        let engine = FakeEngine::new();
        let first = engine.create_container(&spec("app-main")).await.unwrap();
        let second = engine.create_container(&spec("app-main")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn start_and_stop_transition_state() {
        let engine = FakeEngine::new();
        let id = engine.create_container(&spec("app-main")).await.unwrap();
        engine.start_container(&id).await.unwrap();
        let handle = engine.find_by_name("app-main").await.unwrap().unwrap();
        assert_eq!(handle.state, ContainerState::Running);

        engine.stop_container(&id).await.unwrap();
        let handle = engine.find_by_name("app-main").await.unwrap().unwrap();
        assert_eq!(handle.state, ContainerState::Exited);
    }

    #[tokio::test]
    async fn remove_drops_the_container() {
        let engine = FakeEngine::new();
        let id = engine.create_container(&spec("app-main")).await.unwrap();
        engine.remove_container(&id).await.unwrap();
        assert!(engine.find_by_name("app-main").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pull_image_is_recorded() {
        let engine = FakeEngine::new();
        engine.pull_image("registry.example.com/app:abc123").await.unwrap();
        assert_eq!(engine.pulled_images(), vec!["registry.example.com/app:abc123"]);
    }

    #[tokio::test]
    async fn logs_returns_preloaded_output() {
        let engine = FakeEngine::new();
        let id = engine.create_container(&spec("app-main")).await.unwrap();
        engine.set_logs(&id, "listening on :3000\n");
        let logs = engine.logs(&id, 100).await.unwrap();
        assert_eq!(logs, "listening on :3000\n");
    }

    #[tokio::test]
    async fn build_and_push_are_recorded() {
        let engine = FakeEngine::new();
        let dir = std::env::temp_dir();
        engine.build_image(&dir, "registry.example.com/app:abc123").await.unwrap();
        engine.push_image("registry.example.com/app:abc123").await.unwrap();
        assert_eq!(engine.built_images(), vec!["registry.example.com/app:abc123"]);
        assert_eq!(engine.pushed_images(), vec!["registry.example.com/app:abc123"]);
    }
}
