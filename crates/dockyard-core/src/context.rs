//! The shared handle every handler and worker task is given: the store
//! pool, config, source-host client, and container engine, bundled as a
//! global store handle passed into handlers by reference.
//!
//! Generic over the container engine rather than a boxed trait object,
//! since [`dockyard_runtime::ContainerEngine`]'s methods return `impl
//! Future` (native async fn in traits) and are therefore not dyn-safe.
//! `dockyard-server` and `dockyard-worker` each monomorphize this once,
//! over `BollardEngine` in production and `FakeEngine` in tests.

use dockyard_config::Config;
use dockyard_runtime::ContainerEngine;
use dockyard_sourcehost::SourceHostClient;
use dockyard_store::PgStore;

pub struct Context<E: ContainerEngine> {
    pub store: PgStore,
    pub config: Config,
    pub source_host: SourceHostClient,
    pub container_engine: E,
}

impl<E: ContainerEngine> Context<E> {
    pub fn new(store: PgStore, config: Config, container_engine: E) -> Self {
        let source_host = SourceHostClient::new(
            config.source_host_client_id.clone(),
            config.source_host_client_secret.clone(),
        );
        Self { store, config, source_host, container_engine }
    }
}
