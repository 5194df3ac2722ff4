//! Task payloads carried on the `builds` and `deploys` queues.

use serde::{Deserialize, Serialize};

use crate::Id;

/// Enqueued after a webhook intake gates a push event through, and consumed
/// by the build worker. The payload itself carries no deadline field: the
/// 30-minute build / 5-minute deploy ceilings from spec's task ceilings
/// live in `dockyard-config` and are passed into `dockyard-worker`'s
/// `poll_loop`, which both sets each lease's `lease_expires_at` at claim
/// time (`dockyard-store`'s `jobs` table, for crash-reclaim) and wraps the
/// handler call itself in `tokio::time::timeout` using the same duration,
/// so a hung build/deploy call is aborted rather than left running past
/// its lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTask {
    pub deployment_id: Id,
    pub project_id: Id,
}

/// Enqueued by the build worker after a successful image push, and consumed
/// by the deploy worker. Also used directly by a user-initiated rollback,
/// which constructs one referencing an already-built deployment's image
/// without going through the build worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployTask {
    pub deployment_id: Id,
    pub project_id: Id,
    pub image_ref: String,
    pub slug: String,
    pub listen_port: u16,
}
