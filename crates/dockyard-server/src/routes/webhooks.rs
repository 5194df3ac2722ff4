//! `POST /api/webhooks/<host>`: the inbound push-event intake. Signature
//! verification happens against the raw request body, captured via the
//! `Bytes` extractor *before* any JSON decoding — see `dockyard_webhook`'s
//! module docs for why the ordering matters.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use dockyard_store::{NewDeployment, Queue};
use dockyard_types::{BuildTask, Error};
use dockyard_webhook::{GateResult, PushEvent};
use serde_json::json;

use crate::error::ApiResult;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";

pub async fn receive(
    State(state): State<AppState>,
    Path(host): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<axum::response::Response> {
    if host != "github" {
        return Err(Error::BadInput(format!("unsupported source host {host:?}")).into());
    }

    let event_kind = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("");
    if event_kind != "push" {
        return Ok(Json(json!({ "status": "event ignored", "reason": "not a push event" })).into_response());
    }

    let event: PushEvent = serde_json::from_slice(&body)
        .map_err(|e| Error::BadInput(format!("malformed push event payload: {e}")))?;

    let Some(project) = state.ctx.store.find_project_by_repo(&event.repository.full_name).await? else {
        return Ok(Json(json!({ "status": "no associated project" })).into_response());
    };

    let Some(sealed_secret) = &project.sealed_webhook_secret else {
        return Err(Error::AuthRequired.into());
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::Signature)?;

    let secret = dockyard_crypto::unseal_str(&state.ctx.config.encryption_key, sealed_secret)
        .map_err(|e| Error::Fatal(format!("failed to decrypt stored webhook secret: {e}")))?;

    if !dockyard_webhook::verify_signature(secret.as_bytes(), &body, signature) {
        return Err(Error::Signature.into());
    }

    match dockyard_webhook::gate_push_event(&event, &project.branch) {
        GateResult::Skip(reason) => Ok(Json(json!({ "status": "skipped", "reason": reason })).into_response()),
        GateResult::Proceed => {
            let head_commit = event.head_commit.as_ref().expect("gate_push_event requires a head commit to proceed");

            let deployment = dockyard_core::deployment::create(
                &state.ctx.store,
                NewDeployment {
                    project_id: project.id,
                    commit_sha: &event.after,
                    commit_message: Some(head_commit.message.as_str()),
                    commit_author: Some(head_commit.author.name.as_str()),
                    branch: &project.branch,
                },
            )
            .await?;

            state
                .ctx
                .store
                .enqueue(
                    Queue::Builds,
                    &BuildTask { deployment_id: deployment.id, project_id: project.id },
                )
                .await?;

            tracing::info!(deployment_id = %deployment.id, project_id = %project.id, "push accepted, build enqueued");

            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "status": "accepted", "deployment_id": deployment.id })),
            )
                .into_response())
        }
    }
}
