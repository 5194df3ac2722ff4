//! `/api/projects/:id/env`: masked reads, sealed writes. Every handler
//! loads the project first to enforce ownership — env vars have no owner
//! of their own, they inherit the project's.

use axum::Json;
use axum::extract::{Path, State};
use dockyard_types::{EnvironmentVariable, Error, Id};

use crate::auth::{self, Session};
use crate::dto::{EnvVarDto, SetEnvVarBody};
use crate::error::ApiResult;
use crate::state::AppState;

async fn owned_project(state: &AppState, session: &Session, project_id: Id) -> Result<(), Error> {
    let project = state.ctx.store.find_project(project_id).await?;
    auth::require_owner(session, project.user_id)
}

pub async fn list_env_vars(
    State(state): State<AppState>,
    session: Session,
    Path(project_id): Path<Id>,
) -> ApiResult<Json<Vec<EnvVarDto>>> {
    owned_project(&state, &session, project_id).await?;
    let vars = dockyard_core::env_var::list_masked(&state.ctx.store, project_id).await?;
    Ok(Json(vars.into_iter().map(EnvVarDto::from).collect()))
}

pub async fn set_env_var(
    State(state): State<AppState>,
    session: Session,
    Path(project_id): Path<Id>,
    Json(body): Json<SetEnvVarBody>,
) -> ApiResult<Json<EnvVarDto>> {
    owned_project(&state, &session, project_id).await?;
    if !EnvironmentVariable::is_valid_key(&body.key) {
        return Err(Error::BadInput(format!("{:?} is not a valid environment variable key", body.key)).into());
    }

    let var = dockyard_core::env_var::set(
        &state.ctx.store,
        &state.ctx.config.encryption_key,
        project_id,
        &body.key,
        &body.value,
    )
    .await?;

    Ok(Json(var.into()))
}

pub async fn delete_env_var(
    State(state): State<AppState>,
    session: Session,
    Path((project_id, key)): Path<(Id, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_project(&state, &session, project_id).await?;
    dockyard_core::env_var::delete(&state.ctx.store, project_id, &key).await?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}
