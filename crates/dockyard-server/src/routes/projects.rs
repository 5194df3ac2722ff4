//! `/api/projects`: listing, creation (slug allocation plus best-effort
//! webhook wiring, via `dockyard_core::project`), update, and deletion.
//! Every handler below `GET /api/projects` also owner-checks the loaded
//! row with [`auth::require_owner`] before acting on it.

use axum::Json;
use axum::extract::{Path, State};
use dockyard_store::ProjectUpdate;
use dockyard_types::{Error, Id};

use crate::auth::{self, Session};
use crate::dto::{CreateProjectBody, ProjectDto, UpdateProjectBody};
use crate::error::ApiResult;
use crate::routes::oauth::decrypt_access_token;
use crate::state::AppState;

async fn live_url_for(state: &AppState, project_id: Id) -> Result<Option<String>, Error> {
    let live = state.ctx.store.find_live_deployment(project_id).await?;
    Ok(live.and_then(|d| d.public_url))
}

pub async fn list_projects(State(state): State<AppState>, session: Session) -> ApiResult<Json<Vec<ProjectDto>>> {
    let projects = state.ctx.store.list_projects_for_user(session.user_id).await?;
    let mut out = Vec::with_capacity(projects.len());
    for project in projects {
        let live_url = live_url_for(&state, project.id).await?;
        out.push(ProjectDto::new(project, live_url));
    }
    Ok(Json(out))
}

pub async fn create_project(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateProjectBody>,
) -> ApiResult<Json<ProjectDto>> {
    if body.name.trim().is_empty() {
        return Err(Error::BadInput("name must not be empty".into()).into());
    }
    if body.repo_full_name.trim().is_empty() {
        return Err(Error::BadInput("repo_full_name must not be empty".into()).into());
    }

    let access_token = decrypt_access_token(&state, session.user_id).await?;
    let branch = body.branch.as_deref().unwrap_or(dockyard_types::Project::DEFAULT_BRANCH);
    let root_dir = body.root_dir.as_deref().unwrap_or(dockyard_types::Project::DEFAULT_ROOT_DIR);

    let project = dockyard_core::project::create(
        &state.ctx.store,
        &state.ctx.config.encryption_key,
        &state.ctx.source_host,
        dockyard_core::project::CreateProjectInput {
            user_id: session.user_id,
            name: &body.name,
            repo_full_name: &body.repo_full_name,
            clone_url: &body.clone_url,
            branch,
            root_dir,
            access_token: &access_token,
            webhook_callback_base: &state.ctx.config.source_host_redirect_url,
        },
    )
    .await?;

    Ok(Json(ProjectDto::new(project, None)))
}

pub async fn get_project(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Id>,
) -> ApiResult<Json<ProjectDto>> {
    let project = state.ctx.store.find_project(id).await?;
    auth::require_owner(&session, project.user_id)?;
    let live_url = live_url_for(&state, project.id).await?;
    Ok(Json(ProjectDto::new(project, live_url)))
}

pub async fn update_project(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Id>,
    Json(body): Json<UpdateProjectBody>,
) -> ApiResult<Json<ProjectDto>> {
    let existing = state.ctx.store.find_project(id).await?;
    auth::require_owner(&session, existing.user_id)?;

    let project = dockyard_core::project::update(
        &state.ctx.store,
        id,
        ProjectUpdate {
            name: body.name.as_deref(),
            branch: body.branch.as_deref(),
            root_dir: body.root_dir.as_deref(),
            build_command: body.build_command.map(|v| v.as_deref()),
            start_command: body.start_command.map(|v| v.as_deref()),
        },
    )
    .await?;

    let live_url = live_url_for(&state, project.id).await?;
    Ok(Json(ProjectDto::new(project, live_url)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Id>,
) -> ApiResult<Json<serde_json::Value>> {
    let project = state.ctx.store.find_project(id).await?;
    auth::require_owner(&session, project.user_id)?;

    let access_token = decrypt_access_token(&state, session.user_id).await?;
    dockyard_core::project::delete(&state.ctx.store, &state.ctx.source_host, &access_token, id).await?;

    Ok(Json(serde_json::json!({ "status": "deleted" })))
}
