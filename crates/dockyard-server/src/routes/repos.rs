//! `GET /api/repos`: the candidate-repo picker behind "New Project",
//! proxied straight through to the source host using the caller's own
//! stored access token.

use axum::Json;
use axum::extract::{Query, State};

use crate::dto::{PageQuery, RepoDto};
use crate::error::ApiResult;
use crate::routes::oauth::decrypt_access_token;
use crate::state::AppState;
use crate::auth::Session;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PAGE_SIZE: u32 = 30;

pub async fn list_repos(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<RepoDto>>> {
    let access_token = decrypt_access_token(&state, session.user_id).await?;
    let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let repos = state.ctx.source_host.list_repos(&access_token, page, page_size).await?;
    Ok(Json(repos.into_iter().map(RepoDto::from).collect()))
}
