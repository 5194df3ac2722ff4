//! Route table assembly: every handler module wired onto its path, wrapped
//! in the tracing/timeout/CORS middleware stack every request passes
//! through regardless of which handler ultimately serves it.

pub mod deployments;
pub mod env_vars;
pub mod health;
pub mod oauth;
pub mod projects;
pub mod repos;
pub mod webhooks;

use std::time::Duration;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Requests that haven't resolved within this window are cut off: every
/// HTTP request runs under a deadline propagated from the layer that
/// accepted it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/{host}", get(oauth::redirect_to_consent))
        .route("/api/auth/{host}/callback", get(oauth::callback))
        .route("/api/auth/logout", post(oauth::logout))
        .route("/api/auth/me", get(oauth::me))
        .route("/api/repos", get(repos::list_repos))
        .route("/api/projects", get(projects::list_projects).post(projects::create_project))
        .route(
            "/api/projects/{id}",
            get(projects::get_project).patch(projects::update_project).delete(projects::delete_project),
        )
        .route(
            "/api/projects/{id}/env",
            get(env_vars::list_env_vars).post(env_vars::set_env_var),
        )
        .route("/api/projects/{id}/env/{key}", delete(env_vars::delete_env_var))
        .route("/api/projects/{id}/deployments", get(deployments::list_deployments))
        .route(
            "/api/projects/{id}/deployments/{deployment_id}/redeploy",
            post(deployments::redeploy),
        )
        .route("/api/deployments/{id}/cancel", post(deployments::cancel_deployment))
        .route("/api/webhooks/{host}", post(webhooks::receive))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
