//! `GET /health`: a liveness probe that also exercises the store
//! connection with a cheap `SELECT 1`, so a database outage shows up here
//! rather than only on the next real request.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    store: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(state.ctx.store.pool())
        .await
        .is_ok();

    Json(json!(HealthBody {
        status: "ok",
        store: if store_ok { "ok" } else { "unreachable" },
    }))
}
