//! `/api/auth/...`: the consent redirect, the OAuth callback, session
//! teardown, and "who am I". The token-exchange dance itself lives in
//! `dockyard_sourcehost::SourceHostClient`; this module only wires it to
//! cookies.
//!
//! A short-lived `oauth_state` cookie carries the CSRF nonce between the
//! consent redirect and the callback — the only state this handshake needs
//! and cheaper than a server-side session table for a value that lives for
//! the few seconds a user spends on the source host's consent screen.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use dockyard_store::UpsertUser;
use dockyard_types::Error;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{self, Session};
use crate::dto::UserDto;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const OAUTH_STATE_COOKIE: &str = "dockyard_oauth_state";
const SUPPORTED_HOST: &str = "github";

fn check_host(host: &str) -> Result<(), Error> {
    if host != SUPPORTED_HOST {
        return Err(Error::BadInput(format!(
            "unsupported source host {host:?}: only {SUPPORTED_HOST} is implemented"
        )));
    }
    Ok(())
}

fn random_state() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..32).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect()
}

/// `GET /api/auth/<host>`: redirect the browser to the source host's
/// consent screen, stashing a CSRF nonce in a short-lived cookie.
pub async fn redirect_to_consent(
    State(state): State<AppState>,
    Path(host): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    check_host(&host)?;
    let csrf_state = random_state();
    let url = state
        .ctx
        .source_host
        .authorize_url(&state.ctx.config.source_host_redirect_url, &csrf_state);

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, csrf_state))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::minutes(10))
        .build();

    Ok((jar.add(cookie), Redirect::to(&url)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: String,
}

/// `GET /api/auth/<host>/callback`: exchange the authorization code, seal
/// the access token, upsert the user row, and set the session cookie.
pub async fn callback(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    check_host(&host)?;

    let expected_state = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    if expected_state.as_deref() != Some(query.state.as_str()) {
        return Err(Error::BadInput("oauth state did not match".into()).into());
    }

    let exchange = state
        .ctx
        .source_host
        .exchange_code(&query.code, &state.ctx.config.source_host_redirect_url)
        .await?;

    let sealed_access_token = dockyard_crypto::seal_str(&state.ctx.config.encryption_key, &exchange.access_token);

    let user = state
        .ctx
        .store
        .upsert_user(UpsertUser {
            source_host_id: exchange.user.id,
            login: &exchange.user.login,
            email: exchange.user.email.as_deref(),
            avatar_url: exchange.user.avatar_url.as_deref(),
            sealed_access_token: &sealed_access_token,
        })
        .await?;

    tracing::info!(user_id = %user.id, login = user.login, "user authenticated");

    let session_cookie = auth::issue_session_cookie(&state.ctx.config.session_signing_key, user.id);
    let jar = jar.remove(Cookie::from(OAUTH_STATE_COOKIE)).add(session_cookie);

    Ok((jar, Redirect::to("/")))
}

/// `POST /api/auth/logout`: clear the session cookie.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (jar.add(auth::clear_session_cookie()), Json(json!({ "status": "logged out" })))
}

/// `GET /api/auth/me`: the current user, per the session cookie.
pub async fn me(State(state): State<AppState>, session: Session) -> ApiResult<Json<UserDto>> {
    let user = state.ctx.store.find_user(session.user_id).await?;
    Ok(Json(user.into()))
}

/// Resolve a user's access token cleartext for source-host calls made on
/// their behalf (repo listing, webhook lifecycle). The only place upstream
/// of the deploy worker that legitimately holds the cleartext token.
pub async fn decrypt_access_token(state: &AppState, user_id: dockyard_types::Id) -> Result<String, Error> {
    let user = state.ctx.store.find_user(user_id).await?;
    dockyard_crypto::unseal_str(&state.ctx.config.encryption_key, &user.sealed_access_token)
        .map_err(|e| Error::Upstream(format!("failed to decrypt stored access token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_host() {
        assert!(matches!(check_host("gitlab"), Err(Error::BadInput(_))));
        assert!(check_host("github").is_ok());
    }

    #[test]
    fn random_state_is_reasonably_long_and_ascii() {
        let state = random_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
