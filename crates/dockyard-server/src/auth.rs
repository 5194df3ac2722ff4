//! Session cookie issuance and verification: a JWT (HS256, 7-day expiry)
//! carrying the user id, delivered as an HTTP-only, SameSite=Lax cookie.
//! `Session` is a [`FromRequestParts`] extractor so every session-gated
//! handler just adds it to its argument list instead of re-parsing the
//! cookie itself, the same centralizing role an `ApiKey` extractor plays
//! for header/basic-auth parsing.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use dockyard_types::{Error, Id};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "dockyard_session";
const SESSION_LIFETIME_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Id,
    exp: i64,
}

/// Mint a session cookie for `user_id`, valid for
/// [`SESSION_LIFETIME_DAYS`].
pub fn issue_session_cookie(signing_key: &[u8], user_id: Id) -> Cookie<'static> {
    let exp = (Utc::now() + Duration::days(SESSION_LIFETIME_DAYS)).timestamp();
    let claims = Claims { sub: user_id, exp };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(signing_key))
        .expect("HS256 encoding of a small claims struct does not fail");

    Cookie::build((SESSION_COOKIE_NAME, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(SESSION_LIFETIME_DAYS))
        .build()
}

/// A cookie that clears the session, used by `/api/auth/logout` and by any
/// handler that rejects a session as invalid.
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

fn verify(signing_key: &[u8], token: &str) -> Result<Id, Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(signing_key),
        &Validation::default(),
    )
    .map_err(|_| Error::AuthRequired)?;
    Ok(data.claims.sub)
}

/// The authenticated user id, extracted from the session cookie. Any
/// handler taking `Session` in its argument list rejects with
/// [`Error::AuthRequired`] (401) before the handler body runs if the
/// cookie is missing, expired, or fails signature verification.
pub struct Session {
    pub user_id: Id,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = crate::error::ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .ok_or(Error::AuthRequired)?;
        let user_id = verify(&state.ctx.config.session_signing_key, &token)?;
        Ok(Session { user_id })
    }
}

/// Not a real extractor (axum has no access to the path's captured `:id`
/// without naming its type), just the 403 check every owner-gated handler
/// performs once it has loaded the project: the session's user must match
/// the project's owner.
pub fn require_owner(session: &Session, project_user_id: Id) -> Result<(), Error> {
    if session.user_id == project_user_id {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}
