//! Maps [`dockyard_types::Error`] onto the compact JSON error body every
//! handler returns: the behavioral variant picks the status code, the
//! message is whatever the error already carries (already scrubbed of
//! secrets at construction). `Error::AuthRequired` additionally clears the
//! session cookie on the way out (see the variant's doc comment in
//! `dockyard_types`) — a client sitting on a stale/forged/expired cookie
//! gets it cleared the next time it trips this variant, not only on an
//! explicit logout.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dockyard_types::Error;
use serde::Serialize;

use crate::auth;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::info!(error = %self.0, "request rejected");
        }
        let body = Json(ErrorBody { error: self.0.to_string() });
        if matches!(self.0, Error::AuthRequired) {
            let jar = axum_extra::extract::CookieJar::default().add(auth::clear_session_cookie());
            (status, jar, body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
