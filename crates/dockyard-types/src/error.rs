//! The behavioral error taxonomy every crate above the persistence layer
//! maps its failures into.
//!
//! Variant names describe the *behavior* the caller should exhibit, not an
//! implementation detail — matching spec's framing of "behavioral kinds,
//! not type names". The API layer (`dockyard-server`) maps each variant to
//! an HTTP status via [`Error::status_code`]; workers (`dockyard-core`,
//! `dockyard-worker`) never construct an HTTP response and instead log with
//! the deployment id and set the row `failed`.

/// Secrets must never appear in error text — every variant that wraps a
/// message is expected to have already scrubbed secret material before
/// constructing the error (callers own that responsibility; this type does
/// not attempt redaction on arbitrary strings because it cannot know which
/// substrings are sensitive).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No or invalid session. The API layer also clears the session cookie.
    #[error("authentication required")]
    AuthRequired,

    /// Valid session, but not the resource owner.
    #[error("forbidden")]
    Forbidden,

    /// Resource missing.
    #[error("not found")]
    NotFound,

    /// Malformed body, bad slug, bad env-var key, bad pagination, etc.
    #[error("bad input: {0}")]
    BadInput(String),

    /// Slug or `(project, key)` collision after the retry budget, or a
    /// project already exists for the given repo.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Source-host API failure, registry failure, or container-engine
    /// failure. Transient from a worker's perspective — the broker retries.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Webhook HMAC mismatch or missing signature header. No state change
    /// precedes this error by construction (see `dockyard-webhook`).
    #[error("signature verification failed")]
    Signature,

    /// Misconfiguration at startup (missing session key, undersized
    /// encryption key). The process refuses to start.
    #[error("fatal configuration error: {0}")]
    Fatal(String),
}

impl Error {
    /// HTTP status the API layer should respond with for this error. Not
    /// meaningful for worker-originated errors, which never reach an HTTP
    /// response.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::AuthRequired => 401,
            Error::Forbidden => 403,
            Error::NotFound => 404,
            Error::BadInput(_) => 400,
            Error::Conflict(_) => 409,
            Error::Upstream(_) => 502,
            Error::Signature => 401,
            Error::Fatal(_) => 500,
        }
    }

    /// Whether a worker encountering this error should let the broker retry
    /// the task, versus giving up and recording `failed` immediately.
    /// Matches spec §7: Upstream is transient for workers; everything else
    /// a worker can produce is treated as permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Upstream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(Error::AuthRequired.status_code(), 401);
        assert_eq!(Error::Forbidden.status_code(), 403);
        assert_eq!(Error::NotFound.status_code(), 404);
        assert_eq!(Error::BadInput("bad slug".into()).status_code(), 400);
        assert_eq!(Error::Conflict("slug taken".into()).status_code(), 409);
        assert_eq!(Error::Upstream("registry down".into()).status_code(), 502);
        assert_eq!(Error::Signature.status_code(), 401);
        assert_eq!(Error::Fatal("no session key".into()).status_code(), 500);
    }

    #[test]
    fn only_upstream_is_retryable() {
        assert!(Error::Upstream("timeout".into()).is_retryable());
        assert!(!Error::NotFound.is_retryable());
        assert!(!Error::Signature.is_retryable());
        assert!(!Error::Conflict("x".into()).is_retryable());
    }
}
