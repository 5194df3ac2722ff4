//! The authenticated-human record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Id;

/// A human who has authenticated against the source host at least once.
///
/// `sealed_access_token` holds the AES-256-GCM-sealed OAuth access token for
/// the source host (see `dockyard-crypto`); it is never serialized in API
/// responses (see [`User::Debug`] below and the API layer's response DTOs,
/// which omit the field entirely rather than relying on redaction at this
/// layer alone).
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    /// Integer identity on the source host, unique per host.
    pub source_host_id: i64,
    /// Display handle (login) on the source host.
    pub login: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    /// AES-256-GCM sealed OAuth access token for the source host.
    pub sealed_access_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("source_host_id", &self.source_host_id)
            .field("login", &self.login)
            .field("email", &self.email)
            .field("avatar_url", &self.avatar_url)
            .field("sealed_access_token", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_access_token() {
        let user = User {
            id: crate::new_id(),
            source_host_id: 42,
            login: "octocat".into(),
            email: None,
            avatar_url: None,
            sealed_access_token: "super-secret-sealed-blob".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let debug = format!("{user:?}");
        assert!(!debug.contains("super-secret-sealed-blob"));
        assert!(debug.contains("[REDACTED]"));
    }
}
