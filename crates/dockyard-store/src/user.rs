//! User persistence: created on first successful authentication, updated
//! on every subsequent one, looked up by the source host's integer id.

use chrono::Utc;
use dockyard_types::{Error, Id, User};

use crate::PgStore;

/// Fields carried by an authentication callback, used for both the
/// first-seen insert and every subsequent update.
pub struct UpsertUser<'a> {
    pub source_host_id: i64,
    pub login: &'a str,
    pub email: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub sealed_access_token: &'a str,
}

impl PgStore {
    /// Insert a new user or update the existing one for this
    /// `source_host_id`: created on first successful authentication,
    /// updated on every subsequent one.
    pub async fn upsert_user(&self, fields: UpsertUser<'_>) -> Result<User, Error> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, source_host_id, login, email, avatar_url, sealed_access_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (source_host_id) DO UPDATE SET
                login = EXCLUDED.login,
                email = EXCLUDED.email,
                avatar_url = EXCLUDED.avatar_url,
                sealed_access_token = EXCLUDED.sealed_access_token,
                updated_at = EXCLUDED.updated_at
            RETURNING id, source_host_id, login, email, avatar_url, sealed_access_token, created_at, updated_at
            "#,
        )
        .bind(dockyard_types::new_id())
        .bind(fields.source_host_id)
        .bind(fields.login)
        .bind(fields.email)
        .bind(fields.avatar_url)
        .bind(fields.sealed_access_token)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        Ok(row.into())
    }

    pub async fn find_user(&self, id: Id) -> Result<User, Error> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, source_host_id, login, email, avatar_url, sealed_access_token, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?
        .ok_or(Error::NotFound)?;

        Ok(row.into())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Id,
    source_host_id: i64,
    login: String,
    email: Option<String>,
    avatar_url: Option<String>,
    sealed_access_token: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            source_host_id: row.source_host_id,
            login: row.login,
            email: row.email,
            avatar_url: row.avatar_url,
            sealed_access_token: row.sealed_access_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
