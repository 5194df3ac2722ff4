//! Environment variable persistence: `(project, key)` uniqueness and
//! sealed-only storage. Reads here return [`dockyard_types::EnvironmentVariable`]
//! with the sealed value still attached — `dockyard-core`'s env-var service
//! is the only caller allowed to unseal it, and masks it before it ever
//! reaches an API response.

use chrono::Utc;
use dockyard_types::{EnvironmentVariable, Error, Id};

use crate::PgStore;

impl PgStore {
    /// Insert or replace the value for `(project_id, key)`, sealing having
    /// already happened at the caller (this layer never sees cleartext).
    pub async fn upsert_env_var(
        &self,
        project_id: Id,
        key: &str,
        sealed_value: &str,
    ) -> Result<EnvironmentVariable, Error> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, EnvVarRow>(
            r#"
            INSERT INTO environment_variables (id, project_id, key, sealed_value, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (project_id, key) DO UPDATE SET
                sealed_value = EXCLUDED.sealed_value,
                updated_at = EXCLUDED.updated_at
            RETURNING id, project_id, key, sealed_value, created_at, updated_at
            "#,
        )
        .bind(dockyard_types::new_id())
        .bind(project_id)
        .bind(key)
        .bind(sealed_value)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        Ok(row.into())
    }

    pub async fn list_env_vars(&self, project_id: Id) -> Result<Vec<EnvironmentVariable>, Error> {
        let rows = sqlx::query_as::<_, EnvVarRow>(
            "SELECT id, project_id, key, sealed_value, created_at, updated_at \
             FROM environment_variables WHERE project_id = $1 ORDER BY key",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn delete_env_var(&self, project_id: Id, key: &str) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM environment_variables WHERE project_id = $1 AND key = $2")
            .bind(project_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct EnvVarRow {
    id: Id,
    project_id: Id,
    key: String,
    sealed_value: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<EnvVarRow> for EnvironmentVariable {
    fn from(row: EnvVarRow) -> Self {
        EnvironmentVariable {
            id: row.id,
            project_id: row.project_id,
            key: row.key,
            sealed_value: row.sealed_value,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
