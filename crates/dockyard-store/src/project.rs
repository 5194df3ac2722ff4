//! Project persistence: the repo-to-deployment binding, its globally
//! unique slug, and the webhook identifier/secret pair that must be set
//! together or both left null (enforced here and by the schema's check
//! constraint).

use chrono::Utc;
use dockyard_types::{Error, Id, Project, Runtime};

use crate::PgStore;

/// Fields needed to create a project. `slug` is expected to already be
/// allocated (uniqueness-checked) by the caller — `dockyard-core`'s slug
/// allocator owns the collision-retry loop; this layer only enforces the
/// `UNIQUE` constraint as the final backstop.
pub struct NewProject<'a> {
    pub user_id: Id,
    pub name: &'a str,
    pub slug: &'a str,
    pub repo_full_name: &'a str,
    pub clone_url: &'a str,
    pub branch: &'a str,
    pub root_dir: &'a str,
}

/// Partial update for `PATCH /api/projects/:id`. `None` fields are left
/// unchanged.
#[derive(Default)]
pub struct ProjectUpdate<'a> {
    pub name: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub root_dir: Option<&'a str>,
    pub build_command: Option<Option<&'a str>>,
    pub start_command: Option<Option<&'a str>>,
}

impl PgStore {
    pub async fn create_project(&self, fields: NewProject<'_>) -> Result<Project, Error> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            INSERT INTO projects
                (id, user_id, name, slug, repo_full_name, clone_url, branch, root_dir,
                 listen_port, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING id, user_id, name, slug, repo_full_name, clone_url, branch, root_dir,
                      build_command, start_command, runtime, listen_port, webhook_id,
                      sealed_webhook_secret, created_at, updated_at
            "#,
        )
        .bind(dockyard_types::new_id())
        .bind(fields.user_id)
        .bind(fields.name)
        .bind(fields.slug)
        .bind(fields.repo_full_name)
        .bind(fields.clone_url)
        .bind(fields.branch)
        .bind(fields.root_dir)
        .bind(Runtime::Unknown.default_port() as i32)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;

        Ok(row.into())
    }

    pub async fn find_project(&self, id: Id) -> Result<Project, Error> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!("{PROJECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?
            .ok_or(Error::NotFound)?;
        Ok(row.into())
    }

    /// Looked up by the webhook intake using the push payload's
    /// `repository.full_name`.
    pub async fn find_project_by_repo(&self, repo_full_name: &str) -> Result<Option<Project>, Error> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!("{PROJECT_COLUMNS} WHERE repo_full_name = $1"))
            .bind(repo_full_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    pub async fn list_projects_for_user(&self, user_id: Id) -> Result<Vec<Project>, Error> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            "{PROJECT_COLUMNS} WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Whether `slug` is already taken, used by the slug allocator's
    /// collision-retry loop.
    pub async fn slug_exists(&self, slug: &str) -> Result<bool, Error> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?;
        Ok(exists)
    }

    pub async fn update_project(&self, id: Id, update: ProjectUpdate<'_>) -> Result<Project, Error> {
        let current = self.find_project(id).await?;
        let name = update.name.unwrap_or(&current.name);
        let branch = update.branch.unwrap_or(&current.branch);
        let root_dir = update.root_dir.unwrap_or(&current.root_dir);
        let build_command = update.build_command.unwrap_or(current.build_command.as_deref());
        let start_command = update.start_command.unwrap_or(current.start_command.as_deref());
        let now = Utc::now();

        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            UPDATE projects
            SET name = $2, branch = $3, root_dir = $4, build_command = $5,
                start_command = $6, updated_at = $7
            WHERE id = $1
            RETURNING id, user_id, name, slug, repo_full_name, clone_url, branch, root_dir,
                      build_command, start_command, runtime, listen_port, webhook_id,
                      sealed_webhook_secret, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(branch)
        .bind(root_dir)
        .bind(build_command)
        .bind(start_command)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?
        .ok_or(Error::NotFound)?;

        Ok(row.into())
    }

    /// Record the detected runtime and listen port once the first build
    /// has probed the working directory.
    pub async fn set_project_runtime(
        &self,
        id: Id,
        runtime: Runtime,
        listen_port: u16,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE projects SET runtime = $2, listen_port = $3, updated_at = $4 WHERE id = $1")
            .bind(id)
            .bind(runtime.to_persisted_str())
            .bind(listen_port as i32)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?;
        Ok(())
    }

    /// Record the webhook identifier and sealed secret together, or clear
    /// both — the schema's check constraint enforces they're never set
    /// independently.
    pub async fn set_project_webhook(
        &self,
        id: Id,
        webhook_id: Option<&str>,
        sealed_secret: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(
            "UPDATE projects SET webhook_id = $2, sealed_webhook_secret = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(webhook_id)
        .bind(sealed_secret)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(crate::map_sqlx_error)?;
        Ok(())
    }

    /// Delete a project. `ON DELETE CASCADE` on `deployments` and
    /// `environment_variables` handles the dependent-row cascade; webhook
    /// teardown on the source host is the caller's responsibility (it
    /// happens before this call, using the row's
    /// `webhook_id`/`sealed_webhook_secret`).
    pub async fn delete_project(&self, id: Id) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(crate::map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}

const PROJECT_COLUMNS: &str = "SELECT id, user_id, name, slug, repo_full_name, clone_url, branch, \
    root_dir, build_command, start_command, runtime, listen_port, webhook_id, \
    sealed_webhook_secret, created_at, updated_at FROM projects";

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Id,
    user_id: Id,
    name: String,
    slug: String,
    repo_full_name: String,
    clone_url: String,
    branch: String,
    root_dir: String,
    build_command: Option<String>,
    start_command: Option<String>,
    runtime: Option<String>,
    listen_port: i32,
    webhook_id: Option<String>,
    sealed_webhook_secret: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            slug: row.slug,
            repo_full_name: row.repo_full_name,
            clone_url: row.clone_url,
            branch: row.branch,
            root_dir: row.root_dir,
            build_command: row.build_command,
            start_command: row.start_command,
            runtime: row.runtime.as_deref().and_then(Runtime::from_persisted_str),
            listen_port: row.listen_port as u16,
            webhook_id: row.webhook_id,
            sealed_webhook_secret: row.sealed_webhook_secret,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
