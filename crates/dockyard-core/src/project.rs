//! The project service: creation (slug allocation + best-effort webhook
//! wiring), update, and teardown, respecting the cascade/webhook
//! invariants the data model relies on.

use dockyard_crypto::MasterKey;
use dockyard_sourcehost::SourceHostClient;
use dockyard_store::{NewProject, PgStore, ProjectUpdate};
use dockyard_types::{Error, Project};

use crate::slug;

pub struct CreateProjectInput<'a> {
    pub user_id: dockyard_types::Id,
    pub name: &'a str,
    pub repo_full_name: &'a str,
    pub clone_url: &'a str,
    pub branch: &'a str,
    pub root_dir: &'a str,
    /// Source host access token for the owning user, used for the
    /// best-effort webhook creation call. Cleartext, already decrypted by
    /// the caller from the user's sealed token.
    pub access_token: &'a str,
    /// Base URL the control plane's webhook intake is reachable at,
    /// e.g. `https://dockyard.example`.
    pub webhook_callback_base: &'a str,
}

/// Create a project: allocate a slug, reject a duplicate `(owner, repo)`
/// up front with a 400, insert the row, then best-effort create a webhook
/// on the source host. A webhook failure is logged and swallowed, not
/// propagated — the project still exists, just without automatic deploys
/// until rewired.
pub async fn create(
    store: &PgStore,
    key: &MasterKey,
    source_host: &SourceHostClient,
    input: CreateProjectInput<'_>,
) -> Result<Project, Error> {
    if store.find_project_by_repo(input.repo_full_name).await?.is_some() {
        return Err(Error::BadInput(format!(
            "a project already exists for repository {}",
            input.repo_full_name
        )));
    }

    let slug = slug::allocate(store, input.name).await?;

    let project = store
        .create_project(NewProject {
            user_id: input.user_id,
            name: input.name,
            slug: &slug,
            repo_full_name: input.repo_full_name,
            clone_url: input.clone_url,
            branch: input.branch,
            root_dir: input.root_dir,
        })
        .await?;

    tracing::info!(project_id = %project.id, slug, repo = input.repo_full_name, "project created");

    let callback_url = format!("{}/api/webhooks/github", input.webhook_callback_base);
    let webhook_secret = generate_webhook_secret();

    match source_host
        .create_webhook(input.access_token, input.repo_full_name, &callback_url, &webhook_secret)
        .await
    {
        Ok(webhook_id) => {
            let sealed_secret = dockyard_crypto::seal_str(key, &webhook_secret);
            store.set_project_webhook(project.id, Some(&webhook_id), Some(&sealed_secret)).await?;
            tracing::info!(project_id = %project.id, "webhook created on source host");
        }
        Err(e) => {
            tracing::warn!(project_id = %project.id, error = %e, "webhook creation failed, continuing without it");
        }
    }

    store.find_project(project.id).await
}

pub async fn update(store: &PgStore, id: dockyard_types::Id, update: ProjectUpdate<'_>) -> Result<Project, Error> {
    store.update_project(id, update).await
}

/// Delete a project: tear down its webhook on the source host first (best
/// effort — a source-host failure here does not block deletion, since a
/// stranded webhook is lower cost than a project the user cannot remove),
/// then delete the row (cascading to deployments and env vars).
pub async fn delete(
    store: &PgStore,
    source_host: &SourceHostClient,
    access_token: &str,
    id: dockyard_types::Id,
) -> Result<(), Error> {
    let project = store.find_project(id).await?;

    if let Some(webhook_id) = &project.webhook_id {
        if let Err(e) = source_host.delete_webhook(access_token, &project.repo_full_name, webhook_id).await {
            tracing::warn!(project_id = %id, error = %e, "webhook teardown failed, deleting project anyway");
        }
    }

    store.delete_project(id).await
}

/// A random, URL-safe webhook secret distinct from any env-var value or
/// access token — generated fresh per project rather than reusing the
/// encryption master key for anything HMAC-related.
fn generate_webhook_secret() -> String {
    use rand::Rng;
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..40).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_secret_is_reasonably_long_and_ascii() {
        let secret = generate_webhook_secret();
        assert_eq!(secret.len(), 40);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
