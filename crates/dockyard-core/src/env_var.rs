//! The environment-variable service: seal on write, mask on every read
//! except the dedicated decrypt-for-injection path the deploy worker uses.

use std::collections::HashMap;

use dockyard_crypto::MasterKey;
use dockyard_store::PgStore;
use dockyard_types::{EnvironmentVariable, Error, Id};

/// Seal `value` under `key` and upsert it for `(project_id, key)`. Caller
/// is responsible for validating `key` against
/// [`EnvironmentVariable::is_valid_key`] before calling this — done at the
/// API layer so the 400 response can name the field.
pub async fn set(
    store: &PgStore,
    key: &MasterKey,
    project_id: Id,
    env_key: &str,
    value: &str,
) -> Result<EnvironmentVariable, Error> {
    let sealed = dockyard_crypto::seal_str(key, value);
    let var = store.upsert_env_var(project_id, env_key, &sealed).await?;
    tracing::info!(%project_id, env_key, "environment variable set");
    Ok(var)
}

/// List a project's environment variables with their values masked — the
/// only shape ever returned to the API (spec's "Secret opacity"
/// invariant). Callers that need cleartext must use [`decrypt_for_injection`].
pub async fn list_masked(store: &PgStore, project_id: Id) -> Result<Vec<EnvironmentVariable>, Error> {
    store.list_env_vars(project_id).await
}

pub async fn delete(store: &PgStore, project_id: Id, env_key: &str) -> Result<(), Error> {
    store.delete_env_var(project_id, env_key).await?;
    tracing::info!(%project_id, env_key, "environment variable deleted");
    Ok(())
}

/// Decrypt every environment variable for `project_id` into a cleartext
/// key-value mapping, for injection into a container at deploy time. The
/// only caller of this function should be the deploy worker; nothing
/// upstream of it should hold decrypted values.
pub async fn decrypt_for_injection(
    store: &PgStore,
    key: &MasterKey,
    project_id: Id,
) -> Result<HashMap<String, String>, Error> {
    let vars = store.list_env_vars(project_id).await?;
    let mut out = HashMap::with_capacity(vars.len());
    for var in vars {
        let plaintext = dockyard_crypto::unseal_str(key, &var.sealed_value)
            .map_err(|e| Error::Fatal(format!("failed to decrypt environment variable {}: {e}", var.key)))?;
        out.insert(var.key, plaintext);
    }
    Ok(out)
}
