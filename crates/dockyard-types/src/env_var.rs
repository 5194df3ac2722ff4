//! The sealed per-project configuration pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Id;

/// A `(project, key)` pair whose value is stored only in sealed form.
///
/// Invariant: `(project_id, key)` is unique (enforced by `dockyard-store`).
/// The cleartext value is produced only when decrypted for injection into a
/// container; every external representation of this type masks the value
/// (see [`EnvironmentVariable::masked_value`]).
#[derive(Clone, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub id: Id,
    pub project_id: Id,
    pub key: String,
    pub sealed_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnvironmentVariable {
    /// Keys must start with a letter and contain only `[A-Za-z0-9_]`, at
    /// most 255 characters total.
    pub const KEY_MAX_LEN: usize = 255;

    pub fn is_valid_key(key: &str) -> bool {
        if key.is_empty() || key.len() > Self::KEY_MAX_LEN {
            return false;
        }
        let mut chars = key.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        if !first.is_ascii_alphabetic() {
            return false;
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// The placeholder returned by every API response in place of the
    /// cleartext value, per spec's "Secret opacity" invariant.
    pub const MASK: &'static str = "••••••••";

    pub fn masked_value(&self) -> &'static str {
        Self::MASK
    }
}

impl std::fmt::Debug for EnvironmentVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentVariable")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("key", &self.key)
            .field("sealed_value", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation_accepts_spec_examples() {
        assert!(EnvironmentVariable::is_valid_key("API_KEY"));
        assert!(EnvironmentVariable::is_valid_key("port"));
        assert!(EnvironmentVariable::is_valid_key("a1_2"));
    }

    #[test]
    fn key_validation_rejects_bad_forms() {
        assert!(!EnvironmentVariable::is_valid_key(""));
        assert!(!EnvironmentVariable::is_valid_key("1KEY"));
        assert!(!EnvironmentVariable::is_valid_key("KEY-NAME"));
        assert!(!EnvironmentVariable::is_valid_key(&"A".repeat(256)));
    }

    #[test]
    fn debug_never_leaks_sealed_value() {
        let var = EnvironmentVariable {
            id: crate::new_id(),
            project_id: crate::new_id(),
            key: "API_KEY".into(),
            sealed_value: "sealed-cleartext-would-be-here".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!format!("{var:?}").contains("sealed-cleartext-would-be-here"));
    }
}
