//! Slug derivation and collision-retry allocation.
//!
//! [`derive_candidate`] is pure and synchronous (lowercase, replace,
//! collapse, trim, truncate); [`allocate`] is the async retry loop that
//! checks the candidate against the store and appends a CSPRNG 4-character
//! suffix on collision, serialized by the store's `UNIQUE` constraint as
//! the final backstop against a races-with-itself double allocation.

use dockyard_store::PgStore;
use dockyard_types::{Error, Project};
use rand::Rng;

/// Collision-retry budget before giving up with [`Error::Conflict`].
const MAX_ATTEMPTS: u32 = 8;
const SUFFIX_LEN: usize = 4;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Derive the base candidate from a project name: lowercase, replace any
/// character outside `[a-z0-9-]` with `-`, collapse repeated `-`, trim
/// leading/trailing `-`, truncate to [`Project::MAX_SLUG_LEN`].
pub fn derive_candidate(name: &str) -> String {
    let lowered: String = name
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' }
        })
        .collect();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut last_was_dash = false;
    for c in lowered.chars() {
        if c == '-' {
            if !last_was_dash {
                collapsed.push(c);
            }
            last_was_dash = true;
        } else {
            collapsed.push(c);
            last_was_dash = false;
        }
    }

    let trimmed = collapsed.trim_matches('-');
    let truncated: String = trimmed.chars().take(Project::MAX_SLUG_LEN).collect();
    let truncated = truncated.trim_end_matches('-').to_string();

    if truncated.is_empty() || !truncated.chars().next().unwrap().is_ascii_lowercase() {
        // A name with no letters at all (e.g. "123" or "---") cannot
        // produce a valid leading character; fall back to a fixed prefix
        // so the candidate still matches `Project::SLUG_PATTERN`.
        format!("p-{truncated}").chars().take(Project::MAX_SLUG_LEN).collect()
    } else {
        truncated
    }
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

fn with_suffix(base: &str, suffix: &str) -> String {
    let max_base_len = Project::MAX_SLUG_LEN - suffix.len() - 1;
    let truncated_base: String = base.chars().take(max_base_len).collect();
    format!("{}-{suffix}", truncated_base.trim_end_matches('-'))
}

/// Derive a candidate from `name` and retry with a random suffix on
/// collision until a free slug is found or [`MAX_ATTEMPTS`] is exhausted.
pub async fn allocate(store: &PgStore, name: &str) -> Result<String, Error> {
    let base = derive_candidate(name);

    let mut candidate = base.clone();
    for attempt in 0..MAX_ATTEMPTS {
        if !store.slug_exists(&candidate).await? {
            return Ok(candidate);
        }
        tracing::info!(candidate, attempt, "slug collision, retrying with random suffix");
        candidate = with_suffix(&base, &random_suffix());
    }

    Err(Error::Conflict(format!(
        "could not allocate a unique slug for {name:?} after {MAX_ATTEMPTS} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_replaces_invalid_chars() {
        assert_eq!(derive_candidate("My Cool App!"), "my-cool-app");
    }

    #[test]
    fn collapses_repeated_dashes() {
        assert_eq!(derive_candidate("foo---bar"), "foo-bar");
    }

    #[test]
    fn trims_leading_and_trailing_dashes() {
        assert_eq!(derive_candidate("--hello--"), "hello");
    }

    #[test]
    fn truncates_to_max_length() {
        let candidate = derive_candidate(&"a".repeat(80));
        assert_eq!(candidate.len(), Project::MAX_SLUG_LEN);
    }

    #[test]
    fn falls_back_to_prefix_when_no_letters() {
        let candidate = derive_candidate("123 456");
        assert!(Project::is_valid_slug(&candidate), "{candidate:?} must be a valid slug");
        assert!(candidate.starts_with("p-"));
    }

    #[test]
    fn derived_candidates_are_always_valid_slugs() {
        for name in ["Hello World", "日本語App", "___", "a", "A1", "multi  space  app"] {
            let candidate = derive_candidate(name);
            assert!(Project::is_valid_slug(&candidate), "{name:?} -> {candidate:?}");
        }
    }

    #[test]
    fn with_suffix_stays_within_max_length() {
        let base = "a".repeat(60);
        let slug = with_suffix(&base, "ab12");
        assert!(slug.len() <= Project::MAX_SLUG_LEN);
        assert!(slug.ends_with("-ab12"));
    }

    proptest::proptest! {
        #[test]
        fn derive_candidate_always_produces_valid_slug(name in ".{1,100}") {
            let candidate = derive_candidate(&name);
            proptest::prop_assert!(Project::is_valid_slug(&candidate));
        }
    }
}
