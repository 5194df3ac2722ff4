//! Inbound webhook handling: signature verification and push-event gating.
//!
//! The source host signs every delivery with the project's webhook secret
//! as `X-Hub-Signature-256: sha256=<hex>`. [`verify_signature`] recomputes
//! the HMAC over the raw request body and compares it in constant time —
//! never deserialize the payload before the signature has been checked
//! against the raw bytes, since re-serializing first would let a
//! formatting difference hide a forged body.
//!
//! [`gate_push_event`] then decides whether a verified push should become
//! a deployment at all: branch mismatches, branch deletions, and the
//! zero-SHA sentinel GitHub sends on deletion all fall out of scope here,
//! before a single row is written.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("signature header was missing the sha256= prefix")]
    MissingPrefix,
    #[error("signature header was not valid hex")]
    InvalidHex,
    #[error("webhook secret was empty")]
    EmptySecret,
}

/// Verify `signature_header` (the raw `X-Hub-Signature-256` value) against
/// `raw_body` under `secret`. Returns `false` rather than an error on a
/// malformed header, since a caller only needs to know accept-or-reject.
pub fn verify_signature(secret: &[u8], raw_body: &[u8], signature_header: &str) -> bool {
    match verify_signature_checked(secret, raw_body, signature_header) {
        Ok(valid) => valid,
        Err(_) => false,
    }
}

/// Same as [`verify_signature`] but surfaces *why* a signature failed to
/// even parse, for logging at the call site.
pub fn verify_signature_checked(
    secret: &[u8],
    raw_body: &[u8],
    signature_header: &str,
) -> Result<bool, WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::EmptySecret);
    }
    let hex_digest = signature_header
        .strip_prefix("sha256=")
        .ok_or(WebhookError::MissingPrefix)?;
    let given = decode_hex(hex_digest).ok_or(WebhookError::InvalidHex)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts a key of any length");
    mac.update(raw_body);
    let expected = mac.finalize().into_bytes();

    Ok(bool::from(expected.as_slice().ct_eq(&given)))
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// A GitHub-style `push` event payload, trimmed to the fields the
/// deployment pipeline cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub after: String,
    #[serde(default)]
    pub deleted: bool,
    pub head_commit: Option<HeadCommit>,
    pub repository: PushRepository,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadCommit {
    pub id: String,
    pub message: String,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRepository {
    pub full_name: String,
}

impl PushEvent {
    /// Branch name with the `refs/heads/` prefix stripped, or `None` for a
    /// tag push (`refs/tags/...`) or other non-branch ref.
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }
}

/// Outcome of [`gate_push_event`]: either the push should proceed to a new
/// deployment, or it is skipped with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    Proceed,
    Skip(&'static str),
}

impl GateResult {
    pub fn should_proceed(&self) -> bool {
        matches!(self, GateResult::Proceed)
    }
}

/// Decide whether a verified push event should trigger a deployment for a
/// project tracking `configured_branch`. Mirrors the rejection order the
/// intake handler walks through before writing a deployment row: a branch
/// delete, a push with no head commit, the all-zero deletion SHA, and a
/// push to a branch the project doesn't track.
pub fn gate_push_event(event: &PushEvent, configured_branch: &str) -> GateResult {
    if event.deleted {
        return GateResult::Skip("branch or tag was deleted");
    }
    if event.head_commit.is_none() {
        return GateResult::Skip("push carried no head commit");
    }
    if event.after == ZERO_SHA {
        return GateResult::Skip("push resolved to the all-zero sha");
    }
    match event.branch() {
        Some(branch) if branch == configured_branch => GateResult::Proceed,
        Some(_) => GateResult::Skip("push was to a branch this project does not track"),
        None => GateResult::Skip("ref was not a branch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        format!("sha256={}", digest.iter().map(|b| format!("{b:02x}")).collect::<String>())
    }

    #[test]
    fn verifies_correctly_signed_body() {
        let secret = b"topsecret";
        let body = br#"{"ref":"refs/heads/main"}"#;
        let header = sign(secret, body);
        assert!(verify_signature(secret, body, &header));
    }

    #[test]
    fn rejects_tampered_body() {
        let secret = b"topsecret";
        let header = sign(secret, br#"{"ref":"refs/heads/main"}"#);
        assert!(!verify_signature(secret, br#"{"ref":"refs/heads/evil"}"#, &header));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let header = sign(b"topsecret", body);
        assert!(!verify_signature(b"wrong-secret", body, &header));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(!verify_signature(b"secret", b"body", "deadbeef"));
    }

    #[test]
    fn rejects_invalid_hex() {
        assert!(!verify_signature(b"secret", b"body", "sha256=not-hex-zz"));
    }

    #[test]
    fn checked_variant_surfaces_empty_secret() {
        let result = verify_signature_checked(b"", b"body", "sha256=aa");
        assert!(matches!(result, Err(WebhookError::EmptySecret)));
    }

    fn sample_event(branch: &str, deleted: bool, after: &str, has_commit: bool) -> PushEvent {
        PushEvent {
            git_ref: format!("refs/heads/{branch}"),
            after: after.to_string(),
            deleted,
            head_commit: has_commit.then(|| HeadCommit {
                id: after.to_string(),
                message: "fix stuff".into(),
                author: CommitAuthor { name: "ferris".into() },
            }),
            repository: PushRepository { full_name: "ferris/example".into() },
        }
    }

    #[test]
    fn proceeds_on_matching_branch() {
        let event = sample_event("main", false, "a".repeat(40).as_str(), true);
        assert_eq!(gate_push_event(&event, "main"), GateResult::Proceed);
    }

    #[test]
    fn skips_deleted_branch() {
        let event = sample_event("main", true, "a".repeat(40).as_str(), true);
        assert!(!gate_push_event(&event, "main").should_proceed());
    }

    #[test]
    fn skips_missing_head_commit() {
        let event = sample_event("main", false, "a".repeat(40).as_str(), false);
        assert!(!gate_push_event(&event, "main").should_proceed());
    }

    #[test]
    fn skips_zero_sha() {
        let event = sample_event("main", false, ZERO_SHA, true);
        assert!(!gate_push_event(&event, "main").should_proceed());
    }

    #[test]
    fn skips_untracked_branch() {
        let event = sample_event("feature/x", false, "a".repeat(40).as_str(), true);
        assert!(!gate_push_event(&event, "main").should_proceed());
    }

    #[test]
    fn skips_tag_ref() {
        let mut event = sample_event("main", false, "a".repeat(40).as_str(), true);
        event.git_ref = "refs/tags/v1.0.0".into();
        assert!(!gate_push_event(&event, "main").should_proceed());
    }

    #[test]
    fn branch_strips_refs_heads_prefix() {
        let event = sample_event("develop", false, "a".repeat(40).as_str(), true);
        assert_eq!(event.branch(), Some("develop"));
    }
}
