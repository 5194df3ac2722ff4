//! Human-readable duration parsing and serde (de)serialization helpers.
//!
//! Config fields across the workspace (task deadlines, retry backoff caps,
//! lease windows) are authored as human-readable strings like `"30m"` or
//! `"5s"` rather than raw seconds, so they read the way an operator would
//! write them in an environment file. This crate wraps [`humantime`] with
//! serde codecs that attach the field name to parse errors, which bare
//! `humantime_serde` does not do.

use std::fmt;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serialize a [`Duration`] as its humantime string form (e.g. `"5s"`).
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&humantime::format_duration(*duration))
}

/// Deserialize a [`Duration`] from either a humantime string (`"30m"`) or a
/// raw integer number of seconds, for compatibility with plain numeric env
/// values.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> serde::de::Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a humantime duration string (e.g. \"30m\") or a number of seconds")
        }

        fn visit_str<E>(self, v: &str) -> Result<Duration, E>
        where
            E: serde::de::Error,
        {
            parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Duration, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Duration, E>
        where
            E: serde::de::Error,
        {
            if v < 0 {
                return Err(E::custom(format!("duration seconds cannot be negative: {v}")));
            }
            Ok(Duration::from_secs(v as u64))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

/// Parse a humantime duration string, falling back to a bare integer (taken
/// as seconds) if the string contains no unit suffix.
pub fn parse_duration(raw: &str) -> Result<Duration, DurationParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    humantime::parse_duration(trimmed)
        .map_err(|source| DurationParseError::Invalid { raw: trimmed.to_string(), source })
}

/// Error produced when a configured duration string cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum DurationParseError {
    #[error("duration string was empty")]
    Empty,
    #[error("invalid duration {raw:?}: {source}")]
    Invalid { raw: String, source: humantime::DurationError },
}

/// A newtype wrapper for config fields that should (de)serialize through
/// [`serialize`]/[`deserialize`] without requiring callers to attach
/// `#[serde(with = "dockyard_duration")]` on every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HumanDuration(#[serde(with = "self")] pub Duration);

impl From<Duration> for HumanDuration {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl From<HumanDuration> for Duration {
    fn from(value: HumanDuration) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_humantime_strings() {
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn falls_back_to_bare_seconds() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("banana").is_err());
    }

    #[test]
    fn roundtrips_through_json() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            #[serde(with = "crate")]
            timeout: Duration,
        }

        let wrapper = Wrapper { timeout: Duration::from_secs(1800) };
        let json = serde_json::to_string(&wrapper).unwrap();
        assert_eq!(json, r#"{"timeout":"30m"}"#);
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeout, Duration::from_secs(1800));
    }

    #[test]
    fn human_duration_transparent_roundtrip() {
        let hd = HumanDuration(Duration::from_secs(300));
        let json = serde_json::to_string(&hd).unwrap();
        assert_eq!(json, "\"5m\"");
        let back: HumanDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, Duration::from_secs(300));
    }
}
