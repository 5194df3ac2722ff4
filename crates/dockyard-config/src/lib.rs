//! Environment-driven configuration loading and startup validation.
//!
//! Unlike a CLI that reads a config file sitting next to the project it's
//! operating on, dockyard is a long-lived service configured the way such
//! services usually are: entirely from the process environment.
//! [`Config::from_env`] reads
//! an optional `.env` file for local development via `dotenvy`, then the
//! real environment, and fails fast — returning [`dockyard_types::Error::Fatal`]
//! — on a missing session key or an undersized encryption key, since both
//! represent misconfiguration the process should refuse to start with.

use std::time::Duration;

use dockyard_crypto::MasterKey;
use dockyard_types::Error;

/// Complete dockyard configuration, loaded once at startup and shared
/// (typically behind an `Arc`) by the API server and the worker binary.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,

    pub source_host_client_id: String,
    pub source_host_client_secret: String,
    pub source_host_redirect_url: String,

    /// HS256 signing key for session cookies.
    pub session_signing_key: Vec<u8>,
    /// AES-256-GCM master key for sealing secrets (env-var values, webhook
    /// secrets, access tokens). At least 32 bytes, validated at load time.
    pub encryption_key: MasterKey,

    pub registry_url: String,
    pub base_domain: String,
    pub tls_enabled: bool,
    pub cert_resolver: Option<String>,

    /// Ambient operational knobs not named directly in the environment
    /// taxonomy but required to run the build/deploy pipeline; each has a
    /// default matching spec §4.4/§5 and can be overridden for tests.
    pub build_task_deadline: Duration,
    pub deploy_task_deadline: Duration,
    pub container_memory_limit_bytes: u64,
    pub container_cpu_limit: f64,
    pub container_name_prefix: String,
    pub proxy_network: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("source_host_client_id", &self.source_host_client_id)
            .field("source_host_client_secret", &"[REDACTED]")
            .field("source_host_redirect_url", &self.source_host_redirect_url)
            .field("session_signing_key", &"[REDACTED]")
            .field("encryption_key", &self.encryption_key)
            .field("registry_url", &self.registry_url)
            .field("base_domain", &self.base_domain)
            .field("tls_enabled", &self.tls_enabled)
            .field("cert_resolver", &self.cert_resolver)
            .field("build_task_deadline", &self.build_task_deadline)
            .field("deploy_task_deadline", &self.deploy_task_deadline)
            .field("container_memory_limit_bytes", &self.container_memory_limit_bytes)
            .field("container_cpu_limit", &self.container_cpu_limit)
            .field("container_name_prefix", &self.container_name_prefix)
            .field("proxy_network", &self.proxy_network)
            .finish()
    }
}

/// Default container memory cap: 512 MiB.
const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 512 * 1024 * 1024;
/// Default container CPU cap: half a core.
const DEFAULT_CPU_LIMIT: f64 = 0.5;
const DEFAULT_CONTAINER_PREFIX: &str = "dockyard";
const DEFAULT_PROXY_NETWORK: &str = "dockyard-proxy";

impl Config {
    /// Load configuration from the process environment, applying an
    /// optional `.env` file first (missing file is not an error). Returns
    /// `Error::Fatal` describing exactly which setting was missing or
    /// invalid, since a misconfigured startup should fail loudly rather
    /// than fall back to a guessed default for anything security-relevant.
    pub fn from_env() -> Result<Self, Error> {
        let _ = dotenvy::dotenv();
        Self::from_env_map(|key| std::env::var(key).ok())
    }

    /// Testable core of [`Config::from_env`]: takes a lookup function
    /// instead of reading the real environment, so unit tests can exercise
    /// the validation paths without mutating process-global state.
    pub fn from_env_map(get: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |key: &str| -> Result<String, Error> {
            get(key).filter(|v| !v.is_empty()).ok_or_else(|| {
                Error::Fatal(format!("missing required environment variable {key}"))
            })
        };

        let database_url = required("DATABASE_URL")?;
        let redis_url = required("REDIS_URL")?;
        let source_host_client_id = required("SOURCE_HOST_CLIENT_ID")?;
        let source_host_client_secret = required("SOURCE_HOST_CLIENT_SECRET")?;
        let source_host_redirect_url = required("SOURCE_HOST_REDIRECT_URL")?;
        let registry_url = required("REGISTRY_URL")?;
        let base_domain = required("BASE_DOMAIN")?;

        let session_signing_key = required("SESSION_SIGNING_KEY")?.into_bytes();
        if session_signing_key.len() < 16 {
            return Err(Error::Fatal(
                "SESSION_SIGNING_KEY must be at least 16 bytes".into(),
            ));
        }

        let encryption_key_raw = required("ENCRYPTION_KEY")?;
        let encryption_key_bytes = decode_encryption_key(&encryption_key_raw)?;
        let encryption_key = MasterKey::from_bytes(&encryption_key_bytes)
            .map_err(|e| Error::Fatal(format!("ENCRYPTION_KEY invalid: {e}")))?;

        let tls_enabled = get("TLS_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        let cert_resolver = get("CERT_RESOLVER").filter(|v| !v.is_empty());

        let build_task_deadline = parse_duration_or(get("BUILD_TASK_DEADLINE"), "30m")?;
        let deploy_task_deadline = parse_duration_or(get("DEPLOY_TASK_DEADLINE"), "5m")?;

        let container_memory_limit_bytes = get("CONTAINER_MEMORY_LIMIT_BYTES")
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|_| Error::Fatal("CONTAINER_MEMORY_LIMIT_BYTES is not a valid integer".into()))?
            .unwrap_or(DEFAULT_MEMORY_LIMIT_BYTES);

        let container_cpu_limit = get("CONTAINER_CPU_LIMIT")
            .map(|v| v.parse::<f64>())
            .transpose()
            .map_err(|_| Error::Fatal("CONTAINER_CPU_LIMIT is not a valid number".into()))?
            .unwrap_or(DEFAULT_CPU_LIMIT);

        let container_name_prefix =
            get("CONTAINER_NAME_PREFIX").unwrap_or_else(|| DEFAULT_CONTAINER_PREFIX.to_string());
        let proxy_network =
            get("PROXY_NETWORK").unwrap_or_else(|| DEFAULT_PROXY_NETWORK.to_string());

        Ok(Config {
            database_url,
            redis_url,
            source_host_client_id,
            source_host_client_secret,
            source_host_redirect_url,
            session_signing_key,
            encryption_key,
            registry_url,
            base_domain,
            tls_enabled,
            cert_resolver,
            build_task_deadline,
            deploy_task_deadline,
            container_memory_limit_bytes,
            container_cpu_limit,
            container_name_prefix,
            proxy_network,
        })
    }
}

fn decode_encryption_key(raw: &str) -> Result<Vec<u8>, Error> {
    use base64::Engine as _;
    if let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(raw) {
        if decoded.len() >= dockyard_crypto::KEY_SIZE {
            return Ok(decoded);
        }
    }
    if raw.len() >= dockyard_crypto::KEY_SIZE {
        return Ok(raw.as_bytes().to_vec());
    }
    Err(Error::Fatal(format!(
        "ENCRYPTION_KEY must decode (raw or base64) to at least {} bytes",
        dockyard_crypto::KEY_SIZE
    )))
}

fn parse_duration_or(raw: Option<String>, default: &str) -> Result<Duration, Error> {
    let source = raw.unwrap_or_else(|| default.to_string());
    dockyard_duration::parse_duration(&source)
        .map_err(|e| Error::Fatal(format!("invalid duration {source:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/dockyard"),
            ("REDIS_URL", "redis://localhost"),
            ("SOURCE_HOST_CLIENT_ID", "client-id"),
            ("SOURCE_HOST_CLIENT_SECRET", "client-secret"),
            ("SOURCE_HOST_REDIRECT_URL", "https://dockyard.example/callback"),
            ("REGISTRY_URL", "registry.example.com"),
            ("BASE_DOMAIN", "apps.example.com"),
            ("SESSION_SIGNING_KEY", "0123456789abcdef0123456789abcdef"),
            ("ENCRYPTION_KEY", "01234567890123456789012345678901"),
        ])
    }

    #[test]
    fn loads_successfully_from_complete_env() {
        let env = base_env();
        let config = Config::from_env_map(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/dockyard");
        assert_eq!(config.build_task_deadline, Duration::from_secs(30 * 60));
        assert_eq!(config.deploy_task_deadline, Duration::from_secs(5 * 60));
        assert_eq!(config.container_memory_limit_bytes, DEFAULT_MEMORY_LIMIT_BYTES);
        assert!(!config.tls_enabled);
    }

    #[test]
    fn missing_required_key_is_fatal() {
        let mut env = base_env();
        env.remove("DATABASE_URL");
        let result = Config::from_env_map(|k| env.get(k).map(|v| v.to_string()));
        assert!(matches!(result, Err(Error::Fatal(msg)) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn undersized_encryption_key_is_fatal() {
        let mut env = base_env();
        env.insert("ENCRYPTION_KEY", "too-short");
        let result = Config::from_env_map(|k| env.get(k).map(|v| v.to_string()));
        assert!(matches!(result, Err(Error::Fatal(_))));
    }

    #[test]
    fn undersized_session_key_is_fatal() {
        let mut env = base_env();
        env.insert("SESSION_SIGNING_KEY", "short");
        let result = Config::from_env_map(|k| env.get(k).map(|v| v.to_string()));
        assert!(matches!(result, Err(Error::Fatal(_))));
    }

    #[test]
    fn accepts_base64_encryption_key() {
        use base64::Engine as _;
        let mut env = base_env();
        let encoded = base64::engine::general_purpose::STANDARD.encode([9u8; 32]);
        env.insert("ENCRYPTION_KEY", Box::leak(encoded.into_boxed_str()));
        let config = Config::from_env_map(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_domain, "apps.example.com");
    }

    #[test]
    fn debug_never_leaks_secrets() {
        let env = base_env();
        let config = Config::from_env_map(|k| env.get(k).map(|v| v.to_string())).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("client-secret"));
        assert!(!debug.contains("0123456789abcdef"));
    }
}
