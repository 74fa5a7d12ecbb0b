//! Process configuration, loaded from environment variables at startup.
//!
//! This is distinct from [`crate::snapshot::ConfigSnapshot`]: the values here
//! are fixed for the lifetime of the process, while the snapshot is
//! refreshed periodically from the config store.

/// Runtime configuration for the proxy process.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// Config-store SQLite URL (backends + authorized users).
    ///
    /// The path in a `sqlite://` URL is relative to the **current working
    /// directory** of the process at startup. For predictable behaviour in
    /// production, use an absolute path.
    pub config_database_url: String,

    /// Filesystem path for the access-log CSV file.
    pub access_log_path: String,

    /// How often the config snapshot is refreshed from the store.
    pub refresh_interval_secs: u64,

    /// Default number of forward attempts when the store doesn't specify one.
    pub default_retry_attempts: u32,

    /// When `true`, authentication is skipped entirely (`user = "unknown"`).
    pub security_disabled: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("PROXY_BIND", "0.0.0.0:8000"),
            config_database_url: env_or(
                "PROXY_CONFIG_DATABASE_URL",
                "sqlite://proxy-config.db?mode=rwc",
            ),
            access_log_path: env_or("PROXY_ACCESS_LOG_PATH", "access_log.csv"),
            refresh_interval_secs: parse_env("PROXY_REFRESH_SECS", 10),
            default_retry_attempts: parse_env("PROXY_RETRY_ATTEMPTS", 3),
            security_disabled: std::env::var("PROXY_SECURITY_DISABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            log_level: env_or("PROXY_LOG", "info"),
            log_json: std::env::var("PROXY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
