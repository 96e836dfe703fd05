use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/antrian";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// Western Indonesia Time (UTC+7).
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 420;
const DEFAULT_ALLOCATION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    /// Offset of the timezone whose midnight resets ticket sequences.
    pub utc_offset: FixedOffset,
    /// Upper bound on a create/update transaction, including lock waits.
    pub allocation_timeout: Duration,
    pub request_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Unparseable values
    /// fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let offset_minutes: i32 =
            parse_or(&lookup, "QUEUE_UTC_OFFSET_MINUTES", DEFAULT_UTC_OFFSET_MINUTES);
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(offset_minutes, "Config: UTC offset out of range, using default");
                default_offset()
            });

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            ),
            utc_offset,
            allocation_timeout: Duration::from_millis(parse_or(
                &lookup,
                "ALLOCATION_TIMEOUT_MS",
                DEFAULT_ALLOCATION_TIMEOUT_MS,
            )),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            cors_allowed_origins,
            production: lookup("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).expect("default UTC offset is in range")
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, ?default, "Config: invalid value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.utc_offset.local_minus_utc(), 7 * 3600);
        assert_eq!(config.allocation_timeout, Duration::from_secs(5));
        assert_eq!(config.cors_allowed_origins.len(), 2);
        assert!(!config.production);
    }

    #[test]
    fn reads_overrides() {
        let config = config_with(&[
            ("PORT", "8080"),
            ("QUEUE_UTC_OFFSET_MINUTES", "480"),
            ("ALLOCATION_TIMEOUT_MS", "250"),
            ("CORS_ALLOWED_ORIGINS", "https://rs.example, ,https://admin.example"),
            ("RUST_ENV", "Production"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.utc_offset.local_minus_utc(), 8 * 3600);
        assert_eq!(config.allocation_timeout, Duration::from_millis(250));
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://rs.example", "https://admin.example"]
        );
        assert!(config.production);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_with(&[("PORT", "eighty"), ("QUEUE_UTC_OFFSET_MINUTES", "99999")]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.utc_offset.local_minus_utc(), 7 * 3600);
    }
}
