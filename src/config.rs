use crate::decode::{DecodeLimits, DEFAULT_MAX_BYTES, DEFAULT_MAX_DEPTH};
use anyhow::Context;
use std::{str::FromStr, time::Duration};
use tour_core::{docs::ApiInfo, server::ServerConfig};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_UUID_URL: &str = "https://httpbin.org/uuid";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Room left in request head for request line, other params and headers.
const HEAD_OVERHEAD: usize = 16 * 1024;

/// Application configuration, read once at startup and passed to
/// `crate::app` by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Shown in the generated API document.
    pub info: ApiInfo,

    pub host: String,
    pub port: u16,

    /// Read and write timeout of client connections.
    pub request_timeout: Duration,

    /// Upstream proxied by `GET /uuid`.
    pub uuid_url: String,
    pub upstream_timeout: Duration,

    pub decode_limits: DecodeLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            info: ApiInfo {
                title: env!("CARGO_PKG_NAME").to_string(),
                description: String::new(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            uuid_url: DEFAULT_UUID_URL.to_string(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            decode_limits: DecodeLimits::default(),
        }
    }
}

impl AppConfig {
    /// Reads configuration from process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, unset keys keep their defaults.
    ///
    /// | key | default |
    /// |---|---|
    /// | `APP_NAME` | crate name |
    /// | `APP_DESCRIPTION` | empty |
    /// | `APP_VERSION` | crate version |
    /// | `APP_HOST` | `127.0.0.1` |
    /// | `APP_PORT` | `8080` |
    /// | `APP_REQUEST_TIMEOUT_SECS` | `30` |
    /// | `APP_UUID_URL` | `https://httpbin.org/uuid` |
    /// | `APP_UPSTREAM_TIMEOUT_SECS` | `10` |
    /// | `APP_MAX_DOCUMENT_BYTES` | `65536` |
    /// | `APP_MAX_DOCUMENT_DEPTH` | `64` |
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            info: ApiInfo {
                title: lookup("APP_NAME").unwrap_or(defaults.info.title),
                description: lookup("APP_DESCRIPTION").unwrap_or(defaults.info.description),
                version: lookup("APP_VERSION").unwrap_or(defaults.info.version),
            },
            host: lookup("APP_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "APP_PORT", DEFAULT_PORT)?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "APP_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            uuid_url: lookup("APP_UUID_URL").unwrap_or(defaults.uuid_url),
            upstream_timeout: Duration::from_secs(parse_or(
                &lookup,
                "APP_UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?),
            decode_limits: DecodeLimits {
                max_bytes: parse_or(&lookup, "APP_MAX_DOCUMENT_BYTES", DEFAULT_MAX_BYTES)?,
                max_depth: parse_or(&lookup, "APP_MAX_DOCUMENT_DEPTH", DEFAULT_MAX_DEPTH)?,
            },
        })
    }

    /// Connection limits for the server. Request head must fit a query
    /// document of `decode_limits.max_bytes`, percent-encoded.
    pub fn server_config(&self) -> ServerConfig {
        let encoded_document = self.decode_limits.max_bytes.saturating_mul(3);
        let defaults = ServerConfig::default();

        ServerConfig {
            max_head_size: defaults
                .max_head_size
                .max(encoded_document.saturating_add(HEAD_OVERHEAD)),
            read_timeout: Some(self.request_timeout),
            write_timeout: Some(self.request_timeout),
            ..defaults
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value of {}: {:?}", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() -> anyhow::Result<()> {
        let config = AppConfig::from_lookup(lookup(&[]))?;

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.info.title, "tour");
        assert_eq!(config.port, 8080);
        assert_eq!(config.uuid_url, DEFAULT_UUID_URL);
        Ok(())
    }

    #[test]
    fn test_overrides() -> anyhow::Result<()> {
        let config = AppConfig::from_lookup(lookup(&[
            ("APP_NAME", "Tutorial"),
            ("APP_DESCRIPTION", "Example endpoints"),
            ("APP_VERSION", "2.0.0"),
            ("APP_HOST", "0.0.0.0"),
            ("APP_PORT", " 9000 "),
            ("APP_REQUEST_TIMEOUT_SECS", "5"),
            ("APP_UUID_URL", "http://localhost:1/uuid"),
            ("APP_UPSTREAM_TIMEOUT_SECS", "3"),
            ("APP_MAX_DOCUMENT_BYTES", "1024"),
            ("APP_MAX_DOCUMENT_DEPTH", "8"),
        ]))?;

        assert_eq!(config.info.title, "Tutorial");
        assert_eq!(config.info.description, "Example endpoints");
        assert_eq!(config.info.version, "2.0.0");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.uuid_url, "http://localhost:1/uuid");
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
        assert_eq!(
            config.decode_limits,
            DecodeLimits {
                max_bytes: 1024,
                max_depth: 8
            }
        );
        Ok(())
    }

    #[test]
    fn test_server_config_fits_documents() {
        let config = AppConfig::default();
        let server = config.server_config();

        assert!(server.max_head_size >= 3 * config.decode_limits.max_bytes);
        assert_eq!(server.read_timeout, Some(Duration::from_secs(30)));

        let config = AppConfig {
            decode_limits: DecodeLimits {
                max_bytes: 1024 * 1024,
                max_depth: 8,
            },
            ..Default::default()
        };
        assert!(config.server_config().max_head_size > 3 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_numbers() {
        let err = AppConfig::from_lookup(lookup(&[("APP_PORT", "eighty")]))
            .expect_err("port is not a number");
        assert!(err.to_string().contains("APP_PORT"));

        assert!(AppConfig::from_lookup(lookup(&[("APP_PORT", "70000")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("APP_MAX_DOCUMENT_DEPTH", "-1")])).is_err());
    }
}
