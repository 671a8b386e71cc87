//! Environment-backed runtime configuration for the relay server.

use std::{env, error::Error, fmt, net::SocketAddr, time::Duration};

const DEFAULT_BIND: &str = "127.0.0.1:8787";
const DEFAULT_PENDING_TTL_MS: u64 = 5_000;
const DEFAULT_SSE_CAPACITY: usize = 16;

/// Runtime configuration for the relay server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Socket address the HTTP server binds to.
    pub bind: SocketAddr,
    /// Shared secret for webhook HMAC verification. Required.
    pub webhook_secret: String,
    /// Freshness window for undelivered cart updates.
    pub pending_ttl: Duration,
    /// Per-shop SSE channel capacity.
    pub sse_capacity: usize,
}

impl RelayConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let webhook_secret = optional_trimmed_env("LUMERA_WEBHOOK_SECRET", &mut lookup)
            .ok_or(ConfigError::MissingValue {
                key: "LUMERA_WEBHOOK_SECRET",
            })?;

        let bind_raw = optional_trimmed_env("LUMERA_RELAY_BIND", &mut lookup)
            .unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::InvalidValue {
                key: "LUMERA_RELAY_BIND",
                value: bind_raw.clone(),
                reason: err.to_string(),
            })?;

        let pending_ttl_ms = parse_optional_u64_with_default(
            "LUMERA_CART_UPDATE_TTL_MS",
            DEFAULT_PENDING_TTL_MS,
            &mut lookup,
        )?;
        if pending_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LUMERA_CART_UPDATE_TTL_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        let sse_capacity = parse_optional_usize(
            "LUMERA_SSE_CHANNEL_CAPACITY",
            DEFAULT_SSE_CAPACITY,
            &mut lookup,
        )?;
        if sse_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LUMERA_SSE_CHANNEL_CAPACITY",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            bind,
            webhook_secret,
            pending_ttl: Duration::from_millis(pending_ttl_ms),
            sse_capacity,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    MissingValue { key: &'static str },
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue { key } => write!(f, "{key} must be set"),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u64_with_default<F>(
    key: &'static str,
    default: u64,
    lookup: &mut F,
) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl FnMut(&str) -> Option<String> + 'a {
        move |key| map.get(key).map(|value| (*value).to_owned())
    }

    #[test]
    fn requires_the_webhook_secret() {
        let vars = HashMap::new();
        let err = RelayConfig::from_lookup(lookup_from(&vars)).expect_err("must fail");
        assert_eq!(
            err,
            ConfigError::MissingValue {
                key: "LUMERA_WEBHOOK_SECRET"
            }
        );
    }

    #[test]
    fn applies_defaults_with_only_the_secret_set() {
        let vars = HashMap::from([("LUMERA_WEBHOOK_SECRET", "s3cr3t")]);
        let config = RelayConfig::from_lookup(lookup_from(&vars)).expect("must parse");
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.pending_ttl, Duration::from_millis(5_000));
        assert_eq!(config.sse_capacity, 16);
    }

    #[test]
    fn parses_explicit_overrides() {
        let vars = HashMap::from([
            ("LUMERA_WEBHOOK_SECRET", "s3cr3t"),
            ("LUMERA_RELAY_BIND", "0.0.0.0:9000"),
            ("LUMERA_CART_UPDATE_TTL_MS", "2500"),
            ("LUMERA_SSE_CHANNEL_CAPACITY", "64"),
        ]);
        let config = RelayConfig::from_lookup(lookup_from(&vars)).expect("must parse");
        assert_eq!(config.bind.to_string(), "0.0.0.0:9000");
        assert_eq!(config.pending_ttl, Duration::from_millis(2_500));
        assert_eq!(config.sse_capacity, 64);
    }

    #[test]
    fn rejects_malformed_bind_address() {
        let vars = HashMap::from([
            ("LUMERA_WEBHOOK_SECRET", "s3cr3t"),
            ("LUMERA_RELAY_BIND", "not-an-address"),
        ]);
        let err = RelayConfig::from_lookup(lookup_from(&vars)).expect_err("must fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "LUMERA_RELAY_BIND",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_ttl() {
        let vars = HashMap::from([
            ("LUMERA_WEBHOOK_SECRET", "s3cr3t"),
            ("LUMERA_CART_UPDATE_TTL_MS", "0"),
        ]);
        let err = RelayConfig::from_lookup(lookup_from(&vars)).expect_err("must fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "LUMERA_CART_UPDATE_TTL_MS",
                ..
            }
        ));
    }
}
