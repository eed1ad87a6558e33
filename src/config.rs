// src/config.rs
use crate::services::place_query::PLACE_RESULT_CAP;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CHAT_RATE_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server settings, read from the environment (and `.env` via dotenvy)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub bind_addr: SocketAddr,
    pub place_result_cap: i64,
    pub chat_rate_limit_per_minute: u32,
    /// Key rate limits by `X-Forwarded-For`. Only safe behind a proxy that
    /// overwrites the header.
    pub trust_proxy_headers: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let anthropic_api_key = env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty());
        let anthropic_model = env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let bind_addr = parse_var("BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?;
        let place_result_cap: i64 = parse_var("PLACE_RESULT_CAP", Some(PLACE_RESULT_CAP))?;
        let chat_rate_limit_per_minute = parse_var("CHAT_RATE_LIMIT_PER_MINUTE", Some(DEFAULT_CHAT_RATE_LIMIT))?;
        let trust_proxy_headers = parse_var("TRUST_PROXY_HEADERS", Some(false))?;

        Ok(Self {
            database_url,
            anthropic_api_key,
            anthropic_model,
            bind_addr,
            place_result_cap: place_result_cap.clamp(1, PLACE_RESULT_CAP),
            chat_rate_limit_per_minute,
            trust_proxy_headers,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: Option<T>) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => default.ok_or(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_and_invalid() {
        let cap: i64 = parse_var("HALAL_MAP_TEST_UNSET_CAP", Some(42)).unwrap();
        assert_eq!(cap, 42);

        env::set_var("HALAL_MAP_TEST_BAD_LIMIT", "lots");
        let err = parse_var::<u32>("HALAL_MAP_TEST_BAD_LIMIT", Some(1)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "HALAL_MAP_TEST_BAD_LIMIT", .. }));
    }

    #[test]
    fn test_trust_proxy_headers_flag() {
        let unset: bool = parse_var("HALAL_MAP_TEST_UNSET_TRUST", Some(false)).unwrap();
        assert!(!unset);

        env::set_var("HALAL_MAP_TEST_TRUST", "true");
        assert!(parse_var::<bool>("HALAL_MAP_TEST_TRUST", Some(false)).unwrap());

        env::set_var("HALAL_MAP_TEST_BAD_TRUST", "yes please");
        assert!(parse_var::<bool>("HALAL_MAP_TEST_BAD_TRUST", Some(false)).is_err());
    }

    #[test]
    fn test_default_bind_addr_parses() {
        let addr: SocketAddr = DEFAULT_BIND_ADDR.parse().unwrap();
        assert_eq!(addr.port(), 3000);
    }
}
