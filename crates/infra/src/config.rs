//! Service settings loaded from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::DEFAULT_TTL_SECS;
use crate::oracle::DEFAULT_BASE_URL;

pub const API_KEY_VAR: &str = "SITELENS_API_KEY";
pub const BASE_URL_VAR: &str = "SITELENS_BASE_URL";
pub const BIND_ADDR_VAR: &str = "SITELENS_BIND_ADDR";
pub const DATABASE_URL_VAR: &str = "SITELENS_DATABASE_URL";
pub const CACHE_TTL_VAR: &str = "SITELENS_CACHE_TTL_SECS";
pub const REQUEST_TIMEOUT_VAR: &str = "SITELENS_REQUEST_TIMEOUT_SECS";
pub const CACHE_SWEEP_VAR: &str = "SITELENS_CACHE_SWEEP_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub bind_addr: SocketAddr,
    /// sqlite URL; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub request_timeout: Duration,
    /// Interval of the background cache sweep; disabled when unset.
    pub cache_sweep_interval: Option<Duration>,
}

impl Settings {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let base_url = get(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let bind_addr = get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = parse_value(BIND_ADDR_VAR, &bind_addr)?;
        let cache_ttl_secs = parse(CACHE_TTL_VAR, get(CACHE_TTL_VAR))?.unwrap_or(DEFAULT_TTL_SECS);
        let request_timeout = parse::<u64>(REQUEST_TIMEOUT_VAR, get(REQUEST_TIMEOUT_VAR))?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let cache_sweep_interval = parse::<u64>(CACHE_SWEEP_VAR, get(CACHE_SWEEP_VAR))?;

        if request_timeout == 0 {
            return Err(ConfigError::Invalid {
                var: REQUEST_TIMEOUT_VAR,
                message: "must be greater than zero".to_string(),
            });
        }
        if cache_sweep_interval == Some(0) {
            return Err(ConfigError::Invalid {
                var: CACHE_SWEEP_VAR,
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            api_key,
            base_url,
            bind_addr,
            database_url: get(DATABASE_URL_VAR),
            cache_ttl_secs,
            request_timeout: Duration::from_secs(request_timeout),
            cache_sweep_interval: cache_sweep_interval.map(Duration::from_secs),
        })
    }
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        message: format!("'{raw}': {e}"),
    })
}

fn parse<T>(var: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|raw| parse_value(var, &raw)).transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn api_key_is_required() {
        assert_eq!(settings(&[]), Err(ConfigError::Missing(API_KEY_VAR)));
        assert_eq!(
            settings(&[(API_KEY_VAR, "   ")]),
            Err(ConfigError::Missing(API_KEY_VAR))
        );
    }

    #[test]
    fn defaults() {
        let s = settings(&[(API_KEY_VAR, "secret")]).unwrap();
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(s.database_url, None);
        assert_eq!(s.cache_ttl_secs, 86_400);
        assert_eq!(s.request_timeout, Duration::from_secs(30));
        assert_eq!(s.cache_sweep_interval, None);
    }

    #[test]
    fn overrides() {
        let s = settings(&[
            (API_KEY_VAR, "secret"),
            (BASE_URL_VAR, "http://localhost:9000/api"),
            (BIND_ADDR_VAR, "127.0.0.1:3000"),
            (DATABASE_URL_VAR, "sqlite://sitelens.db"),
            (CACHE_TTL_VAR, "60"),
            (REQUEST_TIMEOUT_VAR, "5"),
            (CACHE_SWEEP_VAR, "300"),
        ])
        .unwrap();
        assert_eq!(s.base_url, "http://localhost:9000/api");
        assert_eq!(s.bind_addr.port(), 3000);
        assert_eq!(s.database_url.as_deref(), Some("sqlite://sitelens.db"));
        assert_eq!(s.cache_ttl_secs, 60);
        assert_eq!(s.request_timeout, Duration::from_secs(5));
        assert_eq!(s.cache_sweep_interval, Some(Duration::from_secs(300)));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = settings(&[(API_KEY_VAR, "k"), (CACHE_TTL_VAR, "a day")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: CACHE_TTL_VAR, .. }));
        assert!(err.to_string().starts_with("SITELENS_CACHE_TTL_SECS is invalid"));

        let err = settings(&[(API_KEY_VAR, "k"), (CACHE_SWEEP_VAR, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: CACHE_SWEEP_VAR, .. }));
    }
}
