use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

use studycircle_api::suggestions::SuggestionConfig;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub suggestions: SuggestionConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("STUDYCIRCLE_PORT", "3000")
            .parse()
            .context("STUDYCIRCLE_PORT must be a port number")?;
        let timeout_secs: u64 = var("STUDYCIRCLE_AI_TIMEOUT_SECS", "30")
            .parse()
            .context("STUDYCIRCLE_AI_TIMEOUT_SECS must be a whole number of seconds")?;

        let jwt_secret = match lookup("STUDYCIRCLE_JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("STUDYCIRCLE_JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let defaults = SuggestionConfig::default();
        Ok(Self {
            host: var("STUDYCIRCLE_HOST", "0.0.0.0"),
            port,
            db_path: PathBuf::from(var("STUDYCIRCLE_DB_PATH", "studycircle.db")),
            jwt_secret,
            suggestions: SuggestionConfig {
                api_key: lookup("STUDYCIRCLE_AI_API_KEY").filter(|k| !k.is_empty()),
                base_url: lookup("STUDYCIRCLE_AI_BASE_URL").unwrap_or(defaults.base_url),
                model: lookup("STUDYCIRCLE_AI_MODEL").unwrap_or(defaults.model),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("studycircle.db"));
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert!(config.suggestions.api_key.is_none());
        assert_eq!(config.suggestions.timeout, Duration::from_secs(30));
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("STUDYCIRCLE_PORT", "8080"),
            ("STUDYCIRCLE_AI_API_KEY", "sk-test"),
            ("STUDYCIRCLE_AI_MODEL", "local-model"),
            ("STUDYCIRCLE_AI_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.suggestions.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.suggestions.model, "local-model");
        assert_eq!(config.suggestions.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_malformed_port_is_an_error() {
        assert!(Config::from_lookup(lookup(&[("STUDYCIRCLE_PORT", "eighty")])).is_err());
    }
}
