use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::capabilities::http::{HostPolicy, HttpError, ValidatedUrl, MAX_TIMEOUT_MS};
use crate::submission::{RetryPolicy, MAX_RETRIES_PER_SUBMIT};
use crate::{ACCESS_TOKEN_KEY, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_MS, MAX_ASSET_BYTES};

pub const BASE_URL_ENV: &str = "LIBRARY_API_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] HttpError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub token_key: String,
    pub timeout_ms: u64,
    pub allow_private_hosts: bool,
    pub retry: RetryPolicy,
    pub max_asset_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_key: ACCESS_TOKEN_KEY.to_string(),
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            allow_private_hosts: true,
            retry: RetryPolicy::single(),
            max_asset_bytes: MAX_ASSET_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let config = Self::from_json(&text)?.with_env_overrides();
        config.validate()?;
        debug!(base_url = %config.base_url, "client config loaded");
        Ok(config)
    }

    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = base_url.trim().to_string();
        }
        self
    }

    pub fn host_policy(&self) -> HostPolicy {
        if self.allow_private_hosts {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ValidatedUrl::with_policy(self.base_url.clone(), self.host_policy())?;

        if self.token_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "token_key",
                reason: "must not be empty".into(),
            });
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid {
                field: "timeout_ms",
                reason: format!("must be in 1..={MAX_TIMEOUT_MS}"),
            });
        }
        if self.retry.max_retries > MAX_RETRIES_PER_SUBMIT {
            return Err(ConfigError::Invalid {
                field: "retry.max_retries",
                reason: format!("at most {MAX_RETRIES_PER_SUBMIT} retry per submit"),
            });
        }
        if self.max_asset_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_asset_bytes",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Absolute URL for a backend path such as `/users/employee`.
    pub fn endpoint(&self, path: &str) -> Result<ValidatedUrl, HttpError> {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        ValidatedUrl::with_policy(format!("{base}/{path}"), self.host_policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_emulator_backend() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.base_url, "http://10.0.2.2:5000");
        assert_eq!(config.token_key, "ACCESS_TOKEN");
        assert_eq!(config.retry, RetryPolicy::single());
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let config = ClientConfig::default();
        assert_eq!(
            config.endpoint("/users/employee").unwrap().as_str(),
            "http://10.0.2.2:5000/users/employee"
        );

        let config = ClientConfig {
            base_url: "https://library.example.com/api/".into(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.endpoint("books/authors").unwrap().as_str(),
            "https://library.example.com/api/books/authors"
        );
    }

    #[test]
    fn test_private_hosts_can_be_disallowed() {
        let config = ClientConfig {
            allow_private_hosts: false,
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BaseUrl(HttpError::PrivateNetworkBlocked { .. }))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ClientConfig::from_json(r#"{"timeout_ms": 5000}"#).unwrap();
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.allow_private_hosts);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            ClientConfig::from_json(r#"{"timeout_ms": 0}"#),
            Err(ConfigError::Invalid { field: "timeout_ms", .. })
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"base_url": "ftp://x"}"#),
            Err(ConfigError::BaseUrl(_))
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"retry": {"max_retries": 3}}"#),
            Err(ConfigError::Invalid { field: "retry.max_retries", .. })
        ));
        assert!(matches!(
            ClientConfig::from_json("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_base_url_override() {
        let config = ClientConfig::default().with_overrides_from(|name| {
            (name == BASE_URL_ENV).then(|| " https://api.example.com ".to_string())
        });
        assert_eq!(config.base_url, "https://api.example.com");

        let config = ClientConfig::default().with_overrides_from(|_| Some(String::new()));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        tokio::fs::write(&path, r#"{"retry": {"max_retries": 0}}"#)
            .await
            .unwrap();

        let config = ClientConfig::load(&path).await.unwrap();
        assert_eq!(config.retry, RetryPolicy::none());

        let missing = ClientConfig::load(dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
