//! Provider configuration.
//!
//! Values come from an optional TOML file, overridden by environment
//! variables with the `AIRFLOW_` prefix (`AIRFLOW_BASE_ENDPOINT`,
//! `AIRFLOW_OAUTH2_TOKEN`, `AIRFLOW_API_USERNAME`, `AIRFLOW_API_PASSWORD`,
//! `AIRFLOW_DISABLE_SSL_VERIFICATION`, `AIRFLOW_LOG_LEVEL`).

use std::fmt;
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "AIRFLOW";

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Root of the Airflow webserver, e.g. `https://airflow.example.com`.
    pub base_endpoint: String,
    #[serde(default)]
    pub oauth2_token: Option<String>,
    #[serde(default, alias = "api_username")]
    pub username: Option<String>,
    #[serde(default, alias = "api_password")]
    pub password: Option<String>,
    #[serde(default)]
    pub disable_ssl_verification: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderConfig")
            .field("base_endpoint", &self.base_endpoint)
            .field("oauth2_token", &redact(&self.oauth2_token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("disable_ssl_verification", &self.disable_ssl_verification)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// How requests authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    Bearer(String),
    /// Exchanged for a bearer token before the first API call.
    Login { username: String, password: String },
}

impl ProviderConfig {
    /// Loads from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`ProviderConfig::load`], reading environment variables from
    /// `env` instead of the process environment when it is `Some`.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true)
                .source(env),
        );

        let mut cfg: ProviderConfig = builder.build()?.try_deserialize()?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    fn normalize(&mut self) {
        for value in [&mut self.oauth2_token, &mut self.username, &mut self.password] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        self.log_level = self.log_level.trim().to_ascii_lowercase();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = Url::parse(&self.base_endpoint).map_err(|e| {
            ConfigError::Invalid(format!(
                "`base_endpoint` `{}` is not a valid URL: {e}",
                self.base_endpoint
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "`base_endpoint` must use http or https, got `{}`",
                endpoint.scheme()
            )));
        }

        if self.oauth2_token.is_some() && (self.username.is_some() || self.password.is_some()) {
            return Err(ConfigError::Invalid(
                "`oauth2_token` conflicts with `username` and `password`".into(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::Invalid(
                "`username` and `password` must be set together".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "`log_level` must be one of {LOG_LEVELS:?}"
            )));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        match (&self.oauth2_token, &self.username, &self.password) {
            (Some(token), _, _) => Credentials::Bearer(token.clone()),
            (None, Some(username), Some(password)) => Credentials::Login {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Credentials::Anonymous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig {
            base_endpoint: "http://localhost:8080".into(),
            oauth2_token: None,
            username: None,
            password: None,
            disable_ssl_verification: false,
            log_level: "info".into(),
        }
    }

    #[test]
    fn test_credentials_selection() {
        assert_eq!(config().credentials(), Credentials::Anonymous);

        let mut cfg = config();
        cfg.oauth2_token = Some("tok".into());
        assert_eq!(cfg.credentials(), Credentials::Bearer("tok".into()));

        let mut cfg = config();
        cfg.username = Some("admin".into());
        cfg.password = Some("pw".into());
        assert_eq!(
            cfg.credentials(),
            Credentials::Login {
                username: "admin".into(),
                password: "pw".into()
            }
        );
    }

    #[test]
    fn test_validation_rules() {
        assert!(config().validate().is_ok());

        let mut cfg = config();
        cfg.base_endpoint = "ftp://example.com".into();
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.oauth2_token = Some("tok".into());
        cfg.username = Some("admin".into());
        cfg.password = Some("pw".into());
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.username = Some("admin".into());
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut cfg = config();
        cfg.oauth2_token = Some("very-secret".into());
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
