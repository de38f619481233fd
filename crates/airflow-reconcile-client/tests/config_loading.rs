//! Loading `ProviderConfig` from TOML files and environment overrides.

use std::io::Write;

use airflow_reconcile_client::{ConfigError, Credentials, ProviderConfig};

fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

fn toml_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = toml_file(
        r#"
base_endpoint = "https://airflow.example.com"
oauth2_token = "tok"
disable_ssl_verification = true
"#,
    );

    let cfg = ProviderConfig::load_with_env(Some(file.path()), env(&[])).unwrap();

    assert_eq!(cfg.base_endpoint, "https://airflow.example.com");
    assert!(cfg.disable_ssl_verification);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.credentials(), Credentials::Bearer("tok".into()));
}

#[test]
fn test_environment_overrides_file() {
    let file = toml_file(
        r#"
base_endpoint = "http://localhost:8080"
log_level = "warn"
"#,
    );

    let cfg = ProviderConfig::load_with_env(
        Some(file.path()),
        env(&[
            ("AIRFLOW_BASE_ENDPOINT", "http://airflow:8080"),
            ("AIRFLOW_API_USERNAME", "admin"),
            ("AIRFLOW_API_PASSWORD", "pw"),
            ("AIRFLOW_LOG_LEVEL", "DEBUG"),
        ]),
    )
    .unwrap();

    assert_eq!(cfg.base_endpoint, "http://airflow:8080");
    assert_eq!(cfg.log_level, "debug");
    assert_eq!(
        cfg.credentials(),
        Credentials::Login {
            username: "admin".into(),
            password: "pw".into()
        }
    );
}

#[test]
fn test_environment_only() {
    let cfg = ProviderConfig::load_with_env(
        None,
        env(&[
            ("AIRFLOW_BASE_ENDPOINT", "http://airflow:8080"),
            ("AIRFLOW_DISABLE_SSL_VERIFICATION", "true"),
        ]),
    )
    .unwrap();

    assert!(cfg.disable_ssl_verification);
    assert_eq!(cfg.credentials(), Credentials::Anonymous);
}

#[test]
fn test_missing_endpoint_is_a_load_error() {
    let err = ProviderConfig::load_with_env(None, env(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_conflicting_credentials_are_rejected() {
    let err = ProviderConfig::load_with_env(
        None,
        env(&[
            ("AIRFLOW_BASE_ENDPOINT", "http://airflow:8080"),
            ("AIRFLOW_OAUTH2_TOKEN", "tok"),
            ("AIRFLOW_API_USERNAME", "admin"),
            ("AIRFLOW_API_PASSWORD", "pw"),
        ]),
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("conflicts"));
}

#[test]
fn test_username_requires_password() {
    let err = ProviderConfig::load_with_env(
        None,
        env(&[
            ("AIRFLOW_BASE_ENDPOINT", "http://airflow:8080"),
            ("AIRFLOW_API_USERNAME", "admin"),
        ]),
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = ProviderConfig::load_with_env(
        Some(&path),
        env(&[("AIRFLOW_BASE_ENDPOINT", "http://airflow:8080")]),
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::Load(_)));
}
