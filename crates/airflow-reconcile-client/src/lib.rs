//! HTTP transport and provider configuration for the Airflow reconciler.

pub mod client;
pub mod config;
pub mod error;

pub use client::AirflowClient;
pub use crate::config::{Credentials, ENV_PREFIX, ProviderConfig};
pub use error::{ClientError, ConfigError};
