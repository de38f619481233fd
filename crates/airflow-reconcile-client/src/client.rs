use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use airflow_reconcile_core::{Kind, RemoteFailure, RemoteOutcome, Transport};

use crate::config::{Credentials, ProviderConfig};
use crate::error::ClientError;

/// HTTP transport for the Airflow stable REST API (`/api/v2`).
pub struct AirflowClient {
    http: reqwest::Client,
    root: Url,
    api: Url,
    token: Option<String>,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl AirflowClient {
    pub fn new(
        base_endpoint: &str,
        token: Option<String>,
        disable_ssl_verification: bool,
    ) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidEndpoint {
            endpoint: base_endpoint.to_string(),
            reason,
        };

        let mut root = Url::parse(base_endpoint).map_err(|e| invalid(e.to_string()))?;
        if root.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".into()));
        }
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let api = root.join("api/v2/").map_err(|e| invalid(e.to_string()))?;

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(disable_ssl_verification)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            root,
            api,
            token,
        })
    }

    /// Builds a client from `config`, logging in first when it carries a
    /// username and password.
    pub async fn connect(config: &ProviderConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let mut client = Self::new(
            &config.base_endpoint,
            None,
            config.disable_ssl_verification,
        )?;
        match config.credentials() {
            Credentials::Anonymous => {}
            Credentials::Bearer(token) => client.token = Some(token),
            Credentials::Login { username, password } => {
                client.token = Some(client.login(&username, &password).await?);
            }
        }
        Ok(client)
    }

    /// Exchanges basic credentials for an access token via `POST /auth/token`.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ClientError> {
        let failed = |message: String| ClientError::Login {
            username: username.to_string(),
            message,
        };
        let url = self
            .root
            .join("auth/token")
            .map_err(|e| failed(e.to_string()))?;

        let resp = self
            .http
            .post(url)
            .json(&LoginBody { username, password })
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_message(status, &body)
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| failed(format!("unexpected token response: {e}")))?;
        info!(username, "obtained API access token");
        Ok(token.access_token)
    }

    fn url(&self, kind: Kind, id: Option<&str>) -> Url {
        let mut url = self.api.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(kind.collection());
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "airflow request");
        let req = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> RemoteOutcome<Value> {
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                return RemoteOutcome::Failure(RemoteFailure::unreachable(format!(
                    "request failed: {e}"
                )));
            }
        };

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "airflow response");

        if !status.is_success() {
            return RemoteOutcome::from_error_status(status.as_u16(), error_message(status, &body));
        }
        if body.trim().is_empty() {
            return RemoteOutcome::Success(Value::Null);
        }
        match serde_json::from_str(&body) {
            Ok(value) => RemoteOutcome::Success(value),
            Err(e) => RemoteOutcome::Failure(RemoteFailure::new(
                status.as_u16(),
                format!("failed to parse response JSON: {e}"),
            )),
        }
    }
}

/// `detail` of a JSON error body, else the raw body, else the reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body)
        && let Some(detail) = obj.get("detail").filter(|d| !d.is_null())
    {
        return match detail {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

#[async_trait]
impl Transport for AirflowClient {
    async fn create(&self, kind: Kind, payload: &Value) -> RemoteOutcome<Value> {
        let req = self.request(Method::POST, self.url(kind, None)).json(payload);
        self.send(req).await
    }

    async fn read(&self, kind: Kind, id: &str) -> RemoteOutcome<Value> {
        let req = self.request(Method::GET, self.url(kind, Some(id)));
        self.send(req).await
    }

    async fn update(
        &self,
        kind: Kind,
        id: &str,
        payload: &Value,
        update_mask: &[&str],
    ) -> RemoteOutcome<Value> {
        let mask: Vec<(&str, &str)> = update_mask.iter().map(|f| ("update_mask", *f)).collect();
        let req = self
            .request(Method::PATCH, self.url(kind, Some(id)))
            .query(&mask)
            .json(payload);
        self.send(req).await
    }

    async fn delete(&self, kind: Kind, id: &str) -> RemoteOutcome<()> {
        let req = self.request(Method::DELETE, self.url(kind, Some(id)));
        match self.send(req).await {
            RemoteOutcome::Success(_) => RemoteOutcome::Success(()),
            RemoteOutcome::NotFound(m) => RemoteOutcome::NotFound(m),
            RemoteOutcome::Conflict(m) => RemoteOutcome::Conflict(m),
            RemoteOutcome::Failure(f) => RemoteOutcome::Failure(f),
        }
    }
}
