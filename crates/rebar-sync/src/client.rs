//! HTTP transport for the provisioning API (reqwest-based).
//!
//! Reads are strict: anything other than success or not-found is a
//! transport failure. Write status codes are returned verbatim so the
//! reconciler can surface them in its result envelope.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::auth;
use crate::config::EndpointConfig;
use crate::error::{RebarError, RebarResult};
use crate::resource::ResourceKind;

/// Authenticated HTTP client for object CRUD against the provisioning API.
#[derive(Debug, Clone)]
pub struct RebarClient {
    base_url: String,
    http_client: Client,
    auth_header: String,
}

impl RebarClient {
    /// Build a client from endpoint configuration and perform the token
    /// exchange.
    ///
    /// The resulting bearer header is used for every subsequent request in
    /// this invocation; it is never cached across invocations.
    pub async fn connect(config: &EndpointConfig) -> RebarResult<Self> {
        config.validate()?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.tls_verify)
            .user_agent(concat!("rebar-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RebarError::invalid_config(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.url.trim_end_matches('/').to_string();

        let token =
            auth::fetch_token(&http_client, &base_url, &config.role, &config.credentials).await?;

        Ok(Self {
            base_url,
            http_client,
            auth_header: token.authorization_header(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` and a fixed
    /// authorization header (for testing).
    #[must_use]
    pub fn with_http_client(
        base_url: impl Into<String>,
        auth_header: impl Into<String>,
        http_client: Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http_client,
            auth_header: auth_header.into(),
        }
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, kind: ResourceKind) -> String {
        format!("{}/api/v3/{}", self.base_url, kind.as_str())
    }

    fn object_url(&self, kind: ResourceKind, name: &str) -> String {
        format!("{}/api/v3/{}/{}", self.base_url, kind.as_str(), name)
    }

    /// Fetch an object by name. `Ok(None)` when it does not exist.
    pub async fn get_object(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> RebarResult<Option<Map<String, Value>>> {
        let url = self.object_url(kind, name);
        debug!("GET {}", url);
        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RebarError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        match serde_json::from_str(&body)? {
            Value::Object(map) => Ok(Some(map)),
            other => Err(RebarError::Parse {
                message: format!("expected a JSON object, got {other}"),
            }),
        }
    }

    /// Create an object. Returns the remote status code and body verbatim.
    pub async fn create_object(
        &self,
        kind: ResourceKind,
        payload: &Map<String, Value>,
    ) -> RebarResult<(u16, Value)> {
        let url = self.collection_url(kind);
        debug!("POST {}", url);
        let response = self
            .http_client
            .post(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .json(payload)
            .send()
            .await?;
        Self::status_and_body(response).await
    }

    /// Replace an object by name. Returns the remote status code and body
    /// verbatim.
    pub async fn update_object(
        &self,
        kind: ResourceKind,
        name: &str,
        payload: &Map<String, Value>,
    ) -> RebarResult<(u16, Value)> {
        let url = self.object_url(kind, name);
        debug!("PUT {}", url);
        let response = self
            .http_client
            .put(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .json(payload)
            .send()
            .await?;
        Self::status_and_body(response).await
    }

    /// Delete an object by name. Returns the remote status code and body
    /// verbatim.
    pub async fn delete_object(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> RebarResult<(u16, Value)> {
        let url = self.object_url(kind, name);
        debug!("DELETE {}", url);
        let response = self
            .http_client
            .delete(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await?;
        Self::status_and_body(response).await
    }

    async fn status_and_body(response: reqwest::Response) -> RebarResult<(u16, Value)> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, body))
    }
}
