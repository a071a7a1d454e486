//! Token acquisition — short-lived bearer tokens scoped to a role.
//!
//! One token is fetched per invocation and never cached or persisted; every
//! subsequent request in that invocation carries the resulting header.

use serde::Deserialize;
use tracing::debug;

use crate::error::{RebarError, RebarResult};

/// Credentials used to obtain a short-lived token.
///
/// The [`Debug`] impl redacts secrets to prevent accidental credential
/// exposure in log output.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// Combined `user:pass` API key.
    #[serde(rename = "key")]
    ApiKey { key: String },

    /// Username and password pair.
    #[serde(rename = "userpass")]
    UserPass { username: String, password: String },
}

impl Credentials {
    /// Split into the (user, password) pair used for the basic-auth token
    /// exchange.
    ///
    /// An API key carries both parts in one `user:pass` string; a key
    /// without a separator cannot be used for the exchange.
    pub fn basic_parts(&self) -> RebarResult<(&str, &str)> {
        match self {
            Credentials::ApiKey { key } => key.split_once(':').ok_or_else(|| {
                RebarError::validation("API key must have the form user:pass")
            }),
            Credentials::UserPass { username, password } => {
                Ok((username.as_str(), password.as_str()))
            }
        }
    }

    /// The secret literals this credential shape contributes to redaction.
    #[must_use]
    pub fn secret_values(&self) -> Vec<String> {
        match self {
            Credentials::ApiKey { key } => vec![key.clone()],
            Credentials::UserPass { password, .. } => vec![password.clone()],
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey { .. } => f
                .debug_struct("ApiKey")
                .field("key", &"[REDACTED]")
                .finish(),
            Self::UserPass { username, .. } => f
                .debug_struct("UserPass")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Token response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "Token")]
    token: String,
}

/// Short-lived bearer token returned by the token endpoint.
#[derive(Debug, Clone)]
pub struct Token {
    token: String,
}

impl Token {
    /// The raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Ready-to-use authorization header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Exchange credentials for a short-lived bearer token scoped to `role`.
///
/// Performs a single GET against the endpoint's token route with HTTP basic
/// auth. A non-success response fails with the remote status and body; no
/// retry is attempted at this layer.
pub async fn fetch_token(
    http_client: &reqwest::Client,
    endpoint: &str,
    role: &str,
    credentials: &Credentials,
) -> RebarResult<Token> {
    let (user, password) = credentials.basic_parts()?;
    let url = format!(
        "{}/api/v3/users/{}/token",
        endpoint.trim_end_matches('/'),
        user
    );
    debug!("fetching bearer token from {} (role {})", url, role);

    let response = http_client
        .get(&url)
        .query(&[("roles", role)])
        .basic_auth(user, Some(password))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(RebarError::Auth { status, body });
    }

    let parsed: TokenResponse = response.json().await.map_err(|e| RebarError::Parse {
        message: format!("token response: {e}"),
    })?;

    Ok(Token {
        token: parsed.token,
    })
}
