//! Endpoint configuration, resolved once at the boundary.
//!
//! The synchronization core only ever sees fully-resolved values; the
//! environment-variable fallbacks of the surrounding tooling live here and
//! nowhere else.

use crate::auth::Credentials;
use crate::error::{RebarError, RebarResult};

/// Role requested for the short-lived token when the caller does not pick one.
pub const DEFAULT_ROLE: &str = "superuser";

fn default_timeout() -> u64 {
    30
}

/// Connection parameters for a provisioning endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL of the endpoint (e.g., "<https://rebar.example.com:8092>").
    pub url: String,

    /// Role associated to the token requested for performing actions.
    pub role: String,

    /// Credentials used for the token exchange.
    pub credentials: Credentials,

    /// Reject transport calls presenting an invalid certificate when true.
    pub tls_verify: bool,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Create a config with required fields and defaults for the rest.
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            role: DEFAULT_ROLE.to_string(),
            credentials,
            tls_verify: true,
            timeout_secs: default_timeout(),
        }
    }

    /// Set the token role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set TLS certificate verification.
    #[must_use]
    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> RebarResult<()> {
        if self.url.is_empty() {
            return Err(RebarError::invalid_config("endpoint URL is required"));
        }
        url::Url::parse(&self.url)
            .map_err(|e| RebarError::invalid_config(format!("invalid endpoint URL: {e}")))?;
        if self.role.is_empty() {
            return Err(RebarError::invalid_config("token role must not be empty"));
        }
        Ok(())
    }

    /// Build a config from the process environment.
    ///
    /// Recognized variables: `RS_ENDPOINT`, `RS_KEY` (combined `user:pass`
    /// key), `RS_USER` + `RS_PASS`, and `RS_ENDPOINT_VALIDATE`. The combined
    /// key wins when both credential shapes are present.
    pub fn from_env() -> RebarResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RebarResult<Self> {
        let url = lookup("RS_ENDPOINT")
            .ok_or_else(|| RebarError::invalid_config("RS_ENDPOINT is not set"))?;

        let credentials = if let Some(key) = lookup("RS_KEY") {
            Credentials::ApiKey { key }
        } else {
            match (lookup("RS_USER"), lookup("RS_PASS")) {
                (Some(username), Some(password)) => Credentials::UserPass { username, password },
                _ => {
                    return Err(RebarError::invalid_config(
                        "either RS_KEY or both RS_USER and RS_PASS must be set",
                    ))
                }
            }
        };

        let tls_verify = match lookup("RS_ENDPOINT_VALIDATE") {
            Some(raw) => !matches!(raw.to_lowercase().as_str(), "false" | "no" | "0"),
            None => true,
        };

        Ok(Self::new(url, credentials).with_tls_verify(tls_verify))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(vars: Vec<(&'static str, &'static str)>) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn test_new_defaults() {
        let config = EndpointConfig::new(
            "https://rebar.example.com:8092",
            Credentials::ApiKey {
                key: "a:b".to_string(),
            },
        );
        assert_eq!(config.role, DEFAULT_ROLE);
        assert!(config.tls_verify);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = EndpointConfig::new(
            "not a url",
            Credentials::ApiKey {
                key: "a:b".to_string(),
            },
        );
        assert!(config.validate().is_err());

        let config = EndpointConfig::new(
            "",
            Credentials::ApiKey {
                key: "a:b".to_string(),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup_combined_key_wins() {
        let config = EndpointConfig::from_lookup(lookup_from(vec![
            ("RS_ENDPOINT", "https://rebar.example.com"),
            ("RS_KEY", "user:pass"),
            ("RS_USER", "other"),
            ("RS_PASS", "secret"),
        ]))
        .unwrap();

        match config.credentials {
            Credentials::ApiKey { ref key } => assert_eq!(key, "user:pass"),
            Credentials::UserPass { .. } => panic!("expected combined key to win"),
        }
    }

    #[test]
    fn test_from_lookup_userpass() {
        let config = EndpointConfig::from_lookup(lookup_from(vec![
            ("RS_ENDPOINT", "https://rebar.example.com"),
            ("RS_USER", "admin"),
            ("RS_PASS", "secret"),
            ("RS_ENDPOINT_VALIDATE", "false"),
        ]))
        .unwrap();

        assert!(!config.tls_verify);
        match config.credentials {
            Credentials::UserPass {
                ref username,
                ref password,
            } => {
                assert_eq!(username, "admin");
                assert_eq!(password, "secret");
            }
            Credentials::ApiKey { .. } => panic!("expected user/pass pair"),
        }
    }

    #[test]
    fn test_from_lookup_missing_endpoint() {
        let err = EndpointConfig::from_lookup(lookup_from(vec![("RS_KEY", "a:b")])).unwrap_err();
        assert!(err.to_string().contains("RS_ENDPOINT"));
    }

    #[test]
    fn test_from_lookup_missing_credentials() {
        let err = EndpointConfig::from_lookup(lookup_from(vec![
            ("RS_ENDPOINT", "https://rebar.example.com"),
            ("RS_USER", "admin"),
        ]))
        .unwrap_err();
        assert!(err.is_local());
    }
}
