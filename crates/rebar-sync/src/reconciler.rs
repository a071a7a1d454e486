//! Create-or-update reconciliation against the provisioning API.
//!
//! Per invocation the state machine is
//! `FETCH_REMOTE -> DECIDE -> {NOOP, CREATE, UPDATE, DELETE}`. Objects are
//! keyed by caller-chosen name, never by a server-assigned id. Under check
//! mode no mutating call is issued; the decision and diff are still
//! computed and reported.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::client::RebarClient;
use crate::diff::{diff_objects, IgnoreKeys, ObjectDiff};
use crate::error::RebarResult;
use crate::resource::ResourceKind;

/// Desired existence of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// The resource should exist with the desired state.
    Present,
    /// The resource should not exist.
    Absent,
}

impl Intent {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Present => "present",
            Intent::Absent => "absent",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = ParseIntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "present" => Ok(Intent::Present),
            "absent" => Ok(Intent::Absent),
            _ => Err(ParseIntentError(s.to_string())),
        }
    }
}

/// Error parsing an intent from string.
#[derive(Debug, Clone)]
pub struct ParseIntentError(String);

impl fmt::Display for ParseIntentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid intent '{}', expected present or absent", self.0)
    }
}

impl std::error::Error for ParseIntentError {}

/// Uniform envelope returned to the caller.
///
/// `http_code` outside {200, 201} means the mutating call was rejected by
/// the endpoint; the body is carried in `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResult {
    /// Whether remote state differed from the requested state.
    pub changed: bool,

    /// The message returned by the API, empty on a no-op.
    pub message: String,

    /// HTTP status of the mutating call, or the would-be success code.
    pub http_code: u16,

    /// Before/after pair with ignored fields removed.
    pub diff: Option<ObjectDiff>,
}

/// Whether a result code falls inside the caller-facing success contract.
#[must_use]
pub fn is_success(http_code: u16) -> bool {
    matches!(http_code, 200 | 201)
}

fn body_message(body: &Value) -> String {
    match body {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Drives one resource kind toward its desired state.
pub struct Reconciler<'a> {
    client: &'a RebarClient,
    kind: ResourceKind,
    ignore_keys: IgnoreKeys,
    check_mode: bool,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for one resource kind.
    #[must_use]
    pub fn new(client: &'a RebarClient, kind: ResourceKind) -> Self {
        Self {
            client,
            kind,
            ignore_keys: IgnoreKeys::default(),
            check_mode: false,
        }
    }

    /// Replace the ignore lists used for comparison.
    #[must_use]
    pub fn ignore_keys(mut self, ignore_keys: IgnoreKeys) -> Self {
        self.ignore_keys = ignore_keys;
        self
    }

    /// Skip mutating calls, still reporting the decision and diff.
    #[must_use]
    pub fn check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Reconcile `name` toward `intent`.
    ///
    /// `desired` must be `Some` for [`Intent::Present`] and is ignored for
    /// [`Intent::Absent`].
    pub async fn ensure(
        &self,
        name: &str,
        intent: Intent,
        desired: Option<&Map<String, Value>>,
    ) -> RebarResult<ReconcileResult> {
        match intent {
            Intent::Present => {
                let desired = desired.map_or_else(Map::new, Clone::clone);
                self.ensure_present(name, &desired).await
            }
            Intent::Absent => self.ensure_absent(name).await,
        }
    }

    /// Make `name` exist with the desired state.
    pub async fn ensure_present(
        &self,
        name: &str,
        desired: &Map<String, Value>,
    ) -> RebarResult<ReconcileResult> {
        let remote = self.client.get_object(self.kind, name).await?;
        let (changed, diff) = diff_objects(Some(desired), remote.as_ref(), &self.ignore_keys);

        let (http_code, message) = match (remote.is_some(), changed) {
            (false, _) => {
                debug!("{} {} does not exist, creating", self.kind, name);
                if self.check_mode {
                    (201, String::new())
                } else {
                    let (code, body) = self.client.create_object(self.kind, desired).await?;
                    (code, body_message(&body))
                }
            }
            (true, false) => {
                debug!("{} {} is up to date", self.kind, name);
                (200, String::new())
            }
            (true, true) => {
                debug!("{} {} differs, updating", self.kind, name);
                if self.check_mode {
                    (200, String::new())
                } else {
                    let (code, body) = self.client.update_object(self.kind, name, desired).await?;
                    (code, body_message(&body))
                }
            }
        };

        Ok(ReconcileResult {
            changed,
            message,
            http_code,
            diff: Some(diff),
        })
    }

    /// Make `name` not exist.
    pub async fn ensure_absent(&self, name: &str) -> RebarResult<ReconcileResult> {
        let remote = self.client.get_object(self.kind, name).await?;
        let (changed, diff) = diff_objects(None, remote.as_ref(), &self.ignore_keys);

        let (http_code, message) = if !changed {
            debug!("{} {} already absent", self.kind, name);
            (200, String::new())
        } else if self.check_mode {
            debug!("{} {} exists, would delete", self.kind, name);
            (200, String::new())
        } else {
            debug!("{} {} exists, deleting", self.kind, name);
            let (code, body) = self.client.delete_object(self.kind, name).await?;
            (code, body_message(&body))
        };

        Ok(ReconcileResult {
            changed,
            message,
            http_code,
            diff: Some(diff),
        })
    }
}
