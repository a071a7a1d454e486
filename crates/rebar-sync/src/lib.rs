//! Declarative resource synchronization for Digital Rebar style
//! provisioning endpoints.
//!
//! Callers describe the desired state of a named resource (param, profile,
//! subnet, task, or template) and [`sync_resource`] makes the remote state
//! match it: a short-lived bearer token is fetched, the remote object is
//! read by name, an ignore-list-aware field diff decides between no-op,
//! create, update, and delete, and a uniform [`ReconcileResult`] envelope
//! is returned with any registered secrets scrubbed from its message and
//! diff. Check mode computes the same decision without issuing a write.
//!
//! Each invocation is independent and stateless; concurrent invocations
//! targeting the same name race at the endpoint.

pub mod auth;
pub mod client;
pub mod config;
pub mod diff;
pub mod error;
pub mod redact;
pub mod reconciler;
pub mod resource;

pub use auth::{Credentials, Token};
pub use client::RebarClient;
pub use config::EndpointConfig;
pub use diff::{IgnoreKeys, ObjectDiff};
pub use error::{RebarError, RebarResult};
pub use reconciler::{is_success, Intent, ReconcileResult, Reconciler};
pub use resource::{
    ParamSpec, ProfileSpec, ResourceKind, ResourceSpec, SubnetSpec, TaskSpec, TemplateSpec,
};

use redact::Redactor;

/// Synchronize one resource toward the requested intent.
///
/// The payload is shaped (and validated) before any transport call, then a
/// token is fetched and the reconciler drives the remote object toward the
/// desired state. `ignore_keys = None` uses the spec's per-kind defaults.
/// The returned envelope has had the kind's diff presentation applied and
/// every registered secret value scrubbed out.
pub async fn sync_resource<S: ResourceSpec>(
    config: &EndpointConfig,
    spec: &S,
    intent: Intent,
    ignore_keys: Option<IgnoreKeys>,
    check_mode: bool,
) -> RebarResult<ReconcileResult> {
    // Validation failures must surface before the endpoint is touched,
    // regardless of intent.
    let payload = spec.build_payload()?;

    let mut redactor = Redactor::new();
    for secret in config.credentials.secret_values() {
        redactor.register(secret);
    }
    for secret in spec.secret_values() {
        redactor.register(secret);
    }

    let ignore_keys = ignore_keys.unwrap_or_else(|| spec.default_ignore_keys());

    let client = RebarClient::connect(config).await?;
    let reconciler = Reconciler::new(&client, spec.kind())
        .ignore_keys(ignore_keys)
        .check_mode(check_mode);

    let mut result = reconciler
        .ensure(spec.name(), intent, Some(&payload))
        .await?;

    result.diff = result.diff.map(|d| spec.present_diff(d));
    scrub_result(&redactor, &mut result);
    Ok(result)
}

fn scrub_result(redactor: &Redactor, result: &mut ReconcileResult) {
    if redactor.is_empty() {
        return;
    }
    result.message = redactor.scrub_str(&result.message);
    if let Some(diff) = result.diff.take() {
        result.diff = Some(ObjectDiff {
            before: redactor.scrub_value(diff.before),
            after: redactor.scrub_value(diff.after),
        });
    }
}
