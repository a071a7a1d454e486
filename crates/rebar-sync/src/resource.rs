//! Per-kind payload shaping for the resources the client manages.
//!
//! Each adapter turns caller-supplied options into the wire payload the
//! endpoint expects (capitalized field names, kind-specific skeleton
//! defaults, derived fields), and optionally post-processes the diff for
//! presentation. Payload building happens before any transport call, so
//! malformed input fails locally.

use serde_json::{json, Map, Value};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::diff::{IgnoreKeys, ObjectDiff};
use crate::error::{RebarError, RebarResult};
use crate::redact::schema_secrets;

/// Kind of managed resource; `as_str` is the API path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Params,
    Profiles,
    Subnets,
    Tasks,
    Templates,
}

impl ResourceKind {
    /// Get all managed resource kinds.
    #[must_use]
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Params,
            ResourceKind::Profiles,
            ResourceKind::Subnets,
            ResourceKind::Tasks,
            ResourceKind::Templates,
        ]
    }

    /// Get the API path segment for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Params => "params",
            ResourceKind::Profiles => "profiles",
            ResourceKind::Subnets => "subnets",
            ResourceKind::Tasks => "tasks",
            ResourceKind::Templates => "templates",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseResourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "params" => Ok(ResourceKind::Params),
            "profiles" => Ok(ResourceKind::Profiles),
            "subnets" => Ok(ResourceKind::Subnets),
            "tasks" => Ok(ResourceKind::Tasks),
            "templates" => Ok(ResourceKind::Templates),
            _ => Err(ParseResourceKindError(s.to_string())),
        }
    }
}

/// Error parsing a resource kind from string.
#[derive(Debug, Clone)]
pub struct ParseResourceKindError(String);

impl fmt::Display for ParseResourceKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid resource kind '{}', expected one of: params, profiles, subnets, tasks, templates",
            self.0
        )
    }
}

impl std::error::Error for ParseResourceKindError {}

/// Base object template for a kind, carrying the fields the endpoint
/// expects on every object of that kind.
fn skeleton(kind: ResourceKind) -> Map<String, Value> {
    let value = match kind {
        ResourceKind::Params => json!({
            "Name": "",
            "Description": "",
            "Documentation": "",
            "Meta": {},
            "ReadOnly": false,
            "Schema": {},
            "Secure": false,
        }),
        ResourceKind::Profiles => json!({
            "Name": "",
            "Description": "",
            "Documentation": "",
            "Meta": {},
            "Params": {},
            "Partial": false,
            "ReadOnly": true,
        }),
        ResourceKind::Subnets => json!({
            "Name": "",
            "Description": "",
            "Enabled": true,
            "ActiveStart": "",
            "ActiveEnd": "",
            "ActiveLeaseTime": 0,
            "ReservedLeaseTime": 21600,
            "Subnet": "",
            "OnlyReservations": false,
            "Strategy": "MAC",
            "Pickers": ["hint", "nextFree", "mostExpired"],
            "Proxy": false,
            "Unmanaged": false,
            "Options": [
                {"Code": 3, "Value": ""},
                {"Code": 6, "Value": ""},
                {"Code": 15, "Value": ""},
                {"Code": 1, "Value": ""},
                {"Code": 28, "Value": ""},
            ],
        }),
        ResourceKind::Tasks => json!({
            "Name": "",
            "Description": "",
            "Documentation": "",
            "Templates": [],
            "Meta": {},
            "ExtraClaims": [],
            "ExtraRoles": [],
            "OutputParams": [],
            "Prerequisites": [],
            "RequiredParams": [],
            "OptionalParams": [],
            "ReadOnly": true,
        }),
        ResourceKind::Templates => json!({
            "ID": "",
            "Description": "",
            "Contents": "",
            "Meta": {},
            "ReadOnly": true,
        }),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Capability interface every managed resource kind implements.
///
/// `build_payload` shapes the desired state; `present_diff` lets a kind
/// post-process the reconciliation diff for presentation.
pub trait ResourceSpec {
    /// The kind this spec manages.
    fn kind(&self) -> ResourceKind;

    /// The unique, caller-chosen object name.
    fn name(&self) -> &str;

    /// Shape the desired-state payload the endpoint expects.
    fn build_payload(&self) -> RebarResult<Map<String, Value>>;

    /// Secret literals this spec contributes to redaction.
    fn secret_values(&self) -> Vec<String> {
        Vec::new()
    }

    /// Ignore lists applied when the caller does not supply any.
    fn default_ignore_keys(&self) -> IgnoreKeys {
        IgnoreKeys::default()
    }

    /// Post-process the reconciliation diff for presentation.
    fn present_diff(&self, diff: ObjectDiff) -> ObjectDiff {
        diff
    }
}

// ── Params ────────────────────────────────────────────────────────────

/// Desired state of a param definition.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub documentation: String,
    pub readonly: bool,
    /// Secure implies API interactions with this param carry secret data;
    /// the schema's declared values are registered for redaction.
    pub secure: bool,
    pub meta: Map<String, Value>,
    pub schema: Map<String, Value>,
}

impl ParamSpec {
    /// Create a param spec with the given value-schema.
    pub fn new(name: impl Into<String>, schema: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            documentation: String::new(),
            readonly: false,
            secure: false,
            meta: Map::new(),
            schema,
        }
    }
}

impl ResourceSpec for ParamSpec {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Params
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(&self) -> RebarResult<Map<String, Value>> {
        let mut payload = skeleton(self.kind());
        payload.insert("Name".into(), Value::String(self.name.clone()));
        payload.insert("Description".into(), Value::String(self.description.clone()));
        payload.insert(
            "Documentation".into(),
            Value::String(self.documentation.clone()),
        );
        payload.insert("ReadOnly".into(), Value::Bool(self.readonly));
        payload.insert("Meta".into(), Value::Object(self.meta.clone()));
        payload.insert("Schema".into(), Value::Object(self.schema.clone()));
        payload.insert("Secure".into(), Value::Bool(self.secure));
        Ok(payload)
    }

    fn secret_values(&self) -> Vec<String> {
        if self.secure {
            schema_secrets(&self.schema)
        } else {
            Vec::new()
        }
    }
}

// ── Profiles ──────────────────────────────────────────────────────────

/// Desired state of a profile.
#[derive(Debug, Clone)]
pub struct ProfileSpec {
    pub name: String,
    pub description: String,
    pub documentation: String,
    pub readonly: bool,
    pub partial: bool,
    pub meta: Map<String, Value>,
    pub params: Map<String, Value>,
}

impl ProfileSpec {
    /// Create a profile spec carrying the given params map.
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            documentation: String::new(),
            readonly: true,
            partial: false,
            meta: Map::new(),
            params,
        }
    }
}

impl ResourceSpec for ProfileSpec {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Profiles
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(&self) -> RebarResult<Map<String, Value>> {
        let mut payload = skeleton(self.kind());
        payload.insert("Name".into(), Value::String(self.name.clone()));
        payload.insert("Description".into(), Value::String(self.description.clone()));
        payload.insert(
            "Documentation".into(),
            Value::String(self.documentation.clone()),
        );
        payload.insert("ReadOnly".into(), Value::Bool(self.readonly));
        payload.insert("Partial".into(), Value::Bool(self.partial));
        payload.insert("Meta".into(), Value::Object(self.meta.clone()));
        payload.insert("Params".into(), Value::Object(self.params.clone()));
        Ok(payload)
    }
}

// ── Subnets ───────────────────────────────────────────────────────────

/// Positions of the derived and caller-supplied DHCP option slots in the
/// subnet skeleton: gateway, DNS server, domain name, netmask, broadcast.
const SUBNET_OPTION_SLOTS: usize = 5;

/// Desired state of a DHCP subnet.
///
/// `Subnet` (CIDR form) and the broadcast option are derived from
/// `network` + `netmask`; the caller never supplies them directly.
#[derive(Debug, Clone)]
pub struct SubnetSpec {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub active_start: String,
    pub active_end: String,
    pub active_lease_time: i64,
    pub reserved_lease_time: i64,
    pub network: String,
    pub netmask: String,
    pub gateway: String,
    pub dns_server: String,
    pub domain_name: String,
}

impl SubnetSpec {
    fn parse_network(&self) -> RebarResult<ipnet::Ipv4Net> {
        let network: Ipv4Addr = self.network.parse().map_err(|_| {
            RebarError::validation(format!("invalid network address '{}'", self.network))
        })?;
        let netmask: Ipv4Addr = self.netmask.parse().map_err(|_| {
            RebarError::validation(format!("invalid netmask '{}'", self.netmask))
        })?;
        let prefix = ipnet::ipv4_mask_to_prefix(netmask).map_err(|_| {
            RebarError::validation(format!("netmask '{}' is not contiguous", self.netmask))
        })?;
        let net = ipnet::Ipv4Net::new(network, prefix)
            .map_err(|e| RebarError::validation(format!("invalid network: {e}")))?;
        if net.addr() != net.network() {
            return Err(RebarError::validation(format!(
                "'{}/{}' has host bits set",
                self.network, self.netmask
            )));
        }
        Ok(net)
    }
}

impl ResourceSpec for SubnetSpec {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Subnets
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(&self) -> RebarResult<Map<String, Value>> {
        let net = self.parse_network()?;

        let mut payload = skeleton(self.kind());
        payload.insert("Name".into(), Value::String(self.name.clone()));
        payload.insert("Description".into(), Value::String(self.description.clone()));
        payload.insert("Enabled".into(), Value::Bool(self.enabled));
        payload.insert("ActiveStart".into(), Value::String(self.active_start.clone()));
        payload.insert("ActiveEnd".into(), Value::String(self.active_end.clone()));
        payload.insert("ActiveLeaseTime".into(), json!(self.active_lease_time));
        payload.insert("ReservedLeaseTime".into(), json!(self.reserved_lease_time));
        payload.insert("Subnet".into(), Value::String(net.to_string()));

        let slot_values = [
            self.gateway.clone(),
            self.dns_server.clone(),
            self.domain_name.clone(),
            self.netmask.clone(),
            net.broadcast().to_string(),
        ];
        debug_assert_eq!(slot_values.len(), SUBNET_OPTION_SLOTS);
        if let Some(Value::Array(options)) = payload.get_mut("Options") {
            for (slot, value) in options.iter_mut().zip(slot_values) {
                if let Value::Object(option) = slot {
                    option.insert("Value".into(), Value::String(value));
                }
            }
        }
        Ok(payload)
    }
}

// ── Tasks ─────────────────────────────────────────────────────────────

/// Fields the endpoint expects on every task template entry; filled in
/// when the caller omits them, never overwriting supplied values.
fn template_entry_defaults() -> [(&'static str, Value); 4] {
    [
        ("Path", Value::String(String::new())),
        ("ID", Value::String(String::new())),
        ("Link", Value::String(String::new())),
        ("Meta", Value::Object(Map::new())),
    ]
}

/// Desired state of a task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub documentation: String,
    pub readonly: bool,
    /// Template entries to render for the task; keys must use the casing
    /// the endpoint expects or idempotency is lost.
    pub templates: Vec<Map<String, Value>>,
}

impl TaskSpec {
    /// Create a task spec with the given template entries.
    pub fn new(name: impl Into<String>, templates: Vec<Map<String, Value>>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            documentation: String::new(),
            readonly: true,
            templates,
        }
    }
}

impl ResourceSpec for TaskSpec {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Tasks
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(&self) -> RebarResult<Map<String, Value>> {
        let mut payload = skeleton(self.kind());
        payload.insert("Name".into(), Value::String(self.name.clone()));
        payload.insert("Description".into(), Value::String(self.description.clone()));
        payload.insert(
            "Documentation".into(),
            Value::String(self.documentation.clone()),
        );
        payload.insert("ReadOnly".into(), Value::Bool(self.readonly));

        let templates: Vec<Value> = self
            .templates
            .iter()
            .map(|entry| {
                let mut enriched = entry.clone();
                for (key, default) in template_entry_defaults() {
                    enriched.entry(key).or_insert(default);
                }
                Value::Object(enriched)
            })
            .collect();
        payload.insert("Templates".into(), Value::Array(templates));
        Ok(payload)
    }

    fn default_ignore_keys(&self) -> IgnoreKeys {
        IgnoreKeys::default().with_local(["ExtraRoles", "OutputParams", "ExtraClaims", "Meta"])
    }
}

// ── Templates ─────────────────────────────────────────────────────────

/// Marker substituted for template contents when the caller asks for an
/// object-level diff.
pub const CONTENTS_PLACEHOLDER: &str = "REDACTED BY MODULE FOR EASY DIFF";

/// Desired state of a template.
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub name: String,
    pub description: String,
    pub readonly: bool,
    pub contents: String,
    /// Show the diff of the `Contents` field instead of the whole object.
    pub diff_template_contents: bool,
}

impl TemplateSpec {
    /// Create a template spec with the given contents.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            readonly: true,
            contents: contents.into(),
            diff_template_contents: true,
        }
    }
}

impl ResourceSpec for TemplateSpec {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Templates
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(&self) -> RebarResult<Map<String, Value>> {
        let mut payload = skeleton(self.kind());
        payload.insert("ID".into(), Value::String(self.name.clone()));
        payload.insert("Description".into(), Value::String(self.description.clone()));
        payload.insert("ReadOnly".into(), Value::Bool(self.readonly));
        payload.insert("Contents".into(), Value::String(self.contents.clone()));
        Ok(payload)
    }

    fn present_diff(&self, diff: ObjectDiff) -> ObjectDiff {
        // The most important piece of a template is its contents: either
        // narrow the diff down to that field, or hide it so the rest of
        // the object diffs cleanly. A missing prior object degrades to
        // null on the narrowed side.
        if self.diff_template_contents {
            let narrow = |side: &Value| match side {
                Value::Object(map) => map.get("Contents").cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            };
            ObjectDiff {
                before: narrow(&diff.before),
                after: narrow(&diff.after),
            }
        } else {
            let mut diff = diff;
            for side in [&mut diff.before, &mut diff.after] {
                if let Value::Object(map) = side {
                    map.insert(
                        "Contents".into(),
                        Value::String(CONTENTS_PLACEHOLDER.to_string()),
                    );
                }
            }
            diff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn subnet_spec() -> SubnetSpec {
        SubnetSpec {
            name: "provision".to_string(),
            description: String::new(),
            enabled: true,
            active_start: "10.0.0.10".to_string(),
            active_end: "10.0.0.25".to_string(),
            active_lease_time: 8600,
            reserved_lease_time: 21600,
            network: "10.0.0.0".to_string(),
            netmask: "255.255.255.0".to_string(),
            gateway: "10.0.0.1".to_string(),
            dns_server: "10.0.0.200".to_string(),
            domain_name: "provision.lan".to_string(),
        }
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in ResourceKind::all() {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), *kind);
        }
        assert!("machines".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_param_payload() {
        let mut spec = ParamSpec::new("blue-param", object(json!({"type": "string"})));
        spec.meta = object(json!({"color": "blue"}));
        let payload = spec.build_payload().unwrap();

        assert_eq!(payload["Name"], "blue-param");
        assert_eq!(payload["Secure"], false);
        assert_eq!(payload["ReadOnly"], false);
        assert_eq!(payload["Schema"]["type"], "string");
        assert_eq!(payload["Meta"]["color"], "blue");
    }

    #[test]
    fn test_secure_param_exposes_schema_secrets() {
        let mut spec = ParamSpec::new(
            "secure-param",
            object(json!({"type": "string", "default": "s3cr3t"})),
        );
        spec.secure = true;
        assert_eq!(spec.secret_values(), vec!["s3cr3t".to_string()]);

        spec.secure = false;
        assert!(spec.secret_values().is_empty());
    }

    #[test]
    fn test_profile_payload() {
        let spec = ProfileSpec::new("web", object(json!({"ntp/servers": ["10.0.0.5"]})));
        let payload = spec.build_payload().unwrap();
        assert_eq!(payload["Name"], "web");
        assert_eq!(payload["Partial"], false);
        assert_eq!(payload["Params"]["ntp/servers"][0], "10.0.0.5");
    }

    #[test]
    fn test_subnet_derivation() {
        let payload = subnet_spec().build_payload().unwrap();

        assert_eq!(payload["Subnet"], "10.0.0.0/24");
        let options = payload["Options"].as_array().unwrap();
        assert_eq!(options[0], json!({"Code": 3, "Value": "10.0.0.1"}));
        assert_eq!(options[1], json!({"Code": 6, "Value": "10.0.0.200"}));
        assert_eq!(options[2], json!({"Code": 15, "Value": "provision.lan"}));
        assert_eq!(options[3], json!({"Code": 1, "Value": "255.255.255.0"}));
        assert_eq!(options[4], json!({"Code": 28, "Value": "10.0.0.255"}));
    }

    #[test]
    fn test_subnet_rejects_malformed_input() {
        let mut spec = subnet_spec();
        spec.netmask = "255.255.0.255".to_string();
        assert!(matches!(
            spec.build_payload(),
            Err(RebarError::Validation { .. })
        ));

        let mut spec = subnet_spec();
        spec.network = "not-an-address".to_string();
        assert!(spec.build_payload().is_err());

        // Host bits set: 10.0.0.5/24 is not a network address.
        let mut spec = subnet_spec();
        spec.network = "10.0.0.5".to_string();
        assert!(spec.build_payload().is_err());
    }

    #[test]
    fn test_task_template_defaulting() {
        let spec = TaskSpec::new(
            "droopy-task",
            vec![object(json!({
                "Name": "step1.tmpl",
                "Contents": "echo hello",
                "Path": "/custom/path",
            }))],
        );
        let payload = spec.build_payload().unwrap();
        let entry = &payload["Templates"][0];

        // Supplied values are kept, omitted ones get defaults.
        assert_eq!(entry["Path"], "/custom/path");
        assert_eq!(entry["ID"], "");
        assert_eq!(entry["Link"], "");
        assert_eq!(entry["Meta"], json!({}));
        assert_eq!(entry["Contents"], "echo hello");
    }

    #[test]
    fn test_task_default_local_ignores() {
        let spec = TaskSpec::new("t", Vec::new());
        let ignore = spec.default_ignore_keys();
        assert!(ignore.local.contains(&"ExtraClaims".to_string()));
        assert!(ignore.local.contains(&"Meta".to_string()));
        assert!(ignore.remote.contains(&"CreatedAt".to_string()));
    }

    #[test]
    fn test_template_payload_uses_id() {
        let spec = TemplateSpec::new("call_script.tmpl", "#!/bin/sh\necho hi");
        let payload = spec.build_payload().unwrap();
        assert_eq!(payload["ID"], "call_script.tmpl");
        assert_eq!(payload["Contents"], "#!/bin/sh\necho hi");
    }

    #[test]
    fn test_template_diff_narrowed_to_contents() {
        let spec = TemplateSpec::new("t.tmpl", "new");
        let diff = ObjectDiff {
            before: json!({"ID": "t.tmpl", "Contents": "old"}),
            after: json!({"ID": "t.tmpl", "Contents": "new"}),
        };
        let narrowed = spec.present_diff(diff);
        assert_eq!(narrowed.before, "old");
        assert_eq!(narrowed.after, "new");
    }

    #[test]
    fn test_template_diff_narrowing_deletion() {
        let spec = TemplateSpec::new("t.tmpl", "abc");
        let diff = ObjectDiff {
            before: json!({"ID": "t.tmpl", "Contents": "abc"}),
            after: Value::Null,
        };
        let narrowed = spec.present_diff(diff);
        assert_eq!(narrowed.before, "abc");
        assert_eq!(narrowed.after, Value::Null);
    }

    #[test]
    fn test_template_diff_narrowing_creation() {
        let spec = TemplateSpec::new("t.tmpl", "abc");
        let diff = ObjectDiff {
            before: Value::Null,
            after: json!({"ID": "t.tmpl", "Contents": "abc"}),
        };
        let narrowed = spec.present_diff(diff);
        assert_eq!(narrowed.before, Value::Null);
        assert_eq!(narrowed.after, "abc");
    }

    #[test]
    fn test_template_object_diff_hides_contents() {
        let mut spec = TemplateSpec::new("t.tmpl", "new");
        spec.diff_template_contents = false;
        let diff = ObjectDiff {
            before: Value::Null,
            after: json!({"ID": "t.tmpl", "Contents": "new", "Description": "d"}),
        };
        let presented = spec.present_diff(diff);
        // A missing prior object stays null instead of erroring.
        assert_eq!(presented.before, Value::Null);
        assert_eq!(presented.after["Contents"], CONTENTS_PLACEHOLDER);
        assert_eq!(presented.after["Description"], "d");
    }
}
