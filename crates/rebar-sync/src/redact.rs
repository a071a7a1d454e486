//! Content-based secret suppression for messages and diffs.
//!
//! Redaction matches registered literal values wherever they occur in
//! emitted text, not field paths. A secret that ends up nested in a
//! non-obvious field is still suppressed; renaming a field never leaks one.

use serde_json::{Map, Value};

/// Marker substituted for registered secret values.
pub const REDACTED: &str = "[REDACTED]";

/// Collects secret literals and scrubs them out of emitted values.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    values: Vec<String>,
}

impl Redactor {
    /// Create an empty redactor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a literal for unconditional suppression.
    ///
    /// Empty strings are skipped; they would match everywhere.
    pub fn register(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() && !self.values.contains(&value) {
            self.values.push(value);
        }
    }

    /// Register the secret values declared by a secure value-schema.
    pub fn register_schema_secrets(&mut self, schema: &Map<String, Value>) {
        for secret in schema_secrets(schema) {
            self.register(secret);
        }
    }

    /// Whether any literals are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every occurrence of a registered literal in `text`.
    #[must_use]
    pub fn scrub_str(&self, text: &str) -> String {
        let mut scrubbed = text.to_string();
        for value in &self.values {
            scrubbed = scrubbed.replace(value, REDACTED);
        }
        scrubbed
    }

    /// Walk a JSON value and scrub every string it contains.
    #[must_use]
    pub fn scrub_value(&self, value: Value) -> Value {
        if self.values.is_empty() {
            return value;
        }
        match value {
            Value::String(s) => Value::String(self.scrub_str(&s)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.scrub_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.scrub_value(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}

/// Extract the secret literals a secure value-schema declares.
///
/// A schema describing a single string value with a literal default hides
/// that default; any other shape hides every string literal the schema
/// carries, since an enumerated schema describes a set of acceptable secret
/// values.
#[must_use]
pub fn schema_secrets(schema: &Map<String, Value>) -> Vec<String> {
    let declares_string = schema.get("type").and_then(Value::as_str) == Some("string");
    if declares_string {
        if let Some(default) = schema.get("default").and_then(Value::as_str) {
            return vec![default.to_string()];
        }
    }

    let mut literals = Vec::new();
    for value in schema.values() {
        collect_string_literals(value, &mut literals);
    }
    literals
}

fn collect_string_literals(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if !s.is_empty() && !out.contains(s) {
                out.push(s.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_string_literals(item, out);
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                collect_string_literals(nested, out);
            }
        }
        _ => {}
    }
}
