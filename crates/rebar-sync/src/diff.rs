//! Field-level diff computation between desired and remote objects.
//!
//! Both sides are filtered through independent ignore lists before
//! comparison: `remote` drops server-computed fields (audit stamps and the
//! like), `local` drops desired-side fields that should not participate.
//! A field present only on the remote side and not ignored counts toward
//! inequality; callers are expected to grow the remote list rather than let
//! comparisons drift.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-computed fields excluded from comparison unless overridden.
pub const DEFAULT_IGNORE_REMOTE_KEYS: [&str; 4] =
    ["CreatedAt", "CreatedBy", "LastModifiedAt", "LastModifiedBy"];

/// Keys excluded from comparison, split by origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreKeys {
    /// Fields computed by the server.
    pub remote: Vec<String>,

    /// Desired-side fields that should not participate in comparison.
    pub local: Vec<String>,
}

impl Default for IgnoreKeys {
    fn default() -> Self {
        Self {
            remote: DEFAULT_IGNORE_REMOTE_KEYS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            local: Vec::new(),
        }
    }
}

impl IgnoreKeys {
    /// Ignore nothing on either side.
    #[must_use]
    pub fn none() -> Self {
        Self {
            remote: Vec::new(),
            local: Vec::new(),
        }
    }

    /// Replace the remote-origin list.
    #[must_use]
    pub fn with_remote(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.remote = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the local-origin list.
    #[must_use]
    pub fn with_local(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.local = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Before/after pair describing a reconciliation outcome.
///
/// Each side is `null` when the object does not exist on that side of the
/// operation (creation has a null `before`, deletion a null `after`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDiff {
    pub before: Value,
    pub after: Value,
}

fn filtered(object: &Map<String, Value>, ignore: &[String]) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| !ignore.iter().any(|i| i == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Compare a desired object against the remotely-observed one.
///
/// Returns whether a mutating call is needed to make the remote side match,
/// plus the before/after pair with ignored fields removed from both sides.
/// `desired = None` expresses deletion intent; `remote = None` means the
/// object does not exist yet.
pub fn diff_objects(
    desired: Option<&Map<String, Value>>,
    remote: Option<&Map<String, Value>>,
    ignore: &IgnoreKeys,
) -> (bool, ObjectDiff) {
    let filtered_remote = remote.map(|r| filtered(r, &ignore.remote));
    let filtered_desired = desired.map(|d| filtered(d, &ignore.local));

    match (filtered_desired, filtered_remote) {
        // Deletion intent: changed iff the object exists.
        (None, remote) => {
            let changed = remote.is_some();
            (
                changed,
                ObjectDiff {
                    before: remote.map_or(Value::Null, Value::Object),
                    after: Value::Null,
                },
            )
        }
        // Creation: the object does not exist yet.
        (Some(desired), None) => (
            true,
            ObjectDiff {
                before: Value::Null,
                after: Value::Object(desired),
            },
        ),
        (Some(desired), Some(remote)) => {
            if desired == remote {
                (
                    false,
                    ObjectDiff {
                        before: Value::Object(remote.clone()),
                        after: Value::Object(remote),
                    },
                )
            } else {
                (
                    true,
                    ObjectDiff {
                        before: Value::Object(remote),
                        after: Value::Object(desired),
                    },
                )
            }
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

    #[test]
    fn test_equal_objects_are_unchanged() {
        let desired = object(json!({"Name": "p1", "Description": "d"}));
        let remote = object(json!({"Name": "p1", "Description": "d", "CreatedAt": "2024-01-01"}));

        let (changed, diff) = diff_objects(Some(&desired), Some(&remote), &IgnoreKeys::default());
        assert!(!changed);
        assert_eq!(diff.before, diff.after);
    }

    #[test]
    fn test_field_change_is_detected() {
        let desired = object(json!({"Name": "p1", "Description": "new"}));
        let remote = object(json!({"Name": "p1", "Description": "old"}));

        let (changed, diff) = diff_objects(Some(&desired), Some(&remote), &IgnoreKeys::default());
        assert!(changed);
        assert_eq!(diff.before["Description"], "old");
        assert_eq!(diff.after["Description"], "new");
    }

    #[test]
    fn test_remote_only_field_counts_as_change() {
        let desired = object(json!({"Name": "p1"}));
        let remote = object(json!({"Name": "p1", "Endpoint": "drp-1"}));

        let (changed, _) = diff_objects(Some(&desired), Some(&remote), &IgnoreKeys::default());
        assert!(changed);

        // Adding the field to the remote ignore list flips the comparison.
        let ignore = IgnoreKeys::default().with_remote(
            DEFAULT_IGNORE_REMOTE_KEYS
                .iter()
                .copied()
                .chain(["Endpoint"]),
        );
        let (changed, _) = diff_objects(Some(&desired), Some(&remote), &ignore);
        assert!(!changed);
    }

    #[test]
    fn test_local_ignore_list_filters_desired_side() {
        let desired = object(json!({"Name": "t1", "Meta": {"color": "blue"}}));
        let remote = object(json!({"Name": "t1"}));

        let ignore = IgnoreKeys::none().with_local(["Meta"]);
        let (changed, diff) = diff_objects(Some(&desired), Some(&remote), &ignore);
        assert!(!changed);
        assert!(diff.after.get("Meta").is_none());
    }

    #[test]
    fn test_creation_has_null_before() {
        let desired = object(json!({"Name": "p1"}));

        let (changed, diff) = diff_objects(Some(&desired), None, &IgnoreKeys::default());
        assert!(changed);
        assert_eq!(diff.before, Value::Null);
        assert_eq!(diff.after["Name"], "p1");
    }

    #[test]
    fn test_deletion_has_null_after() {
        let remote = object(json!({"Name": "p1", "CreatedAt": "2024-01-01"}));

        let (changed, diff) = diff_objects(None, Some(&remote), &IgnoreKeys::default());
        assert!(changed);
        assert_eq!(diff.after, Value::Null);
        // Ignored remote fields are filtered from the before side too.
        assert!(diff.before.get("CreatedAt").is_none());

        let (changed, diff) = diff_objects(None, None, &IgnoreKeys::default());
        assert!(!changed);
        assert_eq!(diff.before, Value::Null);
        assert_eq!(diff.after, Value::Null);
    }

    #[test]
    fn test_nested_structures_compare_recursively() {
        let desired = object(json!({"Params": {"a": [1, 2, {"b": true}]}}));
        let remote = object(json!({"Params": {"a": [1, 2, {"b": true}]}}));
        let (changed, _) = diff_objects(Some(&desired), Some(&remote), &IgnoreKeys::none());
        assert!(!changed);

        let remote = object(json!({"Params": {"a": [1, 2, {"b": false}]}}));
        let (changed, _) = diff_objects(Some(&desired), Some(&remote), &IgnoreKeys::none());
        assert!(changed);
    }
}
