//! Array change detection between two versions of a document
//!
//! Every array in the source document is located, and where the destination
//! holds an array at the same path the two are compared as multisets of
//! normalized items. Item position is ignored; duplicates are counted.

use crate::path::{PathExpression, PathSegment, get_value_at_path};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use tracing::debug;

/// Changes to the array found at one path
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayChange {
    pub path: PathExpression,
    /// Items only present in the destination, in destination order
    pub added: Vec<Value>,
    /// Items only present in the source, in source order
    pub removed: Vec<Value>,
    /// Items present in both, in source order
    pub unchanged: Vec<Value>,
}

impl ArrayChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Result of comparing the arrays of two documents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeInfo {
    /// Either document contains at least one array
    pub has_arrays: bool,
    /// At least one array differs
    pub has_changes: bool,
    /// Every array path of the source document
    pub array_paths: Vec<PathExpression>,
    pub changes: Vec<ArrayChange>,
}

impl ChangeInfo {
    /// Find the change recorded for `path`, if any.
    pub fn change_at(&self, path: &PathExpression) -> Option<&ArrayChange> {
        self.changes.iter().find(|change| &change.path == path)
    }
}

/// Compare the arrays of `source` and `destination`.
///
/// Array paths are discovered from the source only. A path is reported when
/// both sides hold an array there and the normalized arrays differ.
///
/// # Examples
///
/// ```
/// use envsync_core::diff::detect_array_changes;
/// use serde_json::json;
///
/// let source = json!({"hosts": ["a", "b"]});
/// let destination = json!({"hosts": ["b", "c"]});
/// let info = detect_array_changes(&source, &destination);
///
/// assert!(info.has_changes);
/// assert_eq!(info.changes[0].added, vec![json!("c")]);
/// assert_eq!(info.changes[0].removed, vec![json!("a")]);
/// assert_eq!(info.changes[0].unchanged, vec![json!("b")]);
/// ```
pub fn detect_array_changes(source: &Value, destination: &Value) -> ChangeInfo {
    let array_paths = find_array_paths(source);
    let mut changes = Vec::new();

    for path in &array_paths {
        let (Some(Value::Array(src)), Some(Value::Array(dst))) = (
            get_value_at_path(source, path),
            get_value_at_path(destination, path),
        ) else {
            continue;
        };

        let src: Vec<Value> = src.iter().map(normalize_value).collect();
        let dst: Vec<Value> = dst.iter().map(normalize_value).collect();
        if src == dst {
            continue;
        }

        let change = diff_items(path.clone(), src, dst);
        debug!(
            path = %change.path,
            added = change.added.len(),
            removed = change.removed.len(),
            "Array changed"
        );
        changes.push(change);
    }

    ChangeInfo {
        has_arrays: contains_array(source) || contains_array(destination),
        has_changes: !changes.is_empty(),
        array_paths,
        changes,
    }
}

fn diff_items(path: PathExpression, source: Vec<Value>, destination: Vec<Value>) -> ArrayChange {
    let source_keys: Vec<String> = source.iter().map(canonical_text).collect();
    let destination_keys: Vec<String> = destination.iter().map(canonical_text).collect();

    let mut available = count_keys(&source_keys);
    let mut added = Vec::new();
    for (item, key) in destination.into_iter().zip(&destination_keys) {
        match available.get_mut(key.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => added.push(item),
        }
    }

    let mut available = count_keys(&destination_keys);
    let mut removed = Vec::new();
    let mut unchanged = Vec::new();
    for (item, key) in source.into_iter().zip(&source_keys) {
        match available.get_mut(key.as_str()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                unchanged.push(item);
            }
            _ => removed.push(item),
        }
    }

    ArrayChange {
        path,
        added,
        removed,
        unchanged,
    }
}

fn count_keys(keys: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for key in keys {
        *counts.entry(key.as_str()).or_insert(0) += 1;
    }
    counts
}

fn canonical_text(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Normalize a value for comparison.
///
/// Mapping keys are sorted recursively and floats without a fractional part
/// become integers, so `1.0` and `1` compare equal.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let normalized: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect();
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::Number(n) => Value::Number(normalize_number(n)),
        other => other.clone(),
    }
}

fn normalize_number(n: &Number) -> Number {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                return Number::from(f as i64);
            }
        }
    }
    n.clone()
}

/// Every path in `value` that holds an array, in document order.
///
/// Nested arrays are included; the root itself is reported as the empty path
/// when it is an array.
pub fn find_array_paths(value: &Value) -> Vec<PathExpression> {
    let mut paths = Vec::new();
    collect_array_paths(value, &PathExpression::root(), &mut paths);
    paths
}

fn collect_array_paths(value: &Value, current: &PathExpression, paths: &mut Vec<PathExpression>) {
    match value {
        Value::Array(items) => {
            paths.push(current.clone());
            for (index, item) in items.iter().enumerate() {
                collect_array_paths(item, &current.child(PathSegment::Index(index)), paths);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                collect_array_paths(child, &current.child(PathSegment::Key(key.clone())), paths);
            }
        }
        _ => {}
    }
}

/// Check whether `value` contains an array anywhere, itself included.
pub fn contains_array(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(map) => map.values().any(contains_array),
        _ => false,
    }
}
