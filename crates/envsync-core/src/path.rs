//! Path expression parsing and traversal
//!
//! Paths address values inside a parsed document (`serde_json::Value`). They
//! are authored in sync rules against documents whose shape is only partly
//! known, so every lookup or write that cannot be applied degrades to `None`
//! or `false` instead of an error.
//!
//! # Path Syntax
//!
//! - Dot-separated keys: `image.repository`
//! - Array indexing: `containers[0].name` or `containers.0.name`
//! - Wildcards: `containers[*].image` or `containers.*.image`
//! - Filters: `env[name=LOG_LEVEL].value`, with `^=` (starts with), `$=`
//!   (ends with) and `*=` (contains) as further operators
//! - Quoting: `annotations."app.kubernetes.io/name"`, `env[name="a.b"]`
//!
//! # Examples
//!
//! ```
//! use envsync_core::path::{parse_path, get_value_at_path, PathSegment};
//! use serde_json::json;
//!
//! let path = parse_path("a[0].b[*]");
//! assert_eq!(path.segments(), &[
//!     PathSegment::Key("a".to_string()),
//!     PathSegment::Index(0),
//!     PathSegment::Key("b".to_string()),
//!     PathSegment::Wildcard,
//! ]);
//!
//! let value = json!({"env": [{"name": "LOG_LEVEL", "value": "debug"}]});
//! let path = parse_path("env[name=LOG_LEVEL].value");
//! assert_eq!(get_value_at_path(&value, &path), Some(&json!("debug")));
//! ```

use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::LazyLock;

/// Matches the inside of a filter bracket: `property`, operator, value.
static FILTER_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^([^\[\]=^$*"]+?)(\^=|\$=|\*=|=)(.*)$"#).unwrap()
});

/// Comparison applied by a filter segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// `=`
    Eq,
    /// `^=`
    StartsWith,
    /// `$=`
    EndsWith,
    /// `*=`
    Contains,
}

impl FilterOperator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "^=" => Some(Self::StartsWith),
            "$=" => Some(Self::EndsWith),
            "*=" => Some(Self::Contains),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::StartsWith => "^=",
            Self::EndsWith => "$=",
            Self::Contains => "*=",
        }
    }

    /// Apply the comparison to a candidate's text form.
    pub fn apply(self, candidate: &str, expected: &str) -> bool {
        match self {
            Self::Eq => candidate == expected,
            Self::StartsWith => candidate.starts_with(expected),
            Self::EndsWith => candidate.ends_with(expected),
            Self::Contains => candidate.contains(expected),
        }
    }
}

/// Predicate selecting sequence items by one of their properties
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterSpec {
    pub property: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl FilterSpec {
    pub fn new(
        property: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }
}

/// A segment of a path expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A key in a mapping (e.g., "image" in "image.tag")
    Key(String),
    /// An index in a sequence (e.g., 0 in `containers[0]`)
    Index(usize),
    /// Any child (`[*]` or `*`)
    Wildcard,
    /// Sequence items matching a predicate (e.g., `env[name=PORT]`)
    Filter(FilterSpec),
}

/// A parsed path; the empty expression denotes the root value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathExpression {
    segments: Vec<PathSegment>,
}

impl PathExpression {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<PathSegment> {
        self.segments
    }

    /// Return a new expression with `segment` appended.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// True when every segment is a plain key.
    pub fn is_key_path(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, PathSegment::Key(_)))
    }
}

impl Deref for PathExpression {
    type Target = [PathSegment];

    fn deref(&self) -> &Self::Target {
        &self.segments
    }
}

impl From<Vec<PathSegment>> for PathExpression {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

impl FromIterator<PathSegment> for PathExpression {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

fn needs_key_quotes(key: &str) -> bool {
    key.is_empty()
        || key == "*"
        || key.bytes().all(|b| b.is_ascii_digit())
        || key.contains(['.', '[', ']', '"'])
}

fn needs_value_quotes(value: &str) -> bool {
    value.contains(['.', '[', ']'])
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) if needs_key_quotes(key) => write!(f, "\"{key}\""),
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Wildcard => f.write_str("[*]"),
            Self::Filter(filter) if needs_value_quotes(&filter.value) => write!(
                f,
                "[{}{}\"{}\"]",
                filter.property,
                filter.operator.symbol(),
                filter.value
            ),
            Self::Filter(filter) => write!(
                f,
                "[{}{}{}]",
                filter.property,
                filter.operator.symbol(),
                filter.value
            ),
        }
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && matches!(segment, PathSegment::Key(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Memoizes parsed path expressions by their raw text.
///
/// Owned by the caller for the duration of a pipeline run.
#[derive(Debug, Default, Clone)]
pub struct PathCache {
    parsed: HashMap<String, PathExpression>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw`, reusing an earlier result for the same text.
    pub fn parse(&mut self, raw: &str) -> &PathExpression {
        self.parsed
            .entry(raw.to_string())
            .or_insert_with(|| parse_path(raw))
    }

    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }

    pub fn clear(&mut self) {
        self.parsed.clear();
    }
}

/// Parse a path string into a [`PathExpression`].
///
/// Parsing never fails: bracket content that is neither an index, a wildcard,
/// a filter nor a quoted key stays in the key text literally, and empty
/// segments from leading, trailing or repeated dots are dropped.
///
/// # Examples
///
/// ```
/// use envsync_core::path::{parse_path, PathSegment};
///
/// let path = parse_path("containers.0.ports[*]");
/// assert_eq!(path.segments(), &[
///     PathSegment::Key("containers".to_string()),
///     PathSegment::Index(0),
///     PathSegment::Key("ports".to_string()),
///     PathSegment::Wildcard,
/// ]);
/// ```
pub fn parse_path(raw: &str) -> PathExpression {
    let chars: Vec<char> = raw.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' => {
                if let Some(end) = find_closing_quote(&chars, i + 1) {
                    current.extend(&chars[i + 1..end]);
                    quoted = true;
                    i = end + 1;
                    continue;
                }
                current.push(ch);
            }
            '.' => flush_segment(&mut segments, &mut current, &mut quoted),
            '[' => {
                if let Some(end) = find_closing_bracket(&chars, i + 1) {
                    let body: String = chars[i + 1..end].iter().collect();
                    match parse_bracket(&body) {
                        Some(segment) => {
                            flush_segment(&mut segments, &mut current, &mut quoted);
                            segments.push(segment);
                        }
                        None => {
                            current.push('[');
                            current.push_str(&body);
                            current.push(']');
                        }
                    }
                    i = end + 1;
                    continue;
                }
                current.push(ch);
            }
            _ => current.push(ch),
        }
        i += 1;
    }
    flush_segment(&mut segments, &mut current, &mut quoted);

    PathExpression { segments }
}

fn flush_segment(segments: &mut Vec<PathSegment>, current: &mut String, quoted: &mut bool) {
    let text = std::mem::take(current);
    let was_quoted = std::mem::replace(quoted, false);
    if text.is_empty() {
        return;
    }
    if was_quoted {
        segments.push(PathSegment::Key(text));
    } else if text == "*" {
        segments.push(PathSegment::Wildcard);
    } else if let Some(index) = parse_index(&text) {
        segments.push(PathSegment::Index(index));
    } else {
        segments.push(PathSegment::Key(text));
    }
}

fn parse_index(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn find_closing_quote(chars: &[char], from: usize) -> Option<usize> {
    chars[from..]
        .iter()
        .position(|&c| c == '"')
        .map(|offset| from + offset)
}

fn find_closing_bracket(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            ']' => return Some(i),
            '"' => match find_closing_quote(chars, i + 1) {
                Some(end) => i = end,
                None => return None,
            },
            _ => {}
        }
        i += 1;
    }
    None
}

fn parse_bracket(body: &str) -> Option<PathSegment> {
    if body == "*" {
        return Some(PathSegment::Wildcard);
    }
    if let Some(index) = parse_index(body) {
        return Some(PathSegment::Index(index));
    }
    if let Some(filter) = parse_filter_body(body) {
        return Some(PathSegment::Filter(filter));
    }
    unquote(body).map(|key| PathSegment::Key(key.to_string()))
}

fn unquote(text: &str) -> Option<&str> {
    text.strip_prefix('"')?.strip_suffix('"')
}

fn parse_filter_body(body: &str) -> Option<FilterSpec> {
    let caps = FILTER_BODY.captures(body)?;
    let property = caps.get(1)?.as_str().trim();
    if property.is_empty() {
        return None;
    }
    let operator = FilterOperator::from_symbol(caps.get(2)?.as_str())?;
    let raw_value = caps.get(3)?.as_str();
    let value = match unquote(raw_value) {
        Some(inner) if raw_value.len() >= 2 => inner,
        _ => raw_value,
    };
    Some(FilterSpec::new(property, operator, value))
}

/// Check whether a bracketed segment such as `[name=PORT]` is a filter.
pub fn is_filter_segment(segment: &str) -> bool {
    parse_filter_segment(segment).is_some()
}

/// Parse a bracketed filter segment such as `[name^=LOG]`.
///
/// Returns `None` for anything that is not a well-formed filter, including
/// brackets without an operator or without a property name.
pub fn parse_filter_segment(segment: &str) -> Option<FilterSpec> {
    let body = segment.trim().strip_prefix('[')?.strip_suffix(']')?;
    parse_filter_body(body)
}

/// Text form of a scalar used for filter comparison.
fn filter_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null => Some(Cow::Borrowed("null")),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Check whether `candidate` satisfies `filter`.
///
/// The candidate must be a mapping whose named property holds a scalar.
pub fn matches_filter(candidate: &Value, filter: &FilterSpec) -> bool {
    let Value::Object(map) = candidate else {
        return false;
    };
    map.get(&filter.property)
        .and_then(filter_text)
        .is_some_and(|text| filter.operator.apply(&text, &filter.value))
}

fn has_children(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}

fn children(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

fn children_mut(value: &mut Value) -> Vec<&mut Value> {
    match value {
        Value::Array(items) => items.iter_mut().collect(),
        Value::Object(map) => map.values_mut().collect(),
        _ => Vec::new(),
    }
}

fn index_child_mut(value: &mut Value, index: usize) -> Option<&mut Value> {
    match value {
        Value::Array(items) => items.get_mut(index),
        Value::Object(map) => map.get_mut(&index.to_string()),
        _ => None,
    }
}

/// Get the value at a path.
///
/// A filter selects the first matching item only. A trailing wildcard is a
/// presence check: it yields the container itself when it has at least one
/// child.
///
/// # Examples
///
/// ```
/// use envsync_core::path::{parse_path, get_value_at_path};
/// use serde_json::json;
///
/// let value = json!({"image": {"tag": "1.2.0"}});
/// assert_eq!(get_value_at_path(&value, &parse_path("image.tag")), Some(&json!("1.2.0")));
/// assert_eq!(get_value_at_path(&value, &parse_path("image.digest")), None);
/// ```
pub fn get_value_at_path<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value);
    };

    match first {
        PathSegment::Key(key) => match value {
            Value::Object(map) => get_value_at_path(map.get(key)?, rest),
            _ => None,
        },
        PathSegment::Index(index) => {
            let next = match value {
                Value::Array(items) => items.get(*index)?,
                Value::Object(map) => map.get(&index.to_string())?,
                _ => return None,
            };
            get_value_at_path(next, rest)
        }
        PathSegment::Wildcard => {
            if rest.is_empty() {
                return has_children(value).then_some(value);
            }
            children(value)
                .into_iter()
                .find_map(|child| get_value_at_path(child, rest))
        }
        PathSegment::Filter(filter) => {
            let Value::Array(items) = value else {
                return None;
            };
            let item = items.iter().find(|item| matches_filter(item, filter))?;
            get_value_at_path(item, rest)
        }
    }
}

/// Set the value at a path, returning whether anything was written.
///
/// Intermediate containers are never created. A filter or wildcard in the
/// middle of the path applies the rest of the path to every matching child;
/// a final filter replaces every matching item.
///
/// # Examples
///
/// ```
/// use envsync_core::path::{parse_path, set_value_at_path};
/// use serde_json::json;
///
/// let mut value = json!({"env": [{"name": "A", "value": "1"}]});
/// assert!(set_value_at_path(&mut value, &parse_path("env[name=A].value"), json!("2")));
/// assert_eq!(value, json!({"env": [{"name": "A", "value": "2"}]}));
///
/// assert!(!set_value_at_path(&mut value, &parse_path("missing.key"), json!(1)));
/// ```
pub fn set_value_at_path(value: &mut Value, segments: &[PathSegment], new_value: Value) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        *value = new_value;
        return true;
    };

    if rest.is_empty() {
        return set_child(value, first, new_value);
    }

    match first {
        PathSegment::Key(key) => match value {
            Value::Object(map) => map
                .get_mut(key)
                .is_some_and(|next| set_value_at_path(next, rest, new_value)),
            _ => false,
        },
        PathSegment::Index(index) => index_child_mut(value, *index)
            .is_some_and(|next| set_value_at_path(next, rest, new_value)),
        PathSegment::Wildcard => {
            let mut applied = false;
            for child in children_mut(value) {
                applied |= set_value_at_path(child, rest, new_value.clone());
            }
            applied
        }
        PathSegment::Filter(filter) => {
            let Value::Array(items) = value else {
                return false;
            };
            let mut applied = false;
            for item in items.iter_mut() {
                if matches_filter(item, filter) {
                    applied |= set_value_at_path(item, rest, new_value.clone());
                }
            }
            applied
        }
    }
}

fn set_child(value: &mut Value, segment: &PathSegment, new_value: Value) -> bool {
    match (segment, value) {
        (PathSegment::Key(key), Value::Object(map)) => {
            map.insert(key.clone(), new_value);
            true
        }
        (PathSegment::Index(index), Value::Array(items)) => match items.get_mut(*index) {
            Some(slot) => {
                *slot = new_value;
                true
            }
            None => false,
        },
        (PathSegment::Index(index), Value::Object(map)) => {
            map.insert(index.to_string(), new_value);
            true
        }
        (PathSegment::Wildcard, Value::Array(items)) if !items.is_empty() => {
            for item in items.iter_mut() {
                *item = new_value.clone();
            }
            true
        }
        (PathSegment::Wildcard, Value::Object(map)) if !map.is_empty() => {
            for entry in map.values_mut() {
                *entry = new_value.clone();
            }
            true
        }
        (PathSegment::Filter(filter), Value::Array(items)) => {
            let mut matched = false;
            for item in items.iter_mut() {
                if matches_filter(item, filter) {
                    *item = new_value.clone();
                    matched = true;
                }
            }
            matched
        }
        _ => false,
    }
}

/// Remove the value at a path, returning whether anything was removed.
///
/// Navigation follows [`set_value_at_path`]. A final filter removes every
/// matching item and a final wildcard empties the container.
pub fn remove_value_at_path(value: &mut Value, segments: &[PathSegment]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };

    if rest.is_empty() {
        return remove_child(value, first);
    }

    match first {
        PathSegment::Key(key) => match value {
            Value::Object(map) => map
                .get_mut(key)
                .is_some_and(|next| remove_value_at_path(next, rest)),
            _ => false,
        },
        PathSegment::Index(index) => {
            index_child_mut(value, *index).is_some_and(|next| remove_value_at_path(next, rest))
        }
        PathSegment::Wildcard => {
            let mut removed = false;
            for child in children_mut(value) {
                removed |= remove_value_at_path(child, rest);
            }
            removed
        }
        PathSegment::Filter(filter) => {
            let Value::Array(items) = value else {
                return false;
            };
            let mut removed = false;
            for item in items.iter_mut() {
                if matches_filter(item, filter) {
                    removed |= remove_value_at_path(item, rest);
                }
            }
            removed
        }
    }
}

fn remove_child(value: &mut Value, segment: &PathSegment) -> bool {
    match (segment, value) {
        (PathSegment::Key(key), Value::Object(map)) => map.shift_remove(key).is_some(),
        (PathSegment::Index(index), Value::Array(items)) => {
            if *index < items.len() {
                items.remove(*index);
                true
            } else {
                false
            }
        }
        (PathSegment::Index(index), Value::Object(map)) => {
            map.shift_remove(&index.to_string()).is_some()
        }
        (PathSegment::Wildcard, Value::Array(items)) if !items.is_empty() => {
            items.clear();
            true
        }
        (PathSegment::Wildcard, Value::Object(map)) if !map.is_empty() => {
            map.clear();
            true
        }
        (PathSegment::Filter(filter), Value::Array(items)) => {
            let before = items.len();
            items.retain(|item| !matches_filter(item, filter));
            items.len() != before
        }
        _ => false,
    }
}
