//! Sync configuration model
//!
//! The configuration file is read and schema-checked by the caller; this
//! module only gives the validated document a typed shape. Every glob-keyed
//! table keeps the order rules were written in, since rules from several
//! matching patterns are merged in encounter order.

use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_indent() -> usize {
    2
}

/// Sort direction of an array sort rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Replace the value at `path` with `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedValueRule {
    pub path: String,
    pub value: Value,
}

/// Sort the array at `path` by the field `sort_by` of its items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySortRule {
    pub path: String,
    pub sort_by: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// Output formatting applied to written YAML files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFormat {
    /// Indentation width of rendered YAML
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Separate top-level keys with a blank line
    #[serde(default)]
    pub key_separator: bool,

    /// Glob -> key paths, in the order keys should appear
    ///
    /// `spec.template.metadata` puts `metadata` in the listed position among
    /// the keys of `spec.template`.
    #[serde(default)]
    pub key_orders: IndexMap<String, Vec<String>>,

    /// Glob -> array sort rules
    #[serde(default)]
    pub array_sort: IndexMap<String, Vec<ArraySortRule>>,

    /// Glob -> paths whose scalar values are always double-quoted
    #[serde(default)]
    pub quote_values: IndexMap<String, Vec<String>>,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            key_separator: false,
            key_orders: IndexMap::new(),
            array_sort: IndexMap::new(),
            quote_values: IndexMap::new(),
        }
    }
}

/// Validated sync configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Files never synchronized
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Glob -> paths left untouched in matching files
    #[serde(default)]
    pub skip_path: IndexMap<String, Vec<String>>,

    /// Glob -> validation rules, interpreted by the stop-rule validator
    #[serde(default)]
    pub stop_rules: IndexMap<String, Vec<Value>>,

    /// Glob -> values forced in matching files
    #[serde(default)]
    pub fixed_values: IndexMap<String, Vec<FixedValueRule>>,

    #[serde(default)]
    pub output_format: Option<OutputFormat>,
}

impl SyncConfig {
    /// Parse a configuration from YAML content
    ///
    /// # Example
    ///
    /// ```
    /// use envsync_core::config::SyncConfig;
    ///
    /// let config = SyncConfig::parse(r#"
    /// exclude:
    ///   - "**/secrets.yaml"
    /// fixedValues:
    ///   "**/values.yaml":
    ///     - path: image.tag
    ///       value: stable
    /// "#).unwrap();
    ///
    /// assert_eq!(config.exclude, vec!["**/secrets.yaml"]);
    /// assert_eq!(config.fixed_values["**/values.yaml"][0].path, "image.tag");
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| Error::config_parse(e.to_string()))
    }
}
