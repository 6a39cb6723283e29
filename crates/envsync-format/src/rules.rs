//! Formatting rules resolved for one file

use envsync_core::config::{OutputFormat, SortOrder};
use envsync_core::glob::GlobCache;
use envsync_core::path::{PathExpression, parse_path};
use indexmap::IndexMap;

/// Sort the sequence at `path` by the field `sort_by` of its items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRule {
    pub path: PathExpression,
    pub sort_by: String,
    pub order: SortOrder,
}

/// Every formatting rule that applies to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingRuleSet {
    /// Dotted parent path -> keys in their wanted order; `""` is the root
    pub key_hierarchy: IndexMap<String, Vec<String>>,
    pub sort_rules: Vec<SortRule>,
    pub quote_paths: Vec<PathExpression>,
    pub indent: usize,
    pub key_separator: bool,
}

impl Default for FormattingRuleSet {
    fn default() -> Self {
        Self {
            key_hierarchy: IndexMap::new(),
            sort_rules: Vec::new(),
            quote_paths: Vec::new(),
            indent: 2,
            key_separator: false,
        }
    }
}

impl FormattingRuleSet {
    /// Collect the rules of every `outputFormat` pattern matching `file_path`.
    ///
    /// Rules are merged in the order the patterns appear in the
    /// configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use envsync_core::config::OutputFormat;
    /// use envsync_core::glob::GlobCache;
    /// use envsync_format::FormattingRuleSet;
    ///
    /// let mut output = OutputFormat::default();
    /// output.key_orders.insert("**/*.yaml".into(), vec!["apiVersion".into(), "metadata.name".into()]);
    ///
    /// let rules = FormattingRuleSet::for_file(&output, "apps/svc.yaml", &mut GlobCache::new());
    /// assert_eq!(rules.key_hierarchy[""], vec!["apiVersion"]);
    /// assert_eq!(rules.key_hierarchy["metadata"], vec!["name"]);
    /// ```
    pub fn for_file(output: &OutputFormat, file_path: &str, globs: &mut GlobCache) -> Self {
        let mut rules = Self {
            indent: output.indent,
            key_separator: output.key_separator,
            ..Self::default()
        };

        for (pattern, key_paths) in &output.key_orders {
            if globs.is_match(file_path, pattern) {
                for key_path in key_paths {
                    rules.register_key_path(key_path);
                }
            }
        }

        for (pattern, sorts) in &output.array_sort {
            if globs.is_match(file_path, pattern) {
                rules.sort_rules.extend(sorts.iter().map(|sort| SortRule {
                    path: parse_path(&sort.path),
                    sort_by: sort.sort_by.clone(),
                    order: sort.order,
                }));
            }
        }

        for (pattern, paths) in &output.quote_values {
            if globs.is_match(file_path, pattern) {
                rules
                    .quote_paths
                    .extend(paths.iter().map(|path| parse_path(path)));
            }
        }

        rules
    }

    /// Register `a.b.c` as key `c` of the mapping at `a.b`.
    pub fn register_key_path(&mut self, key_path: &str) {
        let (parent, key) = key_path.rsplit_once('.').unwrap_or(("", key_path));
        if key.is_empty() {
            return;
        }
        let keys = self.key_hierarchy.entry(parent.to_string()).or_default();
        if !keys.iter().any(|existing| existing == key) {
            keys.push(key.to_string());
        }
    }

    /// True when no structural rule is configured.
    pub fn is_empty(&self) -> bool {
        self.key_hierarchy.is_empty() && self.sort_rules.is_empty() && self.quote_paths.is_empty()
    }
}
