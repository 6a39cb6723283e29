//! Application of glob-scoped sync rules to parsed documents

use crate::config::FixedValueRule;
use crate::glob::GlobCache;
use crate::path::{PathCache, remove_value_at_path, set_value_at_path};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

/// Caches shared by every rule applied during one pipeline run
#[derive(Debug, Default, Clone)]
pub struct RuleContext {
    pub globs: GlobCache,
    pub paths: PathCache,
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `file` matches any exclusion pattern.
    pub fn is_excluded(&mut self, file: &str, exclude: &[String]) -> bool {
        self.globs.is_match_any(file, exclude)
    }

    /// Apply every fixed value whose pattern matches `file`.
    ///
    /// Returns the number of rules that wrote at least one value. Rules whose
    /// path does not resolve in the document are skipped.
    pub fn apply_fixed_values(
        &mut self,
        document: &mut Value,
        file: &str,
        fixed_values: &IndexMap<String, Vec<FixedValueRule>>,
    ) -> usize {
        let mut applied = 0;
        for (pattern, rules) in fixed_values {
            if !self.globs.is_match(file, pattern) {
                continue;
            }
            for rule in rules {
                let path = self.paths.parse(&rule.path);
                if set_value_at_path(document, path, rule.value.clone()) {
                    applied += 1;
                } else {
                    debug!(file, path = %rule.path, "Fixed value path not found");
                }
            }
        }
        applied
    }

    /// Remove every skip path whose pattern matches `file`.
    ///
    /// Returns the number of paths that removed something.
    pub fn apply_skip_paths(
        &mut self,
        document: &mut Value,
        file: &str,
        skip_path: &IndexMap<String, Vec<String>>,
    ) -> usize {
        let mut removed = 0;
        for (pattern, paths) in skip_path {
            if !self.globs.is_match(file, pattern) {
                continue;
            }
            for raw in paths {
                let path = self.paths.parse(raw);
                if remove_value_at_path(document, path) {
                    removed += 1;
                } else {
                    debug!(file, path = %raw, "Skip path not found");
                }
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.globs.clear();
        self.paths.clear();
    }
}
