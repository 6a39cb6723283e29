//! Glob matching of relative file paths
//!
//! Patterns come from the sync configuration (`exclude`, `skipPath`,
//! `fixedValues`, `outputFormat` keys) and are matched against paths relative
//! to the source or destination tree. `*` and `?` stay within one directory,
//! `**` spans directories.

use globset::{GlobBuilder, GlobMatcher};
use std::collections::HashMap;
use tracing::debug;

/// A compiled pattern
///
/// Patterns globset rejects (an unclosed `[` or `{`, for instance) compile to
/// a literal matcher that only accepts the pattern text itself.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    Glob(GlobMatcher),
    Literal(String),
}

impl CompiledPattern {
    pub fn compile(pattern: &str) -> Self {
        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => Self::Glob(glob.compile_matcher()),
            Err(err) => {
                debug!(pattern, error = %err, "Invalid glob, matching literally");
                Self::Literal(pattern.replace('\\', "/"))
            }
        }
    }

    /// Match a relative path; backslashes are treated as separators.
    pub fn is_match(&self, path: &str) -> bool {
        let normalized = normalize_path(path);
        match self {
            Self::Glob(matcher) => matcher.is_match(normalized.as_str()),
            Self::Literal(text) => normalized == *text,
        }
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Compiled patterns keyed by pattern text
///
/// Create one per pipeline run; each distinct pattern is compiled once.
#[derive(Debug, Default, Clone)]
pub struct GlobCache {
    compiled: HashMap<String, CompiledPattern>,
}

impl GlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern`, or return the cached compilation.
    pub fn compile(&mut self, pattern: &str) -> &CompiledPattern {
        self.compiled
            .entry(pattern.to_string())
            .or_insert_with(|| CompiledPattern::compile(pattern))
    }

    /// Check whether `path` matches `pattern`.
    pub fn is_match(&mut self, path: &str, pattern: &str) -> bool {
        self.compile(pattern).is_match(path)
    }

    /// Check whether `path` matches any of `patterns`.
    pub fn is_match_any<S: AsRef<str>>(&mut self, path: &str, patterns: &[S]) -> bool {
        patterns
            .iter()
            .any(|pattern| self.is_match(path, pattern.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn clear(&mut self) {
        self.compiled.clear();
    }
}
