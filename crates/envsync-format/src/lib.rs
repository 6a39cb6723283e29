//! Comment-preserving YAML formatting for envsync
//!
//! Documents are parsed into a [`StructuralDocument`], transformed according
//! to a [`FormattingRuleSet`] (key ordering, array sorting, value quoting,
//! multi-line preservation) and rendered back to text.

pub mod document;
pub mod error;
pub mod parser;
pub mod render;
pub mod rules;
pub mod separator;
pub mod transform;

pub use document::{
    Comments, Node, NodeKind, Pair, Scalar, ScalarKind, ScalarStyle, StructuralDocument,
};
pub use error::{ErrorCode, FormatError, Result};
pub use parser::ParseError;
pub use render::Renderer;
pub use rules::{FormattingRuleSet, SortRule};

use envsync_core::config::OutputFormat;
use envsync_core::glob::GlobCache;
use tracing::debug;

/// Format `text` with `rules`.
///
/// Without rules, or for blank text, the input is returned unchanged. On
/// failure nothing is returned but the error: unreadable input is a
/// [`FormatError::Parse`], and output that does not re-parse is a
/// [`FormatError::Format`].
///
/// # Examples
///
/// ```
/// use envsync_format::{format_document, FormattingRuleSet};
///
/// let mut rules = FormattingRuleSet::default();
/// rules.register_key_path("apiVersion");
/// rules.register_key_path("kind");
///
/// let out = format_document("kind: Service\napiVersion: v1\n", "svc.yaml", Some(&rules)).unwrap();
/// assert_eq!(out, "apiVersion: v1\nkind: Service\n");
///
/// let untouched = format_document("b: 1\na: 2", "svc.yaml", None).unwrap();
/// assert_eq!(untouched, "b: 1\na: 2");
/// ```
pub fn format_document(
    text: &str,
    file_path: &str,
    rules: Option<&FormattingRuleSet>,
) -> Result<String> {
    let Some(rules) = rules else {
        return Ok(text.to_string());
    };
    if text.trim().is_empty() {
        return Ok(text.to_string());
    }

    let mut document =
        StructuralDocument::parse(text).map_err(|e| FormatError::parse(file_path, e.message))?;
    transform::apply(&mut document, rules);

    let mut output = Renderer::new(rules.indent).render(&document);
    if rules.key_separator {
        output = separator::insert_key_separators(&output);
    }

    serde_yaml::from_str::<serde_yaml::Value>(&output)
        .map_err(|e| FormatError::format(file_path, format!("rendered YAML is invalid: {e}")))?;

    debug!(file = file_path, "Formatted document");
    Ok(output)
}

/// Resolve the rules for `file_path` from `output` and format `text`.
///
/// Returns the text unchanged when no output format is configured.
pub fn format_for_file(
    text: &str,
    file_path: &str,
    output: Option<&OutputFormat>,
    globs: &mut GlobCache,
) -> Result<String> {
    let rules = output.map(|output| FormattingRuleSet::for_file(output, file_path, globs));
    format_document(text, file_path, rules.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_rules_is_passthrough() {
        let text = "b:   1\na: [ 1,2 ]";
        assert_eq!(format_document(text, "a.yaml", None).unwrap(), text);
    }

    #[test]
    fn test_blank_text_is_passthrough() {
        let rules = FormattingRuleSet::default();
        assert_eq!(format_document("", "a.yaml", Some(&rules)).unwrap(), "");
        assert_eq!(format_document("\n  \n", "a.yaml", Some(&rules)).unwrap(), "\n  \n");
    }

    #[test]
    fn test_parse_error_is_tagged() {
        let rules = FormattingRuleSet::default();
        let err = format_document("a: [1, 2\n", "apps/a.yaml", Some(&rules)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParseError);
        assert_eq!(err.file_path(), "apps/a.yaml");
    }

    #[test]
    fn test_key_separator_option() {
        let rules = FormattingRuleSet {
            key_separator: true,
            ..Default::default()
        };
        assert_eq!(
            format_document("a: 1\nb: 2\n", "a.yaml", Some(&rules)).unwrap(),
            "a: 1\n\nb: 2\n"
        );
    }

    #[test]
    fn test_format_for_file_without_output_format() {
        let mut globs = GlobCache::new();
        let text = "b: 1\na: 2";
        assert_eq!(format_for_file(text, "x.yaml", None, &mut globs).unwrap(), text);
    }
}
