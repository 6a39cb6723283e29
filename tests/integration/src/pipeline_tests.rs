//! End-to-end tests for the sync pipeline
//!
//! Each test runs a file through the same steps a sync does: exclusion check,
//! skip paths, fixed values, array change detection, then formatting of the
//! written YAML.

use envsync_core::config::SyncConfig;
use envsync_core::diff::detect_array_changes;
use envsync_core::logging;
use envsync_core::path::{get_value_at_path, parse_path};
use envsync_core::rules::RuleContext;
use envsync_format::{ErrorCode, format_for_file};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

// =============================================================================
// Test Infrastructure
// =============================================================================

const CONFIG: &str = r#"
exclude:
  - "**/secrets.yaml"
skipPath:
  "apps/**/values.yaml":
    - replicaCount
    - ingress.hosts[*]
fixedValues:
  "apps/*/values.yaml":
    - path: env[name=LOG_LEVEL].value
      value: info
  "apps/prod/*.yaml":
    - path: image.pullPolicy
      value: Always
outputFormat:
  indent: 2
  keyOrders:
    "**/values.yaml":
      - image
      - env
      - image.repository
  arraySort:
    "**/values.yaml":
      - path: env
        sortBy: name
  quoteValues:
    "apps/prod/**":
      - image.tag
"#;

const SOURCE: &str = "\
replicaCount: 3
env:
  - name: LOG_LEVEL
    value: debug
  - name: API_URL
    value: api.svc
image:
  tag: v1.2.0
  repository: api
  pullPolicy: IfNotPresent
";

/// Runs files through the sync steps with one shared rule context
struct Pipeline {
    config: SyncConfig,
    context: RuleContext,
}

/// Outcome of syncing one file
#[derive(Debug)]
struct Synced {
    document: Value,
    fixed: usize,
    skipped: usize,
    output: String,
}

impl Pipeline {
    fn new(config: &str) -> Self {
        // Every test builds a pipeline; only the first install succeeds.
        let _ = logging::init_with_filter("warn");
        Self {
            config: SyncConfig::parse(config).unwrap(),
            context: RuleContext::new(),
        }
    }

    fn sync(&mut self, file: &str, source: &str) -> Option<Synced> {
        if self.context.is_excluded(file, &self.config.exclude) {
            return None;
        }
        let mut document: Value = serde_yaml::from_str(source).unwrap();
        let skipped = self
            .context
            .apply_skip_paths(&mut document, file, &self.config.skip_path);
        let fixed = self
            .context
            .apply_fixed_values(&mut document, file, &self.config.fixed_values);

        let written = serde_yaml::to_string(&document).unwrap();
        let output = format_for_file(
            &written,
            file,
            self.config.output_format.as_ref(),
            &mut self.context.globs,
        )
        .unwrap();

        Some(Synced {
            document,
            fixed,
            skipped,
            output,
        })
    }
}

#[test]
fn test_pipeline_installs_logging() {
    let _pipeline = Pipeline::new(CONFIG);
    assert!(logging::init().is_err());
}

// =============================================================================
// Rules
// =============================================================================

#[test]
fn test_fixed_value_through_filter() {
    let mut pipeline = Pipeline::new(CONFIG);
    let synced = pipeline.sync("apps/api/values.yaml", SOURCE).unwrap();

    assert_eq!(synced.fixed, 1);
    assert_eq!(
        get_value_at_path(&synced.document, &parse_path("env[name=LOG_LEVEL].value")),
        Some(&json!("info"))
    );
    assert_eq!(
        get_value_at_path(&synced.document, &parse_path("env[name=API_URL].value")),
        Some(&json!("api.svc"))
    );
}

#[test]
fn test_skip_paths_remove_values() {
    let mut pipeline = Pipeline::new(CONFIG);
    let source = "replicaCount: 2\ningress:\n  hosts:\n    - a.example.com\n    - b.example.com\n";
    let synced = pipeline.sync("apps/api/values.yaml", source).unwrap();

    assert_eq!(synced.skipped, 2);
    assert_eq!(synced.document, json!({"ingress": {"hosts": []}}));
}

#[test]
fn test_rules_for_other_patterns_do_not_apply() {
    let mut pipeline = Pipeline::new(CONFIG);
    let synced = pipeline.sync("charts/api/values.yaml", SOURCE).unwrap();

    assert_eq!(synced.fixed, 0);
    assert_eq!(synced.skipped, 0);
    assert_eq!(synced.document["replicaCount"], json!(3));
}

#[rstest]
#[case("apps/api/secrets.yaml", true)]
#[case("secrets.yaml", true)]
#[case("apps/api/values.yaml", false)]
fn test_exclusions(#[case] file: &str, #[case] excluded: bool) {
    let mut pipeline = Pipeline::new(CONFIG);
    assert_eq!(pipeline.sync(file, SOURCE).is_none(), excluded);
}

// =============================================================================
// Formatting
// =============================================================================

#[test]
fn test_written_file_is_formatted() {
    let mut pipeline = Pipeline::new(CONFIG);
    let synced = pipeline.sync("apps/api/values.yaml", SOURCE).unwrap();

    assert_eq!(
        synced.output,
        "\
image:
  repository: api
  pullPolicy: IfNotPresent
  tag: v1.2.0
env:
  - name: API_URL
    value: api.svc
  - name: LOG_LEVEL
    value: info
"
    );
}

#[test]
fn test_prod_values_are_pinned_and_quoted() {
    let mut pipeline = Pipeline::new(CONFIG);
    let synced = pipeline.sync("apps/prod/values.yaml", SOURCE).unwrap();

    assert_eq!(synced.fixed, 2);
    assert!(synced.output.contains("  pullPolicy: Always\n"));
    assert!(synced.output.contains("  tag: \"v1.2.0\"\n"));
}

#[test]
fn test_formatted_output_keeps_meaning() {
    let mut pipeline = Pipeline::new(CONFIG);
    let synced = pipeline.sync("apps/api/values.yaml", SOURCE).unwrap();

    let reparsed: Value = serde_yaml::from_str(&synced.output).unwrap();
    assert_eq!(reparsed["image"], synced.document["image"]);

    // sorting only reorders items
    let info = detect_array_changes(&synced.document, &reparsed);
    let change = info.change_at(&parse_path("env")).unwrap();
    assert!(change.is_empty());
    assert_eq!(change.unchanged.len(), 2);
}

#[test]
fn test_without_output_format_text_is_untouched() {
    let mut pipeline = Pipeline::new("exclude: []\n");
    let synced = pipeline.sync("values.yaml", SOURCE).unwrap();

    assert_eq!(synced.output, serde_yaml::to_string(&synced.document).unwrap());
}

#[test]
fn test_broken_destination_reports_parse_error() {
    let config = SyncConfig::parse(CONFIG).unwrap();
    let mut context = RuleContext::new();
    let err = format_for_file(
        "image: [unclosed\n",
        "apps/api/values.yaml",
        config.output_format.as_ref(),
        &mut context.globs,
    )
    .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ParseError);
    assert!(!err.hints().is_empty());
}

// =============================================================================
// Array changes
// =============================================================================

#[test]
fn test_array_changes_between_environments() {
    let source: Value = serde_yaml::from_str(SOURCE).unwrap();
    let destination: Value = serde_yaml::from_str(
        "\
env:
  - name: API_URL
    value: api.svc
  - name: FEATURE_FLAG
    value: 'on'
image:
  tag: v1.1.0
",
    )
    .unwrap();

    let info = detect_array_changes(&source, &destination);
    assert!(info.has_arrays);
    assert!(info.has_changes);

    let change = info.change_at(&parse_path("env")).unwrap();
    assert_eq!(change.added, vec![json!({"name": "FEATURE_FLAG", "value": "on"})]);
    assert_eq!(change.removed, vec![json!({"name": "LOG_LEVEL", "value": "debug"})]);
    assert_eq!(change.unchanged, vec![json!({"name": "API_URL", "value": "api.svc"})]);
}

#[test]
fn test_identical_arrays_report_no_change() {
    let source: Value = serde_yaml::from_str(SOURCE).unwrap();
    let info = detect_array_changes(&source, &source.clone());

    assert!(info.has_arrays);
    assert!(!info.has_changes);
    assert_eq!(info.array_paths, vec![parse_path("env")]);
}
