//! Tests for format_document on realistic chart values files

use envsync_core::config::SortOrder;
use envsync_core::path::parse_path;
use envsync_format::{ErrorCode, FormattingRuleSet, SortRule, format_document};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn yaml_value(text: &str) -> serde_yaml::Value {
    serde_yaml::from_str(text).unwrap()
}

#[rstest]
#[case("a: 1\nb: two\n")]
#[case("list:\n- 1\n- 2\n")]
#[case("nested:\n    deep:\n        key: value\n")]
#[case("flow: {a: [1, 2], b: 'x'}\n")]
#[case("text: >\n  folded\n  line\n")]
#[case("quoted: \"a\\tb\"\nsingle: 'it''s'\n")]
#[case("anchors:\n  base: &b {x: 1}\n  copy: *b\n")]
#[case("- a\n- {b: c}\n- - d\n")]
#[case("# only\n# comments\nkey: value\n")]
#[case("a: !!str 123\nb: !!str true\nc: !!int \"7\"\n")]
#[case("a: \"\\n  x\\ny\"\n")]
#[case("a: \"\\n\\n  x\"\n")]
#[case("a: \"x\\r\\ny\"\n")]
#[case("a: [x, {b: }]\nc: {d}\n")]
#[case("# chart\n---\na: 1\n")]
fn test_empty_rules_preserve_meaning(#[case] text: &str) {
    let rules = FormattingRuleSet::default();
    let out = format_document(text, "values.yaml", Some(&rules)).unwrap();
    assert_eq!(yaml_value(&out), yaml_value(text), "{out}");
    assert!(out.ends_with('\n') && !out.ends_with("\n\n"));
}

#[test]
fn test_kubernetes_manifest() {
    let text = "\
# Service definition

metadata:
  name: api # service name
  labels:
    tier: backend
    app: api
kind: Service
spec:
  ports:
    - name: https
      port: 443
    - name: http
      port: 80
  type: ClusterIP
apiVersion: v1
";
    let mut rules = FormattingRuleSet {
        sort_rules: vec![SortRule {
            path: parse_path("spec.ports"),
            sort_by: "port".to_string(),
            order: SortOrder::Asc,
        }],
        quote_paths: vec![parse_path("spec.ports.*.port")],
        ..Default::default()
    };
    for key in ["apiVersion", "kind", "metadata", "spec", "metadata.name"] {
        rules.register_key_path(key);
    }

    let out = format_document(text, "svc.yaml", Some(&rules)).unwrap();
    assert_eq!(
        out,
        "\
# Service definition

apiVersion: v1
kind: Service
metadata:
  name: api # service name
  labels:
    tier: backend
    app: api
spec:
  ports:
    - name: http
      port: \"80\"
    - name: https
      port: \"443\"
  type: ClusterIP
"
    );
}

#[test]
fn test_key_separator_with_comments() {
    let text = "b: 2\n# first key\na: 1\n";
    let mut rules = FormattingRuleSet {
        key_separator: true,
        ..Default::default()
    };
    rules.register_key_path("a");
    let out = format_document(text, "x.yaml", Some(&rules)).unwrap();
    assert_eq!(out, "# first key\na: 1\n\nb: 2\n");
}

#[test]
fn test_multiline_string_becomes_literal() {
    let rules = FormattingRuleSet {
        quote_paths: vec![parse_path("config")],
        ..Default::default()
    };
    let out = format_document(
        "config: \"[server]\\nport = 80\\n\"\n",
        "x.yaml",
        Some(&rules),
    )
    .unwrap();
    assert_eq!(out, "config: |\n  [server]\n  port = 80\n");
}

#[test]
fn test_sort_numbers_mixed_with_quoted_numbers() {
    let mut text = String::from("items:\n");
    for i in 0..24 {
        if i % 3 == 0 {
            text.push_str(&format!("  - k: '{}'\n", 30 - i));
        } else {
            text.push_str(&format!("  - k: {}\n", (i * 7) % 11));
        }
    }
    let rules = FormattingRuleSet {
        sort_rules: vec![SortRule {
            path: parse_path("items"),
            sort_by: "k".to_string(),
            order: SortOrder::Asc,
        }],
        ..Default::default()
    };

    let out = format_document(&text, "values.yaml", Some(&rules)).unwrap();
    let value = yaml_value(&out);
    let items = value["items"].as_sequence().unwrap();
    assert_eq!(items.len(), 24);
    assert!(items[..16].iter().all(|item| item["k"].is_u64()));
    assert!(items[16..].iter().all(|item| item["k"].is_string()));
    assert_eq!(items[16]["k"].as_str(), Some("12"));
}

#[test]
fn test_indent_width() {
    let rules = FormattingRuleSet {
        indent: 4,
        ..Default::default()
    };
    let out = format_document("a:\n  b:\n  - 1\n", "x.yaml", Some(&rules)).unwrap();
    assert_eq!(out, "a:\n    b:\n        - 1\n");
}

#[rstest]
#[case("a: [1, 2\n")]
#[case("a: 1\na: 2\n")]
#[case("a: 1\n---\nb: 2\n")]
#[case("? [a, b]\n: c\n")]
fn test_parse_failures(#[case] text: &str) {
    let rules = FormattingRuleSet::default();
    let err = format_document(text, "bad.yaml", Some(&rules)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParseError);
    assert_eq!(err.file_path(), "bad.yaml");
    assert!(err.to_string().starts_with("[PARSE_ERROR]"));
}
