//! Structural transforms applied before rendering
//!
//! The passes run in a fixed order: key ordering, array sorting, value
//! quoting, then multi-line preservation. The last pass always runs and wins
//! over quoting for scalars that contain a line break.

use crate::document::{Node, NodeKind, Pair, ScalarKind, ScalarStyle, StructuralDocument};
use crate::rules::{FormattingRuleSet, SortRule};
use envsync_core::config::SortOrder;
use envsync_core::path::{PathExpression, PathSegment};
use indexmap::IndexMap;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Run every pass of `rules` over `document`.
pub fn apply(document: &mut StructuralDocument, rules: &FormattingRuleSet) {
    let Some(root) = document.root.as_mut() else {
        return;
    };
    order_keys(root, &rules.key_hierarchy);
    for rule in &rules.sort_rules {
        sort_arrays(root, rule);
    }
    quote_values(root, &rules.quote_paths);
    preserve_multiline(root);
}

/// Reorder mapping keys using the key lists registered per dotted path.
///
/// Listed keys come first in list order, the rest follow alphabetically.
/// Only mappings reached through mapping keys are visited, never mappings
/// inside sequences.
pub fn order_keys(node: &mut Node, hierarchy: &IndexMap<String, Vec<String>>) {
    if hierarchy.is_empty() {
        return;
    }
    order_keys_at(node, "", hierarchy);
}

fn order_keys_at(node: &mut Node, path: &str, hierarchy: &IndexMap<String, Vec<String>>) {
    let NodeKind::Mapping { pairs, .. } = &mut node.kind else {
        return;
    };
    if let Some(order) = hierarchy.get(path).filter(|order| !order.is_empty()) {
        debug!(path, keys = order.len(), "Ordering keys");
        reorder_pairs(pairs, order);
    }
    for pair in pairs.iter_mut() {
        let child = if path.is_empty() {
            pair.key_text().to_string()
        } else {
            format!("{path}.{}", pair.key_text())
        };
        order_keys_at(&mut pair.value, &child, hierarchy);
    }
}

fn reorder_pairs(pairs: &mut Vec<Pair>, order: &[String]) {
    let position = |pair: &Pair| order.iter().position(|key| key == pair.key_text());
    let (mut named, mut others): (Vec<Pair>, Vec<Pair>) = std::mem::take(pairs)
        .into_iter()
        .partition(|pair| position(pair).is_some());
    named.sort_by_key(|pair| position(pair));
    others.sort_by(|a, b| a.key_text().cmp(b.key_text()));
    pairs.extend(named);
    pairs.extend(others);
}

/// Sort the sequences found at the rule's path by the rule's field.
///
/// Items without the field keep their relative order after the sorted ones,
/// whatever the direction.
pub fn sort_arrays(node: &mut Node, rule: &SortRule) {
    if !rule.path.iter().all(|segment| key_name(segment).is_some()) {
        warn!(path = %rule.path, "Array sort paths only support plain keys, rule ignored");
        return;
    }
    sort_at(node, &rule.path, rule);
}

fn key_name(segment: &PathSegment) -> Option<String> {
    match segment {
        PathSegment::Key(key) => Some(key.clone()),
        PathSegment::Index(index) => Some(index.to_string()),
        _ => None,
    }
}

fn sort_at(node: &mut Node, remaining: &[PathSegment], rule: &SortRule) {
    let Some((first, rest)) = remaining.split_first() else {
        if let NodeKind::Sequence { items, .. } = &mut node.kind {
            debug!(path = %rule.path, sort_by = %rule.sort_by, "Sorting array");
            sort_items(items, &rule.sort_by, rule.order);
        }
        return;
    };
    let (Some(name), NodeKind::Mapping { pairs, .. }) = (key_name(first), &mut node.kind) else {
        return;
    };
    for pair in pairs.iter_mut().filter(|pair| pair.key_text() == name) {
        sort_at(&mut pair.value, rest, rule);
    }
}

/// Sort field of one item; text is kept lower-cased
#[derive(Debug, Clone)]
enum SortKey {
    Number(f64),
    Text(String),
}

/// Numbers compare numerically and come before text, which compares
/// case-insensitively. Mixing the two per pair would not be a total order.
fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
        (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
    }
}

fn sort_key(item: &Node, field: &str) -> Option<SortKey> {
    let scalar = item.get(field)?.as_scalar()?;
    if scalar.is_null() {
        return None;
    }
    match scalar.as_f64() {
        Some(number) => Some(SortKey::Number(number)),
        None => Some(SortKey::Text(scalar.value.to_lowercase())),
    }
}

fn sort_items(items: &mut Vec<Node>, field: &str, order: SortOrder) {
    let mut keyed = Vec::new();
    let mut missing = Vec::new();
    for item in std::mem::take(items) {
        match sort_key(&item, field) {
            Some(key) => keyed.push((key, item)),
            None => missing.push(item),
        }
    }
    keyed.sort_by(|(a, _), (b, _)| match order {
        SortOrder::Asc => compare_keys(a, b),
        SortOrder::Desc => compare_keys(b, a),
    });
    items.extend(keyed.into_iter().map(|(_, item)| item));
    items.extend(missing);
}

/// Segment of the structural path of a node
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Item,
}

/// Force double quotes on scalars whose structural path matches a target.
///
/// Sequence items are addressed with `*`; a target cannot select one index.
pub fn quote_values(node: &mut Node, targets: &[PathExpression]) {
    if targets.is_empty() {
        return;
    }
    let mut current = Vec::new();
    quote_at(node, &mut current, targets);
}

fn quote_at(node: &mut Node, current: &mut Vec<Step>, targets: &[PathExpression]) {
    match &mut node.kind {
        NodeKind::Scalar(scalar) => {
            if targets.iter().any(|target| path_matches(target, current)) {
                scalar.force_double_quoted();
                // `!!int "8080"` would still be a number
                if node.has_core_tag() {
                    node.tag = None;
                }
            }
        }
        NodeKind::Mapping { pairs, .. } => {
            for pair in pairs.iter_mut() {
                current.push(Step::Key(pair.key_text().to_string()));
                quote_at(&mut pair.value, current, targets);
                current.pop();
            }
        }
        NodeKind::Sequence { items, .. } => {
            for item in items.iter_mut() {
                current.push(Step::Item);
                quote_at(item, current, targets);
                current.pop();
            }
        }
    }
}

fn path_matches(target: &[PathSegment], current: &[Step]) -> bool {
    target.len() == current.len()
        && target
            .iter()
            .zip(current)
            .all(|(segment, step)| match (segment, step) {
                (PathSegment::Wildcard, _) => true,
                (PathSegment::Key(key), Step::Key(name)) => key == name,
                (PathSegment::Index(index), Step::Key(name)) => index.to_string() == *name,
                _ => false,
            })
}

/// Give every value containing a line break the literal block style.
///
/// Values a block cannot hold (carriage returns, other control characters)
/// are double-quoted instead.
pub fn preserve_multiline(node: &mut Node) {
    match &mut node.kind {
        NodeKind::Scalar(scalar) => {
            if scalar.value.contains('\n') {
                scalar.style = if scalar.fits_block() {
                    ScalarStyle::Literal
                } else {
                    ScalarStyle::DoubleQuoted
                };
                scalar.kind = ScalarKind::String;
            }
        }
        NodeKind::Mapping { pairs, .. } => {
            for pair in pairs.iter_mut() {
                preserve_multiline(&mut pair.value);
            }
        }
        NodeKind::Sequence { items, .. } => {
            for item in items.iter_mut() {
                preserve_multiline(item);
            }
        }
    }
}
