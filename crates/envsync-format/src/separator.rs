//! Blank-line separation of top-level keys in rendered YAML
//!
//! Works on the rendered text by indentation: with several top-level keys a
//! blank line goes before each one after the first; with a single top-level
//! key the same is done for that key's children.

use regex::Regex;
use std::sync::LazyLock;

/// A line ending in a block scalar header, e.g. `key: |-` or `- >`.
static BLOCK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:-\s+)*(?:[^#]*?:\s+)?[|>][0-9+-]{0,2}\s*(?:#.*)?$").unwrap()
});

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_document_marker(line: &str) -> bool {
    line.starts_with("---") || line.starts_with("...")
}

/// Mark the lines that belong to block scalars.
fn block_lines(lines: &[&str]) -> Vec<bool> {
    let mut inside = vec![false; lines.len()];
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;
        if !BLOCK_HEADER.is_match(line) {
            continue;
        }
        let owner = indent_of(line);
        while i < lines.len() && (is_blank(lines[i]) || indent_of(lines[i]) > owner) {
            inside[i] = true;
            i += 1;
        }
    }
    inside
}

/// Insert blank lines between top-level keys, or between the children of
/// a single top-level key.
///
/// # Examples
///
/// ```
/// use envsync_format::separator::insert_key_separators;
///
/// assert_eq!(insert_key_separators("a: 1\nb: 2\n"), "a: 1\n\nb: 2\n");
/// assert_eq!(
///     insert_key_separators("root:\n  a: 1\n  b: 2\n"),
///     "root:\n  a: 1\n\n  b: 2\n"
/// );
/// ```
pub fn insert_key_separators(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let in_block = block_lines(&lines);
    let is_node = |idx: usize, indent: usize| {
        let line = lines[idx];
        !in_block[idx]
            && !is_blank(line)
            && !is_comment(line)
            && !is_document_marker(line)
            && indent_of(line) == indent
    };

    let top: Vec<usize> = (0..lines.len()).filter(|&idx| is_node(idx, 0)).collect();
    let targets: Vec<usize> = match top.as_slice() {
        [] => Vec::new(),
        [single] => {
            let child_indent = (single + 1..lines.len())
                .find(|&idx| !in_block[idx] && !is_blank(lines[idx]) && !is_comment(lines[idx]))
                .map(|idx| indent_of(lines[idx]))
                .filter(|&indent| indent > 0);
            match child_indent {
                Some(indent) => (single + 1..lines.len())
                    .filter(|&idx| is_node(idx, indent))
                    .skip(1)
                    .collect(),
                None => Vec::new(),
            }
        }
        [_, rest @ ..] => rest.to_vec(),
    };

    let mut separate_before = vec![false; lines.len()];
    for target in targets {
        let indent = indent_of(lines[target]);
        let mut start = target;
        while start > 0
            && !in_block[start - 1]
            && is_comment(lines[start - 1])
            && indent_of(lines[start - 1]) == indent
        {
            start -= 1;
        }
        if start > 0 && !is_blank(lines[start - 1]) {
            separate_before[start] = true;
        }
    }

    let mut out = String::with_capacity(text.len() + 16);
    for (idx, line) in lines.iter().enumerate() {
        if separate_before[idx] {
            out.push('\n');
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
