//! Rendering a [`StructuralDocument`] back to YAML text
//!
//! Output is block style with a configurable indent and no line wrapping.
//! Sequences nested under a key are indented one level, and a mapping inside
//! a sequence starts on the `- ` line.

use crate::document::{Comments, Node, NodeKind, Pair, Scalar, ScalarStyle, StructuralDocument};

/// Renders documents with a fixed indentation width
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    indent: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Renderer {
    pub fn new(indent: usize) -> Self {
        Self {
            indent: indent.max(1),
        }
    }

    /// Render the document; the text ends with exactly one newline unless it
    /// is empty.
    pub fn render(&self, document: &StructuralDocument) -> String {
        let mut lines = Vec::new();
        lines.extend(document.header.iter().cloned());
        // A block collection's tag can only go on the document marker line.
        let root_tag = document
            .root
            .as_ref()
            .filter(|root| is_block_collection(root))
            .and_then(|root| root.tag.as_deref());
        if document.explicit_start || root_tag.is_some() {
            lines.push(tagged(root_tag, "---".to_string()));
        } else if !document.header.is_empty() && document.root.is_some() {
            lines.push(String::new());
        }
        if let Some(root) = &document.root {
            self.render_root(root, &mut lines);
        }
        lines.extend(document.footer.iter().cloned());

        if lines.is_empty() {
            return String::new();
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn render_root(&self, node: &Node, lines: &mut Vec<String>) {
        match &node.kind {
            NodeKind::Mapping { pairs, flow: false } if !pairs.is_empty() => {
                self.render_mapping(pairs, 0, lines);
            }
            NodeKind::Sequence { items, flow: false } if !items.is_empty() => {
                self.render_sequence(items, 0, lines);
            }
            NodeKind::Scalar(scalar) if self.is_block_scalar(scalar) => {
                let (header, body) = block_scalar(scalar, self.indent);
                lines.push(with_comment(
                    tagged(node.tag.as_deref(), header),
                    trailing_comment(node),
                ));
                push_block_body(&body, self.indent, lines);
            }
            _ => lines.push(with_comment(inline(node, false), trailing_comment(node))),
        }
    }

    fn render_mapping(&self, pairs: &[Pair], indent: usize, lines: &mut Vec<String>) {
        let pad = " ".repeat(indent);
        for pair in pairs {
            push_leading(&pair.key.comments, &pad, lines);
            let prefix = format!("{pad}{}:", inline(&pair.key, false));
            self.render_entry(prefix, &pair.value, pair.key.comments.trailing.as_deref(), indent, lines);
        }
    }

    /// Render `value` after `prefix` (`key:` or `-`), with nested content
    /// indented from `indent`.
    fn render_entry(
        &self,
        prefix: String,
        value: &Node,
        key_comment: Option<&str>,
        indent: usize,
        lines: &mut Vec<String>,
    ) {
        let child_indent = indent + self.indent;
        let comment = trailing_comment(value).or(key_comment);
        let tag = value.tag.as_deref();
        match &value.kind {
            NodeKind::Mapping { pairs, flow: false } if !pairs.is_empty() => {
                lines.push(with_comment(tagged_after(prefix, tag), comment));
                self.render_mapping(pairs, child_indent, lines);
            }
            NodeKind::Sequence { items, flow: false } if !items.is_empty() => {
                lines.push(with_comment(tagged_after(prefix, tag), comment));
                self.render_sequence(items, child_indent, lines);
            }
            NodeKind::Scalar(scalar) if self.is_block_scalar(scalar) => {
                let (header, body) = block_scalar(scalar, self.indent);
                lines.push(with_comment(format!("{prefix} {}", tagged(tag, header)), comment));
                push_block_body(&body, child_indent, lines);
            }
            _ => {
                let text = inline(value, false);
                let line = if text.is_empty() {
                    prefix
                } else {
                    format!("{prefix} {text}")
                };
                lines.push(with_comment(line, comment));
            }
        }
    }

    fn render_sequence(&self, items: &[Node], indent: usize, lines: &mut Vec<String>) {
        let pad = " ".repeat(indent);
        for item in items {
            push_leading(&item.comments, &pad, lines);
            match &item.kind {
                NodeKind::Mapping { pairs, flow: false } if !pairs.is_empty() => {
                    let mut nested = Vec::new();
                    self.render_mapping(pairs, indent + 2, &mut nested);
                    push_item(nested, item.tag.as_deref(), indent, lines);
                }
                NodeKind::Sequence { items, flow: false } if !items.is_empty() => {
                    let mut nested = Vec::new();
                    self.render_sequence(items, indent + 2, &mut nested);
                    push_item(nested, item.tag.as_deref(), indent, lines);
                }
                _ => self.render_entry(format!("{pad}-"), item, None, indent, lines),
            }
        }
    }

    /// The scalar renders as a literal or folded block.
    fn is_block_scalar(&self, scalar: &Scalar) -> bool {
        let content = scalar.value.trim_end_matches('\n');
        scalar.style.is_block()
            && !content.is_empty()
            && scalar.fits_block()
            && (self.indent <= 9 || !needs_indicator(content))
    }
}

fn is_block_collection(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Mapping { pairs, flow } => !flow && !pairs.is_empty(),
        NodeKind::Sequence { items, flow } => !flow && !items.is_empty(),
        NodeKind::Scalar(_) => false,
    }
}

/// `tag text`, or `text` alone for an untagged node.
fn tagged(tag: Option<&str>, text: String) -> String {
    match tag {
        Some(tag) if text.is_empty() => tag.to_string(),
        Some(tag) => format!("{tag} {text}"),
        None => text,
    }
}

fn tagged_after(prefix: String, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("{prefix} {tag}"),
        None => prefix,
    }
}

fn push_leading(comments: &Comments, pad: &str, lines: &mut Vec<String>) {
    if comments.space_before {
        lines.push(String::new());
    }
    for comment in &comments.leading {
        lines.push(format!("{pad}{comment}"));
    }
}

/// Emit a nested block as a sequence item. A tagged item keeps the tag alone
/// on the `- ` line.
fn push_item(nested: Vec<String>, tag: Option<&str>, indent: usize, lines: &mut Vec<String>) {
    match tag {
        Some(tag) => {
            lines.push(format!("{}- {tag}", " ".repeat(indent)));
            lines.extend(nested);
        }
        None => push_dashed(nested, indent, lines),
    }
}

/// Move the first content line of a nested block onto the `- ` line.
fn push_dashed(nested: Vec<String>, indent: usize, lines: &mut Vec<String>) {
    let mut dashed = false;
    for line in nested {
        let trimmed = line.trim_start();
        if dashed || trimmed.is_empty() || trimmed.starts_with('#') {
            lines.push(line);
            continue;
        }
        let body = line.get(indent + 2..).unwrap_or(trimmed);
        lines.push(format!("{}- {body}", " ".repeat(indent)));
        dashed = true;
    }
}

fn with_comment(line: String, comment: Option<&str>) -> String {
    match comment {
        Some(comment) => format!("{line} {comment}"),
        None => line,
    }
}

/// Inline comment of a node, or the first one found inside a flow
/// collection.
fn trailing_comment(node: &Node) -> Option<&str> {
    if let Some(comment) = node.comments.trailing.as_deref() {
        return Some(comment);
    }
    match &node.kind {
        NodeKind::Scalar(_) => None,
        NodeKind::Mapping { pairs, flow: true } => pairs.iter().find_map(|pair| {
            pair.key
                .comments
                .trailing
                .as_deref()
                .or_else(|| trailing_comment(&pair.value))
        }),
        NodeKind::Sequence { items, flow: true } => items.iter().find_map(trailing_comment),
        _ => None,
    }
}

/// Block indentation is detected from the first non-empty line, so an
/// explicit indicator is needed when that line starts with a space.
fn needs_indicator(content: &str) -> bool {
    content
        .split('\n')
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.starts_with(' '))
}

/// Header (`|-`, `|2`, `>-`...) and content lines of a block scalar.
fn block_scalar(scalar: &Scalar, indent: usize) -> (String, Vec<String>) {
    let value = scalar.value.as_str();
    let content = value.trim_end_matches('\n');
    let trailing = value.len() - content.len();
    let chomp = match trailing {
        0 => "-",
        1 => "",
        _ => "+",
    };
    let folded = scalar.style == ScalarStyle::Folded && !content.contains('\n');
    let indicator = if needs_indicator(content) {
        indent.to_string()
    } else {
        String::new()
    };
    let header = format!("{}{indicator}{chomp}", if folded { '>' } else { '|' });

    let mut body: Vec<String> = content.split('\n').map(str::to_string).collect();
    body.extend(std::iter::repeat_n(String::new(), trailing.saturating_sub(1)));
    (header, body)
}

fn push_block_body(body: &[String], indent: usize, lines: &mut Vec<String>) {
    let pad = " ".repeat(indent);
    for line in body {
        if line.is_empty() {
            lines.push(String::new());
        } else {
            lines.push(format!("{pad}{line}"));
        }
    }
}

/// Single-line form of a node: scalars, flow and empty collections.
///
/// Inside a flow collection an empty value is written as `null`, since a
/// bare `key:` followed by `,` or `}` does not parse.
fn inline(node: &Node, in_flow: bool) -> String {
    let body = match &node.kind {
        NodeKind::Scalar(scalar) => inline_scalar(scalar, in_flow),
        NodeKind::Mapping { pairs, .. } => {
            let entries: Vec<String> = pairs
                .iter()
                .map(|pair| format!("{}: {}", inline(&pair.key, true), inline(&pair.value, true)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        NodeKind::Sequence { items, .. } => {
            let entries: Vec<String> = items.iter().map(|item| inline(item, true)).collect();
            format!("[{}]", entries.join(", "))
        }
    };
    if in_flow && body.is_empty() && node.tag.is_none() {
        return "null".to_string();
    }
    tagged(node.tag.as_deref(), body)
}

fn inline_scalar(scalar: &Scalar, in_flow: bool) -> String {
    let value = scalar.value.as_str();
    match scalar.style {
        ScalarStyle::Plain if !value.contains('\n') && !(in_flow && has_flow_indicator(value)) => {
            value.to_string()
        }
        ScalarStyle::SingleQuoted if !value.contains('\n') => {
            format!("'{}'", value.replace('\'', "''"))
        }
        _ => double_quoted(value),
    }
}

fn has_flow_indicator(value: &str) -> bool {
    value.contains([',', '[', ']', '{', '}'])
}

fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
