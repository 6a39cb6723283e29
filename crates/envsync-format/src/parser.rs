//! Parsing YAML text into a [`StructuralDocument`]
//!
//! The tree is built from `yaml-rust2` parser events. The event stream does
//! not carry comments, so those are recovered afterwards from the source
//! lines and attached to nodes by the line each node starts on.

use crate::document::{
    Comments, Node, NodeKind, Pair, Scalar, ScalarKind, ScalarStyle, StructuralDocument,
};
use std::collections::{HashMap, HashSet};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Error raised for text that is not a single well-formed YAML document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl StructuralDocument {
    /// Parse YAML text, keeping styles and comments.
    ///
    /// # Examples
    ///
    /// ```
    /// use envsync_format::StructuralDocument;
    ///
    /// let doc = StructuralDocument::parse("# image settings\nimage:\n  tag: 1.0 # pinned\n").unwrap();
    /// let image = doc.get(&["image"]).unwrap();
    /// assert_eq!(doc.root.as_ref().unwrap().pairs().unwrap()[0].key.comments.leading, vec!["# image settings"]);
    /// assert_eq!(image.get("tag").unwrap().comments.trailing.as_deref(), Some("# pinned"));
    /// ```
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let mut builder = TreeBuilder::new(source);
        let mut parser = Parser::new_from_str(source);
        parser
            .load(&mut builder, true)
            .map_err(|e| ParseError::new(e.to_string()))?;
        let tree = builder.finish()?;
        Ok(attach_comments(source, tree))
    }
}

/// Position of a node in its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Root,
    Key,
    Value,
    Item,
}

#[derive(Debug, Clone, Copy)]
struct NodeStart {
    id: usize,
    line: usize,
    role: Role,
    scalar: bool,
}

/// A literal or folded scalar; `owner_indent` is the column its content
/// must be indented past.
#[derive(Debug, Clone, Copy)]
struct BlockScalar {
    line: usize,
    owner_indent: Option<usize>,
}

enum Frame {
    Mapping {
        id: usize,
        anchor: usize,
        tag: Option<String>,
        flow: bool,
        pairs: Vec<Pair>,
        pending_key: Option<Node>,
        pending_key_col: usize,
        seen: HashSet<String>,
    },
    Sequence {
        id: usize,
        anchor: usize,
        tag: Option<String>,
        flow: bool,
        col: usize,
        items: Vec<Node>,
    },
}

struct ParsedTree {
    root: Option<Node>,
    starts: Vec<NodeStart>,
    blocks: Vec<BlockScalar>,
}

struct TreeBuilder {
    chars: Vec<char>,
    stack: Vec<Frame>,
    anchors: HashMap<usize, Node>,
    root: Option<Node>,
    documents: usize,
    starts: Vec<NodeStart>,
    blocks: Vec<BlockScalar>,
    error: Option<String>,
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        match event {
            Event::Scalar(value, style, anchor, tag) => {
                self.scalar(value, style, anchor, tag.map(shorthand), mark);
            }
            Event::SequenceStart(anchor, tag) => self.open(anchor, tag.map(shorthand), mark, false),
            Event::MappingStart(anchor, tag) => self.open(anchor, tag.map(shorthand), mark, true),
            Event::SequenceEnd | Event::MappingEnd => self.close(mark),
            Event::Alias(anchor) => self.alias(anchor, mark),
            _ => {}
        }
    }
}

impl TreeBuilder {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            stack: Vec::new(),
            anchors: HashMap::new(),
            root: None,
            documents: 0,
            starts: Vec::new(),
            blocks: Vec::new(),
            error: None,
        }
    }

    fn finish(self) -> Result<ParsedTree, ParseError> {
        if let Some(message) = self.error {
            return Err(ParseError::new(message));
        }
        if !self.stack.is_empty() {
            return Err(ParseError::new("unexpected end of document"));
        }
        Ok(ParsedTree {
            root: self.root,
            starts: self.starts,
            blocks: self.blocks,
        })
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    fn role(&self) -> Role {
        match self.stack.last() {
            None => Role::Root,
            Some(Frame::Mapping {
                pending_key: None, ..
            }) => Role::Key,
            Some(Frame::Mapping { .. }) => Role::Value,
            Some(Frame::Sequence { .. }) => Role::Item,
        }
    }

    fn begin(&mut self, role: Role, mark: Marker, scalar: bool) -> usize {
        let id = self.starts.len();
        self.starts.push(NodeStart {
            id,
            line: mark.line(),
            role,
            scalar,
        });
        id
    }

    fn owner_indent(&self, role: Role) -> Option<usize> {
        match (role, self.stack.last()) {
            (Role::Value, Some(Frame::Mapping { pending_key_col, .. })) => Some(*pending_key_col),
            (Role::Item, Some(Frame::Sequence { col, .. })) => Some(*col),
            _ => None,
        }
    }

    fn remember(&mut self, anchor: usize, node: &Node) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.detached());
        }
    }

    fn scalar(
        &mut self,
        value: String,
        style: TScalarStyle,
        anchor: usize,
        tag: Option<String>,
        mark: Marker,
    ) {
        let role = self.role();
        let id = self.begin(role, mark, true);
        let style = scalar_style(style);
        if style.is_block() {
            let owner_indent = self.owner_indent(role);
            self.blocks.push(BlockScalar {
                line: mark.line(),
                owner_indent,
            });
        }

        let mut scalar = match style {
            // An empty value arrives as `~`; keep it empty unless the source said `~`.
            ScalarStyle::Plain if value == "~" && self.char_at(mark.index()) != Some('~') => {
                Scalar::plain("")
            }
            ScalarStyle::Plain => Scalar::plain(value),
            other => Scalar::string(value, other),
        };
        if matches!(tag.as_deref(), Some("!!str" | "!")) {
            scalar.kind = ScalarKind::String;
        }
        let mut node = Node::with_id(id, NodeKind::Scalar(scalar));
        node.tag = tag;
        self.remember(anchor, &node);
        self.push(node, mark);
    }

    fn open(&mut self, anchor: usize, tag: Option<String>, mark: Marker, mapping: bool) {
        let role = self.role();
        if role == Role::Key {
            self.fail(format!(
                "complex mapping keys are not supported (line {})",
                mark.line()
            ));
            return;
        }
        let id = self.begin(role, mark, false);
        let flow = matches!(self.char_at(mark.index()), Some('[' | '{'));
        let frame = if mapping {
            Frame::Mapping {
                id,
                anchor,
                tag,
                flow,
                pairs: Vec::new(),
                pending_key: None,
                pending_key_col: 0,
                seen: HashSet::new(),
            }
        } else {
            Frame::Sequence {
                id,
                anchor,
                tag,
                flow,
                col: mark.col(),
                items: Vec::new(),
            }
        };
        self.stack.push(frame);
    }

    fn close(&mut self, mark: Marker) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let (mut node, anchor, tag) = match frame {
            Frame::Mapping {
                id,
                anchor,
                tag,
                flow,
                pairs,
                ..
            } => (Node::with_id(id, NodeKind::Mapping { pairs, flow }), anchor, tag),
            Frame::Sequence {
                id,
                anchor,
                tag,
                flow,
                items,
                ..
            } => (Node::with_id(id, NodeKind::Sequence { items, flow }), anchor, tag),
        };
        node.tag = tag;
        self.remember(anchor, &node);
        self.push(node, mark);
    }

    fn alias(&mut self, anchor: usize, mark: Marker) {
        let Some(mut node) = self.anchors.get(&anchor).map(Node::detached) else {
            self.fail(format!("unknown alias (line {})", mark.line()));
            return;
        };
        let role = self.role();
        let scalar = matches!(node.kind, NodeKind::Scalar(_));
        node.id = self.begin(role, mark, scalar);
        self.push(node, mark);
    }

    fn push(&mut self, node: Node, mark: Marker) {
        let error = match self.stack.last_mut() {
            None => {
                self.documents += 1;
                if self.documents > 1 {
                    Some("multiple documents are not supported".to_string())
                } else {
                    self.root = Some(node);
                    None
                }
            }
            Some(Frame::Sequence { items, .. }) => {
                items.push(node);
                None
            }
            Some(Frame::Mapping {
                pairs,
                pending_key,
                pending_key_col,
                seen,
                ..
            }) => {
                if let Some(key) = pending_key.take() {
                    pairs.push(Pair { key, value: node });
                    None
                } else if let Some(text) = node.as_scalar().map(|s| s.value.clone()) {
                    if seen.insert(text.clone()) {
                        *pending_key = Some(node);
                        *pending_key_col = mark.col();
                        None
                    } else {
                        Some(format!("duplicate key '{text}' (line {})", mark.line()))
                    }
                } else {
                    Some(format!(
                        "complex mapping keys are not supported (line {})",
                        mark.line()
                    ))
                }
            }
        };
        if let Some(message) = error {
            self.fail(message);
        }
    }
}

/// Source form of a resolved tag.
fn shorthand(tag: Tag) -> String {
    match (tag.handle.as_str(), tag.suffix.as_str()) {
        ("tag:yaml.org,2002:", suffix) => format!("!!{suffix}"),
        ("!", suffix) => format!("!{suffix}"),
        ("", "!") => "!".to_string(),
        (handle, suffix) => format!("!<{handle}{suffix}>"),
    }
}

fn scalar_style(style: TScalarStyle) -> ScalarStyle {
    match style {
        TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
        TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
        TScalarStyle::Literal => ScalarStyle::Literal,
        TScalarStyle::Folded => ScalarStyle::Folded,
        _ => ScalarStyle::Plain,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Blank,
    Comment(String),
    /// Node content, with the inline comment if there is one
    Content(Option<String>),
    /// Content of a literal or folded scalar
    Block,
    /// `---`, `...` or a directive
    Marker,
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn classify(line: &str) -> Line {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Line::Blank
    } else if trimmed.starts_with('#') {
        Line::Comment(trimmed.to_string())
    } else if is_marker(line) {
        Line::Marker
    } else {
        Line::Content(inline_comment_start(line).map(|i| line[i..].trim_end().to_string()))
    }
}

fn is_marker(line: &str) -> bool {
    let line = line.trim_end();
    line == "---"
        || line == "..."
        || line.starts_with("--- #")
        || line.starts_with("... #")
        || line.starts_with('%')
}

/// Byte offset of a `#` that starts a comment, skipping quoted text.
fn inline_comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    for (i, ch) in line.char_indices() {
        match quote {
            Some('"') => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    quote = None;
                }
            }
            Some(_) => {
                if ch == '\'' {
                    quote = None;
                }
            }
            None => match ch {
                '#' if prev.is_none_or(char::is_whitespace) => return Some(i),
                '"' | '\''
                    if prev.is_none_or(|p| p.is_whitespace() || "[{,:-?".contains(p)) =>
                {
                    quote = Some(ch);
                }
                _ => {}
            },
        }
        prev = Some(ch);
    }
    None
}

fn classify_lines(source: &str, blocks: &[BlockScalar]) -> Vec<Line> {
    let raw: Vec<&str> = source.lines().collect();
    let mut lines: Vec<Line> = raw.iter().map(|line| classify(line)).collect();

    for block in blocks {
        // `block.line` is 1-based, so it is also the index of the next line.
        let start = block.line;
        let mut end = start;
        for (idx, text) in raw.iter().enumerate().skip(start) {
            if text.trim().is_empty() {
                lines[idx] = Line::Block;
                continue;
            }
            if block
                .owner_indent
                .is_some_and(|owner| indent_of(text) <= owner)
            {
                break;
            }
            lines[idx] = Line::Block;
            end = idx + 1;
        }
        // Blank lines after the last content line separate nodes.
        for idx in end..raw.len() {
            if !raw[idx].trim().is_empty() {
                break;
            }
            lines[idx] = Line::Blank;
        }
    }
    lines
}

fn attach_comments(source: &str, tree: ParsedTree) -> StructuralDocument {
    let lines = classify_lines(source, &tree.blocks);
    let points: Vec<NodeStart> = tree
        .starts
        .iter()
        .filter(|start| matches!(start.role, Role::Key | Role::Item))
        .copied()
        .collect();
    let first_line = tree.starts.first().map(|start| start.line);

    let mut last_scalar: HashMap<usize, usize> = HashMap::new();
    for start in tree.starts.iter().filter(|start| start.scalar) {
        last_scalar.insert(start.line, start.id);
    }

    // Comments above the last blank line or document marker before the first
    // node form the header.
    let header_end = first_line
        .and_then(|first| {
            (1..first).rev().find(|n| {
                matches!(lines.get(n - 1), Some(Line::Blank | Line::Marker))
            })
        })
        .unwrap_or(0);

    let mut comments: HashMap<usize, Comments> = HashMap::new();
    let mut first_comment_line: HashMap<usize, usize> = HashMap::new();
    let mut header = Vec::new();
    let mut footer = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let number = idx + 1;
        let text = match line {
            Line::Comment(text) => text,
            Line::Content(Some(text)) => {
                if let Some(&id) = last_scalar.get(&number) {
                    comments.entry(id).or_default().trailing = Some(text.clone());
                    continue;
                }
                text
            }
            _ => continue,
        };

        let before_first = first_line.is_none_or(|first| number < first);
        if before_first && number < header_end {
            header.push(text.clone());
            continue;
        }
        let next = points.partition_point(|point| point.line <= number);
        match points.get(next) {
            Some(point) => {
                first_comment_line.entry(point.id).or_insert(number);
                comments
                    .entry(point.id)
                    .or_default()
                    .leading
                    .push(text.clone());
            }
            None if before_first => header.push(text.clone()),
            None => footer.push(text.clone()),
        }
    }

    let mut previous_line = None;
    for point in &points {
        let same_line = previous_line == Some(point.line);
        previous_line = Some(point.line);
        if same_line || Some(point.line) == first_line {
            continue;
        }
        let top = first_comment_line
            .get(&point.id)
            .map_or(point.line, |&line| line.min(point.line));
        if top >= 2 && lines.get(top - 2) == Some(&Line::Blank) {
            comments.entry(point.id).or_default().space_before = true;
        }
    }

    let explicit_start = source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .is_some_and(|line| line.starts_with("---"));

    let mut root = tree.root;
    if let Some(node) = root.as_mut() {
        assign_comments(node, &mut comments);
    }

    StructuralDocument {
        root,
        header,
        footer,
        explicit_start,
    }
}

fn assign_comments(node: &mut Node, comments: &mut HashMap<usize, Comments>) {
    if let Some(found) = comments.remove(&node.id) {
        node.comments = found;
    }
    match &mut node.kind {
        NodeKind::Scalar(_) => {}
        NodeKind::Mapping { pairs, .. } => {
            for pair in pairs {
                assign_comments(&mut pair.key, comments);
                assign_comments(&mut pair.value, comments);
            }
        }
        NodeKind::Sequence { items, .. } => {
            for item in items {
                assign_comments(item, comments);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ScalarKind;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> StructuralDocument {
        StructuralDocument::parse(text).unwrap()
    }

    #[test]
    fn test_plain_scalars_keep_source_text() {
        let doc = parse("a: 1.0\nb: 0x1F\nc: yes\n");
        let a = doc.get(&["a"]).and_then(Node::as_scalar).unwrap();
        assert_eq!(a.value, "1.0");
        assert_eq!(a.kind, ScalarKind::Float);
        assert_eq!(doc.get(&["b"]).and_then(Node::as_scalar).unwrap().value, "0x1F");
        assert_eq!(doc.get(&["c"]).and_then(Node::as_scalar).unwrap().kind, ScalarKind::String);
    }

    #[test]
    fn test_scalar_styles() {
        let doc = parse("a: 'x'\nb: \"y\"\nc: |\n  line\nd: >\n  folded\n");
        let style = |key: &str| doc.get(&[key]).and_then(Node::as_scalar).unwrap().style;
        assert_eq!(style("a"), ScalarStyle::SingleQuoted);
        assert_eq!(style("b"), ScalarStyle::DoubleQuoted);
        assert_eq!(style("c"), ScalarStyle::Literal);
        assert_eq!(style("d"), ScalarStyle::Folded);
    }

    #[test]
    fn test_empty_value_is_null() {
        let doc = parse("a:\nb: ~\n");
        let a = doc.get(&["a"]).and_then(Node::as_scalar).unwrap();
        assert_eq!(a.value, "");
        assert!(a.is_null());
        assert_eq!(doc.get(&["b"]).and_then(Node::as_scalar).unwrap().value, "~");
    }

    #[test]
    fn test_flow_hint() {
        let doc = parse("a: [1, 2]\nb: {c: d}\ne:\n  - 1\n");
        assert!(matches!(doc.get(&["a"]).unwrap().kind, NodeKind::Sequence { flow: true, .. }));
        assert!(matches!(doc.get(&["b"]).unwrap().kind, NodeKind::Mapping { flow: true, .. }));
        assert!(matches!(doc.get(&["e"]).unwrap().kind, NodeKind::Sequence { flow: false, .. }));
    }

    #[test]
    fn test_comment_attachment() {
        let doc = parse(
            "# header\n\n# about a\na: 1 # one\n\n# about b\nb:\n  - x # first\n  # about y\n  - y\n# footer\n",
        );
        assert_eq!(doc.header, vec!["# header"]);
        assert_eq!(doc.footer, vec!["# footer"]);

        let root = doc.root.as_ref().unwrap();
        let pairs = root.pairs().unwrap();
        assert_eq!(pairs[0].key.comments.leading, vec!["# about a"]);
        assert_eq!(pairs[0].value.comments.trailing.as_deref(), Some("# one"));
        assert!(!pairs[0].key.comments.space_before);
        assert_eq!(pairs[1].key.comments.leading, vec!["# about b"]);
        assert!(pairs[1].key.comments.space_before);

        let items = pairs[1].value.items().unwrap();
        assert_eq!(items[0].comments.trailing.as_deref(), Some("# first"));
        assert_eq!(items[1].comments.leading, vec!["# about y"]);
    }

    #[test]
    fn test_hash_inside_values_is_not_a_comment() {
        let doc = parse("a: \"x # y\"\nb: c#d\nc: |\n  # not a comment\n  text\nd: 1\n");
        assert_eq!(doc.get(&["a"]).and_then(Node::as_scalar).unwrap().value, "x # y");
        assert_eq!(doc.get(&["b"]).and_then(Node::as_scalar).unwrap().value, "c#d");
        assert_eq!(
            doc.get(&["c"]).and_then(Node::as_scalar).unwrap().value,
            "# not a comment\ntext\n"
        );
        let root = doc.root.as_ref().unwrap();
        assert!(root.pairs().unwrap().iter().all(|p| p.key.comments.leading.is_empty()));
        assert!(doc.footer.is_empty());
    }

    #[test]
    fn test_aliases_resolve_to_copies() {
        let doc = parse("base: &base\n  a: 1\ncopy: *base\n");
        assert_eq!(doc.get(&["copy", "a"]).and_then(Node::as_scalar).unwrap().value, "1");
    }

    #[test]
    fn test_explicit_start() {
        assert!(parse("---\na: 1\n").explicit_start);
        assert!(!parse("a: 1\n").explicit_start);
    }

    #[test]
    fn test_comments_above_document_marker_are_header() {
        let doc = parse("# Chart values\n---\n# about a\na: 1\n");
        assert_eq!(doc.header, vec!["# Chart values"]);
        let root = doc.root.as_ref().unwrap();
        assert_eq!(root.pairs().unwrap()[0].key.comments.leading, vec!["# about a"]);
    }

    #[test]
    fn test_tags_are_kept() {
        let doc = parse("a: !!str 123\nb: !secret token\nc: !!map\n  d: 1\ne: ! 12\n");
        let a = doc.get(&["a"]).unwrap();
        assert_eq!(a.tag.as_deref(), Some("!!str"));
        assert_eq!(a.as_scalar().unwrap().kind, ScalarKind::String);
        assert_eq!(doc.get(&["b"]).unwrap().tag.as_deref(), Some("!secret"));
        assert_eq!(doc.get(&["c"]).unwrap().tag.as_deref(), Some("!!map"));
        assert_eq!(doc.get(&["e"]).unwrap().tag.as_deref(), Some("!"));
        assert_eq!(doc.get(&["e"]).and_then(Node::as_scalar).unwrap().kind, ScalarKind::String);
    }

    #[test]
    fn test_comment_only_document() {
        let doc = parse("# nothing here\n");
        assert!(doc.root.is_none());
        assert_eq!(doc.header, vec!["# nothing here"]);
    }

    #[test]
    fn test_rejects_multiple_documents() {
        assert!(StructuralDocument::parse("a: 1\n---\nb: 2\n").is_err());
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let err = StructuralDocument::parse("a: 1\na: 2\n").unwrap_err();
        assert!(err.message.contains("duplicate key"));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(StructuralDocument::parse("a: [1, 2\n").is_err());
        assert!(StructuralDocument::parse("a: b: c\n").is_err());
    }

    #[test]
    fn test_inline_comment_detection() {
        assert_eq!(inline_comment_start("a: b # c"), Some(5));
        assert_eq!(inline_comment_start("a: 'b # c'"), None);
        assert_eq!(inline_comment_start("a: don't # c"), Some(9));
        assert_eq!(inline_comment_start("url: http://x/#frag"), None);
    }
}
