//! Structural YAML document model
//!
//! A [`StructuralDocument`] keeps what a plain value tree loses: scalar
//! styles, the source text of plain scalars, flow collections and comments.
//! Comments belong to the node they precede, so reordering pairs or items
//! moves the comments along with them.

use regex::Regex;
use std::sync::LazyLock;

static INT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-+]?[0-9]+|0o[0-7]+|0x[0-9a-fA-F]+)$").unwrap());

static FLOAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
    )
    .unwrap()
});

/// Id of nodes that did not come from a parsed event (alias copies, nodes
/// built in code).
pub(crate) const DETACHED: usize = usize::MAX;

/// Presentation style of a scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl ScalarStyle {
    pub fn is_block(self) -> bool {
        matches!(self, Self::Literal | Self::Folded)
    }
}

/// Resolved type of a scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Null,
    Bool,
    Int,
    Float,
    String,
}

impl ScalarKind {
    /// Resolve the type of a plain scalar from its text.
    pub fn resolve_plain(text: &str) -> Self {
        match text {
            "" | "~" | "null" | "Null" | "NULL" => Self::Null,
            "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => Self::Bool,
            _ if INT_PATTERN.is_match(text) => Self::Int,
            _ if FLOAT_PATTERN.is_match(text) => Self::Float,
            _ => Self::String,
        }
    }
}

/// A scalar value with its presentation
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    /// Plain scalars hold their source text, quoted and block scalars their
    /// decoded content.
    pub value: String,
    pub kind: ScalarKind,
    pub style: ScalarStyle,
}

impl Scalar {
    pub fn plain(text: impl Into<String>) -> Self {
        let value = text.into();
        Self {
            kind: ScalarKind::resolve_plain(&value),
            value,
            style: ScalarStyle::Plain,
        }
    }

    pub fn string(value: impl Into<String>, style: ScalarStyle) -> Self {
        Self {
            value: value.into(),
            kind: ScalarKind::String,
            style,
        }
    }

    /// Numeric value of an int or float scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self.kind {
            ScalarKind::Int => parse_int(&self.value),
            ScalarKind::Float => parse_float(&self.value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.kind == ScalarKind::Null
    }

    /// The value can be written as a literal or folded block.
    ///
    /// Block scalars cannot carry carriage returns, other control characters
    /// or the unicode line separators, since those only survive escaped.
    pub fn fits_block(&self) -> bool {
        !self.value.chars().any(|ch| {
            (ch.is_control() && ch != '\n' && ch != '\t')
                || matches!(ch, '\u{85}' | '\u{2028}' | '\u{2029}' | '\u{feff}')
        })
    }

    /// Force the double-quoted style, turning the value into a string.
    pub fn force_double_quoted(&mut self) {
        if self.kind == ScalarKind::Null {
            self.value = "null".to_string();
        }
        self.kind = ScalarKind::String;
        self.style = ScalarStyle::DoubleQuoted;
    }
}

fn parse_int(text: &str) -> Option<f64> {
    if let Some(hex) = text.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    if let Some(octal) = text.strip_prefix("0o") {
        return i64::from_str_radix(octal, 8).ok().map(|n| n as f64);
    }
    text.parse::<f64>().ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let unsigned = text.trim_start_matches(['+', '-']);
    let negative = text.starts_with('-');
    match unsigned.to_ascii_lowercase().as_str() {
        ".inf" if negative => Some(f64::NEG_INFINITY),
        ".inf" => Some(f64::INFINITY),
        ".nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Comments attached to a node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    /// Full-line comments directly above the node, `#` included
    pub leading: Vec<String>,
    /// Comment at the end of the node's line
    pub trailing: Option<String>,
    /// A blank line separated the node from what came before it
    pub space_before: bool,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_none() && !self.space_before
    }
}

/// A key/value pair of a mapping; the key is always a scalar node.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub key: Node,
    pub value: Node,
}

impl Pair {
    /// Text of the key.
    pub fn key_text(&self) -> &str {
        match &self.key.kind {
            NodeKind::Scalar(scalar) => &scalar.value,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(Scalar),
    Mapping { pairs: Vec<Pair>, flow: bool },
    Sequence { items: Vec<Node>, flow: bool },
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Explicit tag in shorthand form (`!!str`, `!secret`)
    pub tag: Option<String>,
    pub comments: Comments,
    pub(crate) id: usize,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self::with_id(DETACHED, kind)
    }

    pub(crate) fn with_id(id: usize, kind: NodeKind) -> Self {
        Self {
            kind,
            tag: None,
            comments: Comments::default(),
            id,
        }
    }

    pub fn scalar(scalar: Scalar) -> Self {
        Self::new(NodeKind::Scalar(scalar))
    }

    pub fn mapping(pairs: Vec<Pair>) -> Self {
        Self::new(NodeKind::Mapping { pairs, flow: false })
    }

    pub fn sequence(items: Vec<Node>) -> Self {
        Self::new(NodeKind::Sequence { items, flow: false })
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn pairs(&self) -> Option<&[Pair]> {
        match &self.kind {
            NodeKind::Mapping { pairs, .. } => Some(pairs),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Value of the mapping entry named `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.pairs()?
            .iter()
            .find(|pair| pair.key_text() == key)
            .map(|pair| &pair.value)
    }

    /// Key texts of a mapping, in order.
    pub fn keys(&self) -> Vec<&str> {
        self.pairs()
            .map(|pairs| pairs.iter().map(Pair::key_text).collect())
            .unwrap_or_default()
    }

    /// Copy of this subtree with every node detached from its source.
    pub(crate) fn detached(&self) -> Node {
        let kind = match &self.kind {
            NodeKind::Scalar(scalar) => NodeKind::Scalar(scalar.clone()),
            NodeKind::Mapping { pairs, flow } => NodeKind::Mapping {
                pairs: pairs
                    .iter()
                    .map(|pair| Pair {
                        key: pair.key.detached(),
                        value: pair.value.detached(),
                    })
                    .collect(),
                flow: *flow,
            },
            NodeKind::Sequence { items, flow } => NodeKind::Sequence {
                items: items.iter().map(Node::detached).collect(),
                flow: *flow,
            },
        };
        Node {
            tag: self.tag.clone(),
            ..Node::new(kind)
        }
    }

    /// The tag belongs to the YAML core schema (`!!str`, `!!int`...).
    pub fn has_core_tag(&self) -> bool {
        self.tag.as_deref().is_some_and(|tag| tag.starts_with("!!"))
    }
}

/// A parsed YAML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralDocument {
    /// `None` for a document holding only comments
    pub root: Option<Node>,
    /// Comment block at the top of the file, separated from the first node
    /// by a blank line
    pub header: Vec<String>,
    /// Comments after the last node
    pub footer: Vec<String>,
    /// The document began with an explicit `---`
    pub explicit_start: bool,
}

impl StructuralDocument {
    /// Look up a node by a chain of mapping keys.
    pub fn get(&self, keys: &[&str]) -> Option<&Node> {
        keys.iter()
            .try_fold(self.root.as_ref()?, |node, key| node.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", ScalarKind::Null)]
    #[case("~", ScalarKind::Null)]
    #[case("null", ScalarKind::Null)]
    #[case("true", ScalarKind::Bool)]
    #[case("False", ScalarKind::Bool)]
    #[case("yes", ScalarKind::String)]
    #[case("8080", ScalarKind::Int)]
    #[case("-12", ScalarKind::Int)]
    #[case("0x1F", ScalarKind::Int)]
    #[case("1.0", ScalarKind::Float)]
    #[case("1e3", ScalarKind::Float)]
    #[case(".inf", ScalarKind::Float)]
    #[case("1.2.3", ScalarKind::String)]
    #[case("v1", ScalarKind::String)]
    fn test_resolve_plain(#[case] text: &str, #[case] expected: ScalarKind) {
        assert_eq!(ScalarKind::resolve_plain(text), expected);
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(Scalar::plain("0x10").as_f64(), Some(16.0));
        assert_eq!(Scalar::plain("-2.5").as_f64(), Some(-2.5));
        assert_eq!(Scalar::plain("-.inf").as_f64(), Some(f64::NEG_INFINITY));
        assert_eq!(Scalar::plain("abc").as_f64(), None);
        assert_eq!(Scalar::string("12", ScalarStyle::SingleQuoted).as_f64(), None);
    }

    #[rstest]
    #[case("a\nb", true)]
    #[case("\tindented\n", true)]
    #[case("x\r\ny", false)]
    #[case("bell\u{7}", false)]
    #[case("next\u{2028}line", false)]
    fn test_fits_block(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(Scalar::string(value, ScalarStyle::Literal).fits_block(), expected);
    }

    #[test]
    fn test_force_double_quoted() {
        let mut port = Scalar::plain("8080");
        port.force_double_quoted();
        assert_eq!(port, Scalar::string("8080", ScalarStyle::DoubleQuoted));

        let mut empty = Scalar::plain("~");
        empty.force_double_quoted();
        assert_eq!(empty.value, "null");
    }

    #[test]
    fn test_lookup_by_keys() {
        let doc = StructuralDocument {
            root: Some(Node::mapping(vec![Pair {
                key: Node::scalar(Scalar::plain("image")),
                value: Node::mapping(vec![Pair {
                    key: Node::scalar(Scalar::plain("tag")),
                    value: Node::scalar(Scalar::plain("1.0")),
                }]),
            }])),
            ..Default::default()
        };
        let tag = doc.get(&["image", "tag"]).and_then(Node::as_scalar);
        assert_eq!(tag.map(|s| s.value.as_str()), Some("1.0"));
        assert!(doc.get(&["image", "digest"]).is_none());
    }
}
