//! Mutable YAML node tree built from parser events.
//!
//! Besides structure, tags and scalar styles, every node parsed from text
//! remembers enough of its layout to be written back unchanged: the column
//! it started at, whether a collection was written in flow form, and the
//! comment and blank lines around it.

use std::collections::HashMap;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::DocumentError;

/// The shape of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The document root; holds at most one child.
    Document,
    /// A mapping; children alternate key, value.
    Mapping,
    /// A sequence of items.
    Sequence,
    /// A scalar value.
    Scalar,
    /// A reference to an anchored node; its single child is a copy of the target.
    Alias,
}

/// How a scalar was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarStyle {
    /// Unquoted.
    #[default]
    Plain,
    /// 'single quoted'
    SingleQuoted,
    /// "double quoted"
    DoubleQuoted,
    /// `|` block.
    Literal,
    /// `>` block.
    Folded,
}

impl From<TScalarStyle> for ScalarStyle {
    fn from(style: TScalarStyle) -> Self {
        match style {
            TScalarStyle::Plain => Self::Plain,
            TScalarStyle::SingleQuoted => Self::SingleQuoted,
            TScalarStyle::DoubleQuoted => Self::DoubleQuoted,
            TScalarStyle::Literal => Self::Literal,
            _ => Self::Folded,
        }
    }
}

impl ScalarStyle {
    /// Returns true for `|` and `>` scalars.
    #[must_use]
    pub const fn is_block(self) -> bool {
        matches!(self, Self::Literal | Self::Folded)
    }
}

/// A scalar's text as written, tied to the value it was read as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawScalar {
    /// The value the text was read as.
    pub value: String,
    /// The text from the opening quote or block indicator onward, without
    /// any trailing comment.
    pub text: String,
}

/// A node in a YAML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// The node's shape.
    pub kind: NodeKind,
    /// Explicit tag such as `!Ref` or `!!str`.
    pub tag: Option<String>,
    /// Scalar style; `Plain` for non-scalars.
    pub style: ScalarStyle,
    /// Scalar text; empty for non-scalars.
    pub value: String,
    /// Anchor ID declared on this node.
    pub anchor: Option<usize>,
    /// Child nodes.
    pub children: Vec<Node>,
    /// Column the node started at in the source; `None` for built nodes.
    pub column: Option<usize>,
    /// Collection written as `{...}` or `[...]`.
    pub flow: bool,
    /// Content indentation of a block scalar, relative to the key or dash
    /// that owns it.
    pub indent: Option<usize>,
    /// Blank and comment lines directly above the node, verbatim.
    pub head_comment: Vec<String>,
    /// Comment trailing the node on its line, including the whitespace
    /// before `#`.
    pub line_comment: Option<String>,
    /// Blank and comment lines after the content; document roots only.
    pub foot_comment: Vec<String>,
    /// Source text of a quoted or block scalar.
    pub raw: Option<RawScalar>,
}

impl Node {
    fn empty(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: None,
            style: ScalarStyle::Plain,
            value: String::new(),
            anchor: None,
            children: Vec::new(),
            column: None,
            flow: false,
            indent: None,
            head_comment: Vec::new(),
            line_comment: None,
            foot_comment: Vec::new(),
            raw: None,
        }
    }

    /// Creates a plain scalar.
    #[must_use]
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::empty(NodeKind::Scalar)
        }
    }

    /// Creates a scalar that always reads back as a string.
    ///
    /// Text that a loader would type as a number, boolean or null, or that
    /// cannot be written unquoted, is single-quoted.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        let style = if super::emit::plain_reads_as_string(&value) {
            ScalarStyle::Plain
        } else {
            ScalarStyle::SingleQuoted
        };
        Self {
            style,
            ..Self::scalar(value)
        }
    }

    /// Creates a mapping from key/value pairs.
    #[must_use]
    pub fn mapping(pairs: impl IntoIterator<Item = (Self, Self)>) -> Self {
        let mut node = Self::empty(NodeKind::Mapping);
        for (key, value) in pairs {
            node.children.push(key);
            node.children.push(value);
        }
        node
    }

    /// Creates a sequence.
    #[must_use]
    pub fn sequence(items: impl IntoIterator<Item = Self>) -> Self {
        Self {
            children: items.into_iter().collect(),
            ..Self::empty(NodeKind::Sequence)
        }
    }

    /// Creates a document root around `content`.
    #[must_use]
    pub fn document(content: Option<Self>) -> Self {
        Self {
            children: content.into_iter().collect(),
            ..Self::empty(NodeKind::Document)
        }
    }

    fn alias(target: Self) -> Self {
        Self {
            children: vec![target],
            ..Self::empty(NodeKind::Alias)
        }
    }

    /// Returns true for a mapping node.
    #[must_use]
    pub fn is_mapping(&self) -> bool {
        self.kind == NodeKind::Mapping
    }

    /// Returns true for an untagged or string-tagged scalar.
    #[must_use]
    pub fn is_plain_text(&self) -> bool {
        self.kind == NodeKind::Scalar
            && self.tag.as_deref().map_or(true, |tag| tag == "!!str")
    }

    /// Returns true for a non-empty mapping or sequence in block form.
    #[must_use]
    pub fn is_block_collection(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping | NodeKind::Sequence)
            && !self.flow
            && !self.children.is_empty()
    }

    /// Iterates a mapping's key/value pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&Self, &Self)> {
        self.children
            .chunks_exact(2)
            .filter(|_| self.kind == NodeKind::Mapping)
            .map(|pair| (&pair[0], &pair[1]))
    }

    /// Looks up a mapping value by scalar key, descending through the
    /// document root.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self.kind {
            NodeKind::Document => self.children.first().and_then(|c| c.get(key)),
            NodeKind::Mapping => self
                .pairs()
                .find(|(k, _)| k.kind == NodeKind::Scalar && k.value == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Mutable variant of [`Node::get`].
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Self> {
        match self.kind {
            NodeKind::Document => self.children.first_mut().and_then(|c| c.get_mut(key)),
            NodeKind::Mapping => {
                let index = self
                    .children
                    .chunks_exact(2)
                    .position(|pair| pair[0].kind == NodeKind::Scalar && pair[0].value == key)?;
                self.children.get_mut(index * 2 + 1)
            }
            _ => None,
        }
    }

    /// Follows a path of mapping keys.
    #[must_use]
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Self> {
        path.iter().try_fold(self, |node, key| node.get(key.as_ref()))
    }

    /// Mutable variant of [`Node::get_path`].
    pub fn get_path_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Self> {
        path.iter()
            .try_fold(self, |node, key| node.get_mut(key.as_ref()))
    }
}

/// Builds a node tree from a UTF-8 YAML string.
///
/// Only the first document of a stream is read.
pub fn build_tree(source: &str) -> Result<Node, DocumentError> {
    let mut builder = TreeBuilder::new(source);
    let mut parser = Parser::new_from_str(source);
    parser
        .load(&mut builder, false)
        .map_err(|e| DocumentError::Parse(e.to_string()))?;
    builder.finish()
}

/// Line-oriented view of the source text. Lines are 1-indexed and columns
/// count chars, matching parser markers.
struct SourceLines<'a> {
    lines: Vec<&'a str>,
}

impl<'a> SourceLines<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().collect(),
        }
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, number: usize) -> &'a str {
        number
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .copied()
            .unwrap_or("")
    }

    fn chars(&self, number: usize) -> Vec<char> {
        self.line(number).chars().collect()
    }

    fn rest(&self, number: usize, col: usize) -> String {
        self.line(number).chars().skip(col).collect()
    }

    fn indentation(&self, number: usize) -> usize {
        self.line(number).chars().take_while(|c| *c == ' ').count()
    }

    /// The trailing run of blank and comment lines in `from..to`.
    fn comment_block(&self, from: usize, to: usize) -> Vec<String> {
        let mut start = to;
        while start > from && is_comment_line(self.line(start - 1)) {
            start -= 1;
        }
        (start..to).map(|n| self.line(n).to_string()).collect()
    }

    /// Position just past the closing quote of a quoted scalar.
    fn quoted_end(&self, line: usize, col: usize, quote: char) -> Option<(usize, usize)> {
        let mut number = line;
        let mut chars = self.chars(number);
        let mut i = col + 1;
        loop {
            while i < chars.len() {
                match chars[i] {
                    '\\' if quote == '"' => i += 2,
                    '\'' if quote == '\'' && chars.get(i + 1) == Some(&'\'') => i += 2,
                    c if c == quote => return Some((number, i + 1)),
                    _ => i += 1,
                }
            }
            number += 1;
            if number > self.len() {
                return None;
            }
            chars = self.chars(number);
            i = 0;
        }
    }

    /// The text between two positions.
    fn span(&self, from: (usize, usize), to: (usize, usize)) -> String {
        if from.0 == to.0 {
            return self.rest(from.0, from.1).chars().take(to.1 - from.1).collect();
        }
        let mut text = self.rest(from.0, from.1);
        for number in from.0 + 1..to.0 {
            text.push('\n');
            text.push_str(self.line(number));
        }
        text.push('\n');
        text.extend(self.line(to.0).chars().take(to.1));
        text
    }

    /// A `# comment` following `col` on `line`, with its leading whitespace.
    fn trailing_comment(&self, line: usize, col: usize, after_key: bool) -> Option<String> {
        let rest = self.rest(line, col);
        let rest = if after_key {
            rest.strip_prefix(':')?.to_string()
        } else {
            rest
        };
        let starts_blank = rest.starts_with([' ', '\t']);
        (starts_blank && rest.trim_start().starts_with('#')).then(|| rest.trim_end().to_string())
    }
}

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn is_document_marker(line: &str) -> bool {
    line.starts_with("---") || line.starts_with("...")
}

/// Where a block scalar's text ends in the source.
struct BlockExtent {
    text: String,
    header_comment: Option<String>,
    last_line: usize,
    content_col: Option<usize>,
}

struct TreeBuilder<'a> {
    source: SourceLines<'a>,
    open: Vec<Node>,
    anchors: HashMap<usize, Node>,
    content: Option<Node>,
    document_head: Vec<String>,
    /// Last source line already attributed to a node.
    consumed: usize,
    error: Option<DocumentError>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source: SourceLines::new(source),
            open: Vec::new(),
            anchors: HashMap::new(),
            content: None,
            document_head: Vec::new(),
            consumed: 0,
            error: None,
        }
    }

    fn complete(&mut self, node: Node) {
        if let Some(id) = node.anchor {
            self.anchors.insert(id, node.clone());
        }
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                if self.content.is_none() {
                    self.content = Some(node);
                }
            }
        }
    }

    fn in_flow(&self) -> bool {
        self.open.iter().any(|node| node.flow)
    }

    /// True when the next completed node is a key of a block mapping.
    fn expecting_key(&self) -> bool {
        self.open
            .last()
            .is_some_and(|p| p.kind == NodeKind::Mapping && !p.flow && p.children.len() % 2 == 0)
    }

    /// Source column of the key or dash that owns the next completed node.
    fn owner_column(&self) -> Option<usize> {
        let parent = self.open.last()?;
        match parent.kind {
            NodeKind::Mapping if parent.children.len() % 2 == 1 => {
                parent.children.last().and_then(|key| key.column)
            }
            NodeKind::Sequence => parent.column,
            _ => None,
        }
    }

    /// Takes the comment lines between the last attributed line and `line`.
    fn take_head(&mut self, line: usize) -> Vec<String> {
        if line <= self.consumed {
            return Vec::new();
        }
        let head = self.source.comment_block(self.consumed + 1, line);
        self.consumed = line;
        head
    }

    fn document_start(&mut self, mark: Marker) {
        let line = self.source.line(mark.line());
        let bare_marker = line
            .strip_prefix("---")
            .is_some_and(|rest| rest.trim_start().is_empty() || rest.trim_start().starts_with('#'));
        if bare_marker && mark.line() > self.consumed {
            self.document_head = (1..=mark.line())
                .map(|n| self.source.line(n).to_string())
                .collect();
            self.consumed = mark.line();
        }
    }

    fn open(&mut self, kind: NodeKind, anchor: usize, tag: Option<Tag>, mark: Marker) {
        let mut node = Node::empty(kind);
        node.anchor = anchor_id(anchor);
        node.tag = tag_name(tag);
        node.column = Some(mark.col());
        node.flow = matches!(
            self.source.chars(mark.line()).get(mark.col()),
            Some('{' | '[')
        );
        node.head_comment = self.take_head(mark.line());
        self.open.push(node);
    }

    fn close(&mut self, mark: Marker) {
        let Some(mut node) = self.open.pop() else {
            return;
        };
        if node.flow {
            self.consumed = self.consumed.max(mark.line());
            if !self.in_flow() {
                node.line_comment = self
                    .source
                    .trailing_comment(mark.line(), mark.col() + 1, false);
            }
        }
        self.complete(node);
    }

    fn scalar(
        &mut self,
        value: String,
        style: TScalarStyle,
        anchor: usize,
        tag: Option<Tag>,
        mark: Marker,
    ) {
        let mut node = Node {
            style: style.into(),
            anchor: anchor_id(anchor),
            tag: tag_name(tag),
            ..Node::scalar(value)
        };
        // Empty plain scalars carry the marker of whatever token follows them.
        if node.value.is_empty() && node.style == ScalarStyle::Plain {
            self.complete(node);
            return;
        }

        let line = mark.line();
        let col = mark.col();
        node.column = Some(col);
        node.head_comment = self.take_head(line);

        let in_flow = self.in_flow();
        let after_key = self.expecting_key();
        match node.style {
            ScalarStyle::Literal | ScalarStyle::Folded => {
                let owner = self.owner_column();
                let extent = self.block_extent(line, col, owner);
                node.raw = Some(RawScalar {
                    value: node.value.clone(),
                    text: extent.text,
                });
                node.line_comment = extent.header_comment;
                node.indent = extent
                    .content_col
                    .map(|content| content.saturating_sub(owner.unwrap_or(0)));
                self.consumed = extent.last_line;
            }
            ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted => {
                let quote = if node.style == ScalarStyle::SingleQuoted { '\'' } else { '"' };
                if let Some((end_line, end_col)) = self.source.quoted_end(line, col, quote) {
                    self.consumed = self.consumed.max(end_line);
                    node.raw = Some(RawScalar {
                        value: node.value.clone(),
                        text: self.source.span((line, col), (end_line, end_col)),
                    });
                    if !in_flow {
                        node.line_comment =
                            self.source.trailing_comment(end_line, end_col, after_key);
                    }
                }
            }
            ScalarStyle::Plain => {
                let width = node.value.chars().count();
                let written: String = self.source.rest(line, col).chars().take(width).collect();
                if !in_flow && written == node.value {
                    node.line_comment = self.source.trailing_comment(line, col + width, after_key);
                }
            }
        }
        self.complete(node);
    }

    fn block_extent(&self, line: usize, col: usize, owner: Option<usize>) -> BlockExtent {
        let header: String = self.source.rest(line, col);
        let indicator = header.chars().next().unwrap_or('|');
        let indicators: String = header
            .chars()
            .skip(1)
            .take_while(|c| matches!(c, '+' | '-' | '0'..='9'))
            .collect();
        let keep = indicators.contains('+');
        let explicit = indicators
            .chars()
            .find_map(|c| c.to_digit(10))
            .and_then(|d| usize::try_from(d).ok());
        let header_comment =
            self.source
                .trailing_comment(line, col + 1 + indicators.chars().count(), false);

        let floor = owner.map_or(0, |o| o + 1);
        let mut content_col = explicit.map(|d| owner.map_or(d, |o| o + d));
        let mut last_line = line;
        for number in line + 1..=self.source.len() {
            let text = self.source.line(number);
            if text.trim().is_empty() {
                if keep {
                    last_line = number;
                }
                continue;
            }
            let indentation = self.source.indentation(number);
            let required = *content_col.get_or_insert(indentation);
            if indentation < required || indentation < floor {
                if content_col == Some(indentation) && explicit.is_none() {
                    content_col = None;
                }
                break;
            }
            last_line = number;
        }
        let mut text = format!("{indicator}{indicators}\n");
        for number in line + 1..=last_line {
            text.push_str(self.source.line(number));
            text.push('\n');
        }
        BlockExtent {
            text,
            header_comment,
            last_line,
            content_col,
        }
    }

    fn finish(self) -> Result<Node, DocumentError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.open.is_empty() {
            return Err(DocumentError::Parse("unterminated collection".to_string()));
        }
        let end = (self.consumed + 1..=self.source.len())
            .find(|n| is_document_marker(self.source.line(*n)))
            .unwrap_or(self.source.len() + 1);
        let mut document = Node::document(self.content);
        document.head_comment = self.document_head;
        document.foot_comment = self.source.comment_block(self.consumed + 1, end);
        Ok(document)
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        match event {
            Event::DocumentStart => self.document_start(mark),
            Event::Scalar(value, style, anchor, tag) => {
                self.scalar(value, style, anchor, tag, mark);
            }
            Event::SequenceStart(anchor, tag) => {
                self.open(NodeKind::Sequence, anchor, tag, mark);
            }
            Event::MappingStart(anchor, tag) => self.open(NodeKind::Mapping, anchor, tag, mark),
            Event::SequenceEnd | Event::MappingEnd => self.close(mark),
            Event::Alias(id) => match self.anchors.get(&id) {
                Some(target) => {
                    let alias = Node::alias(target.clone());
                    self.complete(alias);
                }
                None => {
                    self.error = Some(DocumentError::Parse(format!(
                        "alias refers to an anchor that is not yet complete (id {id})"
                    )));
                }
            },
            _ => {}
        }
    }
}

const fn anchor_id(id: usize) -> Option<usize> {
    if id == 0 {
        None
    } else {
        Some(id)
    }
}

fn tag_name(tag: Option<Tag>) -> Option<String> {
    tag.map(|tag| match tag.handle.as_str() {
        "!!" | "tag:yaml.org,2002:" => format!("!!{}", tag.suffix),
        handle => format!("{handle}{}", tag.suffix),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tree_shapes() {
        let root = build_tree("a: 1\nb:\n- x\n- 'y'\n").unwrap();
        assert_eq!(root.kind, NodeKind::Document);

        let b = root.get("b").unwrap();
        assert_eq!(b.kind, NodeKind::Sequence);
        assert_eq!(b.children[0].style, ScalarStyle::Plain);
        assert_eq!(b.children[1].style, ScalarStyle::SingleQuoted);
        assert_eq!(root.get("a").unwrap().value, "1");
    }

    #[test]
    fn test_custom_tags_preserved() {
        let root = build_tree("Bucket: !Ref ArtifactBucket\nArn: !GetAtt Fn.Arn\n").unwrap();
        let bucket = root.get("Bucket").unwrap();
        assert_eq!(bucket.tag.as_deref(), Some("!Ref"));
        assert_eq!(bucket.value, "ArtifactBucket");
        assert_eq!(root.get("Arn").unwrap().tag.as_deref(), Some("!GetAtt"));
    }

    #[test]
    fn test_core_tags_normalized() {
        let root = build_tree("v: !!str 10\n").unwrap();
        assert_eq!(root.get("v").unwrap().tag.as_deref(), Some("!!str"));
    }

    #[test]
    fn test_alias_keeps_copy_of_target() {
        let root = build_tree("base: &b\n  x: 1\nother: *b\n").unwrap();
        let base = root.get("base").unwrap();
        assert!(base.anchor.is_some());

        let other = root.get("other").unwrap();
        assert_eq!(other.kind, NodeKind::Alias);
        assert_eq!(other.children[0].get("x").unwrap().value, "1");
    }

    #[test]
    fn test_get_path_and_mutation() {
        let mut root = build_tree("Resources:\n  Fn:\n    Properties:\n      Code: ./src\n").unwrap();
        let path = ["Resources", "Fn", "Properties", "Code"];
        assert_eq!(root.get_path(&path).unwrap().value, "./src");

        *root.get_path_mut(&path).unwrap() = Node::scalar("replaced");
        assert_eq!(root.get_path(&path).unwrap().value, "replaced");
        assert!(root.get_path(&["Resources", "Missing"]).is_none());
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = build_tree("a: [1, 2\n").unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn test_empty_source() {
        let root = build_tree("").unwrap();
        assert_eq!(root.kind, NodeKind::Document);
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_comments_attach_to_following_node() {
        let root = build_tree("# deploy me\n\nResources:   # all of them\n  # the topic\n  Topic: x # inline\n# end\n").unwrap();
        let resources = root.children[0].clone();
        assert_eq!(resources.head_comment, vec!["# deploy me", ""]);

        let (key, value) = resources.pairs().next().unwrap();
        assert_eq!(key.line_comment.as_deref(), Some("   # all of them"));
        assert_eq!(value.head_comment, vec!["  # the topic"]);

        let (topic, x) = value.pairs().next().unwrap();
        assert!(topic.line_comment.is_none());
        assert_eq!(x.line_comment.as_deref(), Some(" # inline"));
        assert_eq!(root.foot_comment, vec!["# end"]);
    }

    #[test]
    fn test_hash_inside_value_is_not_a_comment() {
        let root = build_tree("a: 'x # y'\nb: c#d\n").unwrap();
        assert!(root.get("a").unwrap().line_comment.is_none());
        assert!(root.get("b").unwrap().line_comment.is_none());
    }

    #[test]
    fn test_flow_and_columns_recorded() {
        let root = build_tree("a:\n    b: [1, 2]\n    c: {}\n").unwrap();
        let a = root.get("a").unwrap();
        assert_eq!(a.column, Some(4));
        assert!(!a.flow);
        assert!(a.get("b").unwrap().flow);
        assert!(a.get("c").unwrap().flow);
    }

    #[test]
    fn test_block_scalar_extent() {
        let source = "run: |\n    # not a comment\n    echo hi\n# after\nnext: 1\n";
        let root = build_tree(source).unwrap();
        let run = root.get("run").unwrap();
        assert_eq!(run.style, ScalarStyle::Literal);
        assert_eq!(run.value, "# not a comment\necho hi\n");
        assert_eq!(run.indent, Some(4));
        assert!(run.head_comment.is_empty());

        let next_key = root.children[0].children[2].clone();
        assert_eq!(next_key.head_comment, vec!["# after"]);
    }

    #[test]
    fn test_explicit_document_start_kept() {
        let root = build_tree("# header\n---\na: 1\n").unwrap();
        assert_eq!(root.head_comment, vec!["# header", "---"]);
        assert!(root.children[0].head_comment.is_empty());
    }

    #[test]
    fn test_string_quotes_when_needed() {
        assert_eq!(Node::string("app/code.zip").style, ScalarStyle::Plain);
        assert_eq!(Node::string("123").style, ScalarStyle::SingleQuoted);
        assert_eq!(Node::string("true").style, ScalarStyle::SingleQuoted);
        assert_eq!(Node::string("a: b").style, ScalarStyle::SingleQuoted);
        assert!(Node::string("123").tag.is_none());
    }
}
