//! Conversion of a node tree to YAML text.
//!
//! The emitter writes nodes the way they were read: scalar styles, tags,
//! flow collections, block indentation and comment lines all come from the
//! node. Nodes built in code fall back to two-space block mappings and
//! block sequences at the parent key's indentation.

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};
use std::fmt::Write as _;

use super::node::{Node, NodeKind, ScalarStyle};
use super::DocumentError;

/// Serializes a resolved tree.
///
/// A tree parsed from text and left unmodified is written back byte for
/// byte, provided the text ends in a newline.
pub fn to_yaml_string(node: &Node) -> Result<String, DocumentError> {
    let mut emitter = Emitter::default();
    if node.kind == NodeKind::Document {
        emitter.document(node)?;
    } else {
        emitter.root(node)?;
    }
    Ok(emitter.out)
}

/// Converts a resolved tree to a `serde_yaml` value.
pub fn to_value(node: &Node) -> Result<Value, DocumentError> {
    let value = match node.kind {
        NodeKind::Document => return node.children.first().map_or(Ok(Value::Null), to_value),
        NodeKind::Alias => return Err(unresolved_alias()),
        NodeKind::Mapping => {
            let mut mapping = Mapping::new();
            for pair in node.children.chunks(2) {
                let [key, value] = pair else {
                    return Err(dangling_key());
                };
                mapping.insert(to_value(key)?, to_value(value)?);
            }
            Value::Mapping(mapping)
        }
        NodeKind::Sequence => Value::Sequence(
            node.children
                .iter()
                .map(to_value)
                .collect::<Result<_, _>>()?,
        ),
        NodeKind::Scalar => scalar_value(node),
    };
    Ok(with_local_tag(node.tag.as_deref(), value))
}

/// Returns true if `text` can be written unquoted and reads back as a string.
pub(crate) fn plain_reads_as_string(text: &str) -> bool {
    plain_safe(text, false) && matches!(plain_value(text), Value::String(_))
}

fn scalar_value(node: &Node) -> Value {
    match node.tag.as_deref() {
        Some("!!str") => Value::String(node.value.clone()),
        Some("!!null") => Value::Null,
        Some("!!bool" | "!!int" | "!!float") => plain_value(&node.value),
        _ if node.style == ScalarStyle::Plain => plain_value(&node.value),
        _ => Value::String(node.value.clone()),
    }
}

/// Types an unquoted scalar the way a YAML loader would.
fn plain_value(text: &str) -> Value {
    match serde_yaml::from_str::<Value>(text) {
        Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_))) => value,
        _ => Value::String(text.to_string()),
    }
}

fn with_local_tag(tag: Option<&str>, value: Value) -> Value {
    match tag.and_then(|t| t.strip_prefix('!')) {
        Some(name) if !name.is_empty() && !name.starts_with('!') => {
            Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(name),
                value,
            }))
        }
        _ => value,
    }
}

fn unresolved_alias() -> DocumentError {
    DocumentError::UnsupportedAlias {
        path: "<unresolved>".to_string(),
    }
}

fn dangling_key() -> DocumentError {
    DocumentError::Emit("mapping has a key without a value".to_string())
}

/// The key or dash a value is written after.
#[derive(Clone, Copy)]
struct Owner<'a> {
    /// Output column of the key or dash.
    col: usize,
    /// Source column of the key or dash.
    source_col: Option<usize>,
    /// True for a sequence dash.
    dash: bool,
    /// Comment trailing the key when the value starts on the next line.
    comment: Option<&'a str>,
}

const ROOT: Owner<'static> = Owner {
    col: 0,
    source_col: None,
    dash: false,
    comment: None,
};

impl Owner<'_> {
    /// True when the value is written at the column it was read from.
    fn in_place(&self) -> bool {
        self.source_col.unwrap_or(0) == self.col
    }

    /// Output column for a block collection value owned by this key or dash.
    fn child_col(&self, node: &Node) -> usize {
        let (min, default) = match (node.kind, self.dash) {
            (NodeKind::Sequence, false) => (0, 0),
            (NodeKind::Sequence, true) => (2, 2),
            _ => (1, 2),
        };
        let offset = node
            .column
            .zip(self.source_col)
            .and_then(|(child, owner)| child.checked_sub(owner))
            .filter(|offset| *offset >= min)
            .unwrap_or(default);
        self.col + offset
    }
}

#[derive(Default)]
struct Emitter {
    out: String,
}

impl Emitter {
    fn lines(&mut self, lines: &[String]) {
        for line in lines {
            self.out.push_str(line);
            self.out.push('\n');
        }
    }

    fn pad(&mut self, width: usize) {
        self.out.extend(std::iter::repeat(' ').take(width));
    }

    fn document(&mut self, node: &Node) -> Result<(), DocumentError> {
        self.lines(&node.head_comment);
        if let Some(content) = node.children.first() {
            self.root(content)?;
        }
        self.lines(&node.foot_comment);
        Ok(())
    }

    fn root(&mut self, node: &Node) -> Result<(), DocumentError> {
        if node.is_block_collection() && node.tag.is_none() {
            self.lines(&node.head_comment);
            return self.block_collection(node, 0, false);
        }
        if !node.is_block_collection() {
            self.lines(&node.head_comment);
        }
        self.inline_value(node, ROOT, "")
    }

    fn block_collection(
        &mut self,
        node: &Node,
        col: usize,
        first_inline: bool,
    ) -> Result<(), DocumentError> {
        if node.kind == NodeKind::Mapping {
            self.block_mapping(node, col, first_inline)
        } else {
            self.block_sequence(node, col, first_inline)
        }
    }

    fn block_mapping(
        &mut self,
        node: &Node,
        col: usize,
        first_inline: bool,
    ) -> Result<(), DocumentError> {
        for (index, pair) in node.children.chunks(2).enumerate() {
            let [key, value] = pair else {
                return Err(dangling_key());
            };
            if !(first_inline && index == 0) {
                self.lines(&key.head_comment);
                self.pad(col);
            }
            let key_text = inline_text(key, false)?;
            self.out.push_str(&key_text);
            self.out.push(':');
            let owner = Owner {
                col,
                source_col: key.column,
                dash: false,
                comment: key.line_comment.as_deref(),
            };
            self.value(value, owner)?;
        }
        Ok(())
    }

    fn block_sequence(
        &mut self,
        node: &Node,
        col: usize,
        first_inline: bool,
    ) -> Result<(), DocumentError> {
        for (index, item) in node.children.iter().enumerate() {
            let nested = item.is_block_collection() && item.tag.is_none();
            if !(first_inline && index == 0) {
                if nested {
                    self.leading_heads(item);
                } else if !item.is_block_collection() {
                    self.lines(&item.head_comment);
                }
                self.pad(col);
            }
            self.out.push('-');
            let owner = Owner {
                col,
                source_col: node.column,
                dash: true,
                comment: None,
            };
            if nested {
                let child_col = owner.child_col(item).max(col + 2);
                self.pad(child_col - col - 1);
                self.block_collection(item, child_col, true)?;
            } else {
                self.value(item, owner)?;
            }
        }
        Ok(())
    }

    /// Writes the comment lines of a collection that starts on a dash line,
    /// along with those of its first entry.
    fn leading_heads(&mut self, node: &Node) {
        self.lines(&node.head_comment);
        if let Some(first) = node.children.first() {
            if node.kind == NodeKind::Sequence && first.is_block_collection() && first.tag.is_none() {
                self.leading_heads(first);
            } else {
                self.lines(&first.head_comment);
            }
        }
    }

    /// Writes a value after `key:` or `-`, through the end of its last line.
    fn value(&mut self, node: &Node, owner: Owner<'_>) -> Result<(), DocumentError> {
        let own_line = !owner.dash
            && node.kind == NodeKind::Scalar
            && !node.style.is_block()
            && !node.head_comment.is_empty();
        if !own_line {
            return self.inline_value(node, owner, " ");
        }
        if let Some(comment) = owner.comment {
            self.out.push_str(comment);
        }
        self.out.push('\n');
        self.lines(&node.head_comment);
        self.pad(owner.col + 2);
        self.inline_value(node, Owner { comment: None, ..owner }, "")
    }

    fn inline_value(
        &mut self,
        node: &Node,
        owner: Owner<'_>,
        lead: &str,
    ) -> Result<(), DocumentError> {
        if node.kind == NodeKind::Alias {
            return Err(unresolved_alias());
        }
        let tag = node.tag.as_deref().map(tag_text);

        if node.is_block_collection() {
            if let Some(tag) = &tag {
                self.out.push_str(lead);
                self.out.push_str(tag);
            }
            if let Some(comment) = owner.comment {
                self.out.push_str(comment);
            }
            self.out.push('\n');
            self.lines(&node.head_comment);
            let col = owner.child_col(node);
            return self.block_collection(node, col, false);
        }

        let raw = raw_text(node, owner.in_place());
        if node.kind == NodeKind::Scalar
            && node.style.is_block()
            && (raw.is_some() || block_compatible(node))
        {
            self.out.push_str(lead);
            if let Some(tag) = &tag {
                self.out.push_str(tag);
                self.out.push(' ');
            }
            if let Some((header, content)) = raw.and_then(|text| text.split_once('\n')) {
                self.out.push_str(header);
                if let Some(comment) = node.line_comment.as_deref() {
                    self.out.push_str(comment);
                }
                self.out.push('\n');
                self.out.push_str(content);
                return Ok(());
            }
            return self.block_scalar(node, owner);
        }

        let text = match raw {
            Some(raw) if !node.style.is_block() => match &tag {
                Some(tag) => format!("{tag} {raw}"),
                None => raw.to_string(),
            },
            _ => inline_text(node, false)?,
        };
        if !text.is_empty() {
            self.out.push_str(lead);
            self.out.push_str(&text);
        }
        if let Some(comment) = node.line_comment.as_deref().or(owner.comment) {
            self.out.push_str(comment);
        }
        self.out.push('\n');
        Ok(())
    }

    fn block_scalar(&mut self, node: &Node, owner: Owner<'_>) -> Result<(), DocumentError> {
        let body = node.value.trim_end_matches('\n');
        let trailing = node.value.len() - body.len();
        let indent = node.indent.filter(|i| (1..=9).contains(i)).unwrap_or(2);
        let folded = node.style == ScalarStyle::Folded && foldable(body);

        self.out.push(if folded { '>' } else { '|' });
        match trailing {
            0 => self.out.push('-'),
            1 => {}
            _ => self.out.push('+'),
        }
        let first_text = body.split('\n').find(|line| !line.is_empty());
        if first_text.is_some_and(|line| line.starts_with(' ')) {
            write!(self.out, "{indent}").map_err(|e| DocumentError::Emit(e.to_string()))?;
        }
        if let Some(comment) = node.line_comment.as_deref() {
            self.out.push_str(comment);
        }
        self.out.push('\n');

        let col = owner.col + indent;
        let mut seen_text = false;
        for line in body.split('\n') {
            if folded && seen_text && !line.is_empty() {
                self.out.push('\n');
            }
            if !line.is_empty() {
                self.pad(col);
                self.out.push_str(line);
                seen_text = true;
            }
            self.out.push('\n');
        }
        for _ in 1..trailing {
            self.out.push('\n');
        }
        Ok(())
    }
}

/// Block scalars with carriage returns or no text are written quoted.
fn block_compatible(node: &Node) -> bool {
    !node.value.trim_end_matches('\n').is_empty() && !node.value.contains('\r')
}

/// Folding cannot express lines that start with whitespace.
fn foldable(body: &str) -> bool {
    body.split('\n')
        .all(|line| !line.starts_with([' ', '\t']))
}

/// The scalar's source text, while its value is unchanged. Text spanning
/// lines is only usable where it was read from.
fn raw_text(node: &Node, in_place: bool) -> Option<&str> {
    node.raw
        .as_ref()
        .filter(|raw| raw.value == node.value && (in_place || !raw.text.contains('\n')))
        .map(|raw| raw.text.as_str())
}

fn tag_text(tag: &str) -> String {
    if tag.starts_with('!') {
        tag.to_string()
    } else {
        format!("!<{tag}>")
    }
}

/// Writes a node on a single line, collections in flow form.
fn inline_text(node: &Node, in_flow: bool) -> Result<String, DocumentError> {
    let body = match node.kind {
        NodeKind::Alias => return Err(unresolved_alias()),
        NodeKind::Document => match node.children.first() {
            Some(content) => inline_text(content, in_flow)?,
            None => String::new(),
        },
        NodeKind::Scalar => scalar_text(node, in_flow),
        NodeKind::Mapping => {
            let mut entries = Vec::with_capacity(node.children.len() / 2);
            for pair in node.children.chunks(2) {
                let [key, value] = pair else {
                    return Err(dangling_key());
                };
                let key = inline_text(key, true)?;
                let value = inline_text(value, true)?;
                entries.push(if value.is_empty() {
                    format!("{key}:")
                } else {
                    format!("{key}: {value}")
                });
            }
            format!("{{{}}}", entries.join(", "))
        }
        NodeKind::Sequence => {
            let items = node
                .children
                .iter()
                .map(|item| inline_text(item, true))
                .collect::<Result<Vec<_>, _>>()?;
            format!("[{}]", items.join(", "))
        }
    };
    Ok(match node.tag.as_deref().map(tag_text) {
        Some(tag) if body.is_empty() => tag,
        Some(tag) => format!("{tag} {body}"),
        None => body,
    })
}

fn scalar_text(node: &Node, in_flow: bool) -> String {
    if let Some(raw) = raw_text(node, false).filter(|_| !node.style.is_block()) {
        return raw.to_string();
    }
    let text = node.value.as_str();
    match node.style {
        ScalarStyle::Plain if text.is_empty() => String::new(),
        ScalarStyle::Plain if plain_safe(text, in_flow) => text.to_string(),
        ScalarStyle::Plain | ScalarStyle::SingleQuoted if single_quotable(text) => {
            format!("'{}'", text.replace('\'', "''"))
        }
        _ => double_quoted(text),
    }
}

fn plain_safe(text: &str, in_flow: bool) -> bool {
    const INDICATORS: &[char] = &[
        '[', ']', '{', '}', ',', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
    ];
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let second = chars.next();
    if INDICATORS.contains(&first)
        || (matches!(first, '-' | '?' | ':') && second.map_or(true, char::is_whitespace))
    {
        return false;
    }
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        return false;
    }
    if text.contains(": ") || text.contains(" #") || text.ends_with(':') {
        return false;
    }
    if text.chars().any(char::is_control) {
        return false;
    }
    !(in_flow && text.contains([',', '[', ']', '{', '}']))
}

fn single_quotable(text: &str) -> bool {
    !text.chars().any(char::is_control)
}

fn double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::node::build_tree;
    use pretty_assertions::assert_eq;

    fn emit(source: &str) -> String {
        to_yaml_string(&build_tree(source).unwrap()).unwrap()
    }

    fn assert_roundtrip(source: &str) {
        assert_eq!(emit(source), source);
    }

    #[test]
    fn test_scalar_typing() {
        let root = build_tree("n: 10\nq: '10'\nb: true\nz: ~\ns: hello\n").unwrap();
        let value = to_value(&root).unwrap();

        assert_eq!(value["n"].as_i64(), Some(10));
        assert_eq!(value["q"].as_str(), Some("10"));
        assert_eq!(value["b"].as_bool(), Some(true));
        assert!(value["z"].is_null());
        assert_eq!(value["s"].as_str(), Some("hello"));
    }

    #[test]
    fn test_local_tags_emitted() {
        assert_roundtrip("Bucket: !Ref ArtifactBucket\n");
    }

    #[test]
    fn test_quoted_scalars_keep_their_quotes() {
        assert_roundtrip("Port: '8080'\n");
        assert_roundtrip("Description: \"Lambda stack\"\n");
        assert_roundtrip("Name: !Sub '${AWS::StackName}-fn'\nEmpty: ''\n");
    }

    #[test]
    fn test_comments_survive() {
        assert_roundtrip("# deploy me\nResources: {}\n");
        assert_roundtrip("Handler: index.handler # entry\n");
        assert_roundtrip(
            "\
# header

Resources:   # all resources
  # the queue
  Queue:
    Type: AWS::SQS::Queue

# outputs follow
Outputs: {}
# trailing
",
        );
    }

    #[test]
    fn test_block_scalars() {
        assert_roundtrip("Script: |\n  set -e\n  # not a comment\n\n  echo done\nNext: 1\n");
        assert_roundtrip("Strip: |-\n    no newline\nKeep: |+\n    kept\n\nFolded: >\n  one\n  two\n\n  three\n");
        assert_roundtrip("Indented: |2\n    leading spaces\n");
        assert_roundtrip("Header: |  # shell\n  echo hi\n");
    }

    #[test]
    fn test_multiline_quoted_scalar() {
        assert_roundtrip("Policy: \"line one\n  line two\"\nNext: 1\n");
        assert_roundtrip("Escaped: \"caf\\u00e9\"\n");
    }

    #[test]
    fn test_built_block_scalars() {
        let literal = Node {
            style: ScalarStyle::Literal,
            ..Node::scalar("a\n  b\n\n")
        };
        assert_eq!(to_yaml_string(&literal).unwrap(), "|+\n  a\n    b\n\n");

        let folded = Node {
            style: ScalarStyle::Folded,
            ..Node::scalar("one two\nthree")
        };
        assert_eq!(to_yaml_string(&folded).unwrap(), ">-\n  one two\n\n  three\n");
    }

    #[test]
    fn test_edited_scalar_drops_source_text() {
        let mut root = build_tree("Description: \"old\"\n").unwrap();
        root.get_path_mut(&["Description"]).unwrap().value = "new text".to_string();
        assert_eq!(to_yaml_string(&root).unwrap(), "Description: \"new text\"\n");
    }

    #[test]
    fn test_indentation_and_flow() {
        assert_roundtrip("Resources:\n    Fn:\n        Layers: [a, b]\n        Env: {A: '1'}\n");
        assert_roundtrip("Statement:\n  - Effect: Allow\n    Action:\n    - s3:GetObject\n  - Effect: Deny\n");
        assert_roundtrip("Items:\n- - a\n  - b\n- c\n");
        assert_roundtrip("Value: !If [HasName, !Ref Name, !Ref AWS::NoValue]\n");
    }

    #[test]
    fn test_tagged_block_collection() {
        assert_roundtrip("Value: !Join\n  - ''\n  - - a\n    - b\n");
        assert_roundtrip("Items:\n- !Sub\n  # body\n  Name: x\n");
    }

    #[test]
    fn test_sequence_item_comments() {
        assert_roundtrip("Items:\n  # first\n  - a\n  # second\n  - b: 1\n    c: 2\n");
    }

    #[test]
    fn test_explicit_document_start() {
        assert_roundtrip("---\nAWSTemplateFormatVersion: '2010-09-09'\n");
    }

    #[test]
    fn test_built_nodes_use_defaults() {
        let node = Node::document(Some(Node::mapping([
            (
                Node::scalar("Code"),
                Node::mapping([
                    (Node::scalar("S3Bucket"), Node::string("artifacts")),
                    (Node::scalar("S3ObjectVersion"), Node::string("42")),
                ]),
            ),
            (
                Node::scalar("Layers"),
                Node::sequence([Node::string("a: b"), Node::string("plain")]),
            ),
            (Node::scalar("Empty"), Node::mapping([])),
        ])));

        assert_eq!(
            to_yaml_string(&node).unwrap(),
            "Code:\n  S3Bucket: artifacts\n  S3ObjectVersion: '42'\nLayers:\n- 'a: b'\n- plain\nEmpty: {}\n"
        );
    }

    #[test]
    fn test_double_quoted_escapes() {
        let node = Node {
            style: ScalarStyle::DoubleQuoted,
            ..Node::scalar("tab\there \"q\"\n")
        };
        assert_eq!(to_yaml_string(&node).unwrap(), "\"tab\\there \\\"q\\\"\\n\"\n");
    }

    #[test]
    fn test_unresolved_alias_rejected() {
        let root = build_tree("a: &x 1\nb: *x\n").unwrap();
        assert!(matches!(
            to_yaml_string(&root),
            Err(DocumentError::UnsupportedAlias { .. })
        ));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(emit(""), "");
        assert_eq!(emit("# only a comment\n"), "# only a comment\n");
    }
}
