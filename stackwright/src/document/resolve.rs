//! Alias and merge-key resolution.
//!
//! After resolution a tree contains no alias nodes and no anchors. Merge
//! keys (`<<`) splice the pairs of the aliased mapping into the mapping
//! that holds them; keys written explicitly in that mapping always win.

use std::collections::HashSet;

use super::node::{Node, NodeKind, ScalarStyle};
use super::DocumentError;

/// Resolves every merge key under `node`, in place.
///
/// An alias anywhere other than a merge-key value is rejected with
/// [`DocumentError::UnsupportedAlias`].
pub fn resolve(node: &mut Node) -> Result<(), DocumentError> {
    resolve_at(node, &mut Vec::new())
}

fn resolve_at(node: &mut Node, path: &mut Vec<String>) -> Result<(), DocumentError> {
    node.anchor = None;
    match node.kind {
        NodeKind::Scalar => Ok(()),
        NodeKind::Alias => Err(DocumentError::UnsupportedAlias {
            path: display_path(path),
        }),
        NodeKind::Mapping => resolve_mapping(node, path),
        NodeKind::Document => {
            for child in &mut node.children {
                resolve_at(child, path)?;
            }
            Ok(())
        }
        NodeKind::Sequence => {
            for (index, child) in node.children.iter_mut().enumerate() {
                path.push(index.to_string());
                resolve_at(child, path)?;
                path.pop();
            }
            Ok(())
        }
    }
}

fn resolve_mapping(node: &mut Node, path: &mut Vec<String>) -> Result<(), DocumentError> {
    let pairs = take_pairs(node, path)?;
    let explicit: HashSet<String> = pairs
        .iter()
        .filter(|(key, _)| !is_merge_key(key))
        .map(|(key, _)| key.value.clone())
        .collect();

    let mut resolved: Vec<(Node, Node)> = Vec::with_capacity(pairs.len());
    for (key, mut value) in pairs {
        if is_merge_key(&key) {
            path.push("<<".to_string());
            let merged = merge_sources(value, path)?;
            path.pop();
            for (merged_key, merged_value) in merged {
                let shadowed = explicit.contains(&merged_key.value)
                    || resolved.iter().any(|(k, _)| k.value == merged_key.value);
                if !shadowed {
                    resolved.push((merged_key, merged_value));
                }
            }
        } else {
            path.push(key.value.clone());
            resolve_at(&mut value, path)?;
            path.pop();
            resolved.push((key, value));
        }
    }

    node.children = resolved
        .into_iter()
        .flat_map(|(key, value)| [key, value])
        .collect();
    Ok(())
}

/// Returns the resolved pairs a merge value contributes, earlier sources first.
fn merge_sources(value: Node, path: &mut Vec<String>) -> Result<Vec<(Node, Node)>, DocumentError> {
    match value.kind {
        NodeKind::Alias => {
            let mut target = value
                .children
                .into_iter()
                .next()
                .ok_or_else(|| DocumentError::InvalidMerge {
                    path: display_path(path),
                })?;
            if target.kind != NodeKind::Mapping {
                return Err(DocumentError::InvalidMerge {
                    path: display_path(path),
                });
            }
            resolve_at(&mut target, path)?;
            take_pairs(&mut target, path)
        }
        NodeKind::Mapping => {
            let mut inline = value;
            resolve_at(&mut inline, path)?;
            take_pairs(&mut inline, path)
        }
        NodeKind::Sequence => {
            let mut merged: Vec<(Node, Node)> = Vec::new();
            for source in value.children {
                if source.kind != NodeKind::Alias {
                    return Err(DocumentError::InvalidMerge {
                        path: display_path(path),
                    });
                }
                for (key, val) in merge_sources(source, path)? {
                    if !merged.iter().any(|(k, _)| k.value == key.value) {
                        merged.push((key, val));
                    }
                }
            }
            Ok(merged)
        }
        NodeKind::Scalar | NodeKind::Document => Err(DocumentError::InvalidMerge {
            path: display_path(path),
        }),
    }
}

fn take_pairs(node: &mut Node, path: &[String]) -> Result<Vec<(Node, Node)>, DocumentError> {
    let children = std::mem::take(&mut node.children);
    if children.len() % 2 != 0 {
        return Err(DocumentError::Parse(format!(
            "mapping at {} has a key without a value",
            display_path(path)
        )));
    }
    let mut pairs = Vec::with_capacity(children.len() / 2);
    let mut iter = children.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        pairs.push((key, value));
    }
    Ok(pairs)
}

fn is_merge_key(key: &Node) -> bool {
    key.kind == NodeKind::Scalar
        && key.value == "<<"
        && key.style == ScalarStyle::Plain
        && matches!(key.tag.as_deref(), None | Some("!" | "!!merge"))
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::node::build_tree;

    fn resolved(source: &str) -> Node {
        let mut root = build_tree(source).unwrap();
        resolve(&mut root).unwrap();
        root
    }

    fn keys(node: &Node) -> Vec<String> {
        node.pairs().map(|(k, _)| k.value.clone()).collect()
    }

    #[test]
    fn test_merge_matches_longhand() {
        let merged = resolved(
            "base: &base\n  Runtime: python3.12\n  Timeout: 30\nfn:\n  <<: *base\n  Handler: app.main\n",
        );
        let longhand = resolved(
            "base:\n  Runtime: python3.12\n  Timeout: 30\nfn:\n  Runtime: python3.12\n  Timeout: 30\n  Handler: app.main\n",
        );
        assert_eq!(merged, longhand);
    }

    #[test]
    fn test_explicit_key_wins_regardless_of_position() {
        let root = resolved("base: &base\n  a: 1\n  b: 2\nx:\n  b: 9\n  <<: *base\n");
        let x = root.get("x").unwrap();

        assert_eq!(keys(x), vec!["b", "a"]);
        assert_eq!(x.get("b").unwrap().value, "9");
    }

    #[test]
    fn test_chained_merges() {
        let root = resolved(
            "one: &one\n  a: 1\ntwo: &two\n  <<: *one\n  b: 2\nthree:\n  <<: *two\n  c: 3\n",
        );
        let three = root.get("three").unwrap();
        assert_eq!(keys(three), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_sequence_earlier_source_wins() {
        let root = resolved("p: &p\n  k: first\nq: &q\n  k: second\n  z: 1\nr:\n  <<: [*p, *q]\n");
        let r = root.get("r").unwrap();
        assert_eq!(r.get("k").unwrap().value, "first");
        assert_eq!(r.get("z").unwrap().value, "1");
    }

    #[test]
    fn test_tagged_merge_key() {
        let root = resolved("b: &b\n  a: 1\nc:\n  !!merge <<: *b\n");
        assert_eq!(root.get("c").unwrap().get("a").unwrap().value, "1");
    }

    #[test]
    fn test_anchors_are_stripped() {
        let root = resolved("base: &base\n  a: 1\nx:\n  <<: *base\n");
        assert!(root.get("base").unwrap().anchor.is_none());
    }

    #[test]
    fn test_plain_alias_rejected() {
        let mut root = build_tree("a: &v hello\nb: *v\n").unwrap();
        let err = resolve(&mut root).unwrap_err();
        match err {
            DocumentError::UnsupportedAlias { path } => assert_eq!(path, "b"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_merge_of_scalar_rejected() {
        let mut root = build_tree("s: &s text\nm:\n  <<: *s\n").unwrap();
        assert!(matches!(
            resolve(&mut root),
            Err(DocumentError::InvalidMerge { .. })
        ));
    }

    #[test]
    fn test_quoted_merge_key_is_ordinary() {
        let root = resolved("m:\n  '<<': literal\n");
        assert_eq!(root.get("m").unwrap().get("<<").unwrap().value, "literal");
    }
}
