//! Template document model.
//!
//! A [`Document`] is a mutable YAML node tree with merge keys resolved. It
//! knows which resource properties point at local build artifacts (via a
//! [`PackageableRegistry`]) and can swap those properties for uploaded
//! locations before serializing back to YAML.
//!
//! ```rust,ignore
//! let mut doc = Document::parse(template.as_bytes())?;
//! for reference in doc.packageable_references(&PackageableRegistry::standard())? {
//!     let location = upload(&reference.local_path).await?;
//!     doc.replace(&reference, &location)?;
//! }
//! let body = doc.to_yaml_string()?;
//! ```

mod emit;
mod node;
mod registry;
mod resolve;

pub use emit::to_value;
pub use node::{build_tree, Node, NodeKind, RawScalar, ScalarStyle};
pub use registry::{
    bucket_key, bucket_key_version, lambda_code, s3_uri, ArtifactLocation,
    PackageableDefinition, PackageableRegistry, RewriteFn,
};
pub use resolve::resolve;

use thiserror::Error;

/// Errors raised while reading, resolving or writing a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The input is not valid UTF-8 YAML.
    #[error("Failed to parse template: {0}")]
    Parse(String),

    /// The template is missing a required structural element.
    #[error("Invalid template: {0}")]
    Schema(String),

    /// An alias appears somewhere other than a merge-key value.
    #[error("Unsupported alias at {path}: only merge keys (<<) may use aliases")]
    UnsupportedAlias {
        /// Dotted path to the alias.
        path: String,
    },

    /// A merge key's value is not a mapping, alias or list of aliases.
    #[error("Invalid merge at {path}: merge value must reference a mapping")]
    InvalidMerge {
        /// Dotted path to the merge key.
        path: String,
    },

    /// A reference no longer matches the document.
    #[error("Property {path} not found in template")]
    MissingProperty {
        /// Dotted path of the property.
        path: String,
    },

    /// The tree cannot be written as YAML.
    #[error("Failed to serialize template: {0}")]
    Emit(String),
}

/// A resource property whose value is a local artifact path.
#[derive(Debug, Clone)]
pub struct PackageableReference {
    /// Logical name of the resource.
    pub logical_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Path from the resource node to the property.
    pub property_path: Vec<String>,
    /// The local path as written in the template.
    pub local_path: String,
    /// Builds the node that replaces the local path.
    pub rewrite: RewriteFn,
}

impl PackageableReference {
    /// Returns the full path from the document root to the property.
    #[must_use]
    pub fn document_path(&self) -> Vec<&str> {
        ["Resources", self.logical_id.as_str()]
            .into_iter()
            .chain(self.property_path.iter().map(String::as_str))
            .collect()
    }
}

/// A parsed and resolved template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Node,
}

impl Document {
    /// Parses and resolves a template.
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        let source = std::str::from_utf8(bytes)
            .map_err(|e| DocumentError::Parse(format!("template is not UTF-8: {e}")))?;
        let mut root = build_tree(source)?;
        resolve(&mut root)?;
        Ok(Self { root })
    }

    /// Returns the document root node.
    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// Looks up a node by a path of mapping keys.
    #[must_use]
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
        self.root.get_path(path)
    }

    /// Lists every property that references a local artifact.
    ///
    /// Resources appear in template order; a resource type with several
    /// registered properties yields one reference per property present.
    pub fn packageable_references(
        &self,
        registry: &PackageableRegistry,
    ) -> Result<Vec<PackageableReference>, DocumentError> {
        let resources = self
            .root
            .get("Resources")
            .filter(|node| node.is_mapping())
            .ok_or_else(|| {
                DocumentError::Schema("no top-level key named `Resources` found in template".to_string())
            })?;

        let mut references = Vec::new();
        for (name, resource) in resources.pairs() {
            let resource_type = resource
                .get("Type")
                .filter(|node| node.kind == NodeKind::Scalar)
                .ok_or_else(|| {
                    DocumentError::Schema(format!("resource `{}` has no `Type`", name.value))
                })?;

            for definition in registry.definitions_for(&resource_type.value) {
                let Some(property) = resource.get_path(&definition.property_path) else {
                    continue;
                };
                if !is_local_path(property) {
                    continue;
                }
                references.push(PackageableReference {
                    logical_id: name.value.clone(),
                    resource_type: resource_type.value.clone(),
                    property_path: definition.property_path.clone(),
                    local_path: property.value.clone(),
                    rewrite: definition.rewrite,
                });
            }
        }
        Ok(references)
    }

    /// Replaces a referenced property with the node built for `location`.
    ///
    /// Comment lines above the old value stay in place, as does a trailing
    /// comment when the replacement is a scalar.
    pub fn replace(
        &mut self,
        reference: &PackageableReference,
        location: &ArtifactLocation,
    ) -> Result<(), DocumentError> {
        let path = reference.document_path();
        let target = self
            .root
            .get_path_mut(&path)
            .ok_or_else(|| DocumentError::MissingProperty {
                path: path.join("."),
            })?;
        let mut replacement = (reference.rewrite)(location);
        replacement.head_comment = std::mem::take(&mut target.head_comment);
        if replacement.kind == NodeKind::Scalar {
            replacement.line_comment = target.line_comment.take();
        }
        *target = replacement;
        Ok(())
    }

    /// Serializes the document back to YAML.
    pub fn to_yaml_string(&self) -> Result<String, DocumentError> {
        emit::to_yaml_string(&self.root)
    }
}

fn is_local_path(node: &Node) -> bool {
    const REMOTE_SCHEMES: [&str; 3] = ["s3://", "http://", "https://"];
    node.is_plain_text()
        && !node.value.is_empty()
        && !REMOTE_SCHEMES.iter().any(|scheme| node.value.starts_with(scheme))
}
