//! Registry of resource properties that reference local build artifacts.

use serde::{Deserialize, Serialize};

use super::node::Node;

/// Where an artifact ended up after upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Object version; empty when the bucket did not return one.
    pub version: String,
}

impl ArtifactLocation {
    /// Creates a location.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version: version.into(),
        }
    }

    /// Returns `s3://bucket/key`, with `?versionId=` when a version is known.
    #[must_use]
    pub fn s3_uri(&self) -> String {
        let mut uri = format!("s3://{}/{}", self.bucket, self.key);
        if !self.version.is_empty() {
            uri.push_str("?versionId=");
            uri.push_str(&self.version);
        }
        uri
    }
}

/// Builds the replacement node for a packaged property.
pub type RewriteFn = fn(&ArtifactLocation) -> Node;

/// A property of a resource type whose value is a local artifact path.
#[derive(Debug, Clone)]
pub struct PackageableDefinition {
    /// Resource type, e.g. "AWS::Lambda::Function".
    pub resource_type: String,
    /// Path from the resource node to the property.
    pub property_path: Vec<String>,
    /// Builds the node that replaces the local path.
    pub rewrite: RewriteFn,
}

/// The set of packageable properties, keyed by resource type.
#[derive(Debug, Clone, Default)]
pub struct PackageableRegistry {
    definitions: Vec<PackageableDefinition>,
}

impl PackageableRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in definition.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with("AWS::ApiGateway::RestApi", &["Properties", "BodyS3Location"], bucket_key_version)
            .with("AWS::Lambda::Function", &["Properties", "Code"], lambda_code)
            .with("AWS::Serverless::Function", &["Properties", "CodeUri"], bucket_key_version)
            .with("AWS::AppSync::GraphQLSchema", &["Properties", "DefinitionS3Location"], s3_uri)
            .with(
                "AWS::AppSync::Resolver",
                &["Properties", "RequestMappingTemplateS3Location"],
                s3_uri,
            )
            .with(
                "AWS::AppSync::Resolver",
                &["Properties", "ResponseMappingTemplateS3Location"],
                s3_uri,
            )
            .with("AWS::Serverless::Api", &["Properties", "DefinitionUri"], bucket_key_version)
            .with("AWS::Include", &["Properties", "Location"], s3_uri)
            .with(
                "AWS::ElasticBeanstalk::ApplicationVersion",
                &["Properties", "SourceBundle"],
                bucket_key,
            )
            .with("AWS::CloudFormation::Stack", &["Properties", "TemplateURL"], s3_uri)
    }

    /// Adds a definition.
    ///
    /// # Panics
    ///
    /// Panics if `property_path` is empty.
    #[must_use]
    pub fn with(mut self, resource_type: &str, property_path: &[&str], rewrite: RewriteFn) -> Self {
        self.register(resource_type, property_path, rewrite);
        self
    }

    /// Adds a definition in place.
    ///
    /// # Panics
    ///
    /// Panics if `property_path` is empty.
    pub fn register(&mut self, resource_type: &str, property_path: &[&str], rewrite: RewriteFn) {
        assert!(
            !property_path.is_empty(),
            "packageable definition for {resource_type} has an empty property path"
        );
        self.definitions.push(PackageableDefinition {
            resource_type: resource_type.to_string(),
            property_path: property_path.iter().map(ToString::to_string).collect(),
            rewrite,
        });
    }

    /// Returns every definition for `resource_type`, in registration order.
    pub fn definitions_for<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a PackageableDefinition> + 'a {
        self.definitions
            .iter()
            .filter(move |d| d.resource_type == resource_type)
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if the registry has no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn object(
    bucket_field: &str,
    key_field: &str,
    version_field: Option<&str>,
    location: &ArtifactLocation,
) -> Node {
    let mut pairs = vec![
        (Node::scalar(bucket_field), Node::string(&location.bucket)),
        (Node::scalar(key_field), Node::string(&location.key)),
    ];
    if let Some(field) = version_field.filter(|_| !location.version.is_empty()) {
        pairs.push((Node::scalar(field), Node::string(&location.version)));
    }
    Node::mapping(pairs)
}

/// `{Bucket, Key, Version}`.
pub fn bucket_key_version(location: &ArtifactLocation) -> Node {
    object("Bucket", "Key", Some("Version"), location)
}

/// `{Bucket, Key}`, never versioned.
pub fn bucket_key(location: &ArtifactLocation) -> Node {
    object("Bucket", "Key", None, location)
}

/// `{S3Bucket, S3Key, S3ObjectVersion}`.
pub fn lambda_code(location: &ArtifactLocation) -> Node {
    object("S3Bucket", "S3Key", Some("S3ObjectVersion"), location)
}

/// A single `s3://` URI string.
pub fn s3_uri(location: &ArtifactLocation) -> Node {
    Node::string(location.s3_uri())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_all_types() {
        let registry = PackageableRegistry::standard();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.definitions_for("AWS::AppSync::Resolver").count(), 2);
        assert_eq!(registry.definitions_for("AWS::SNS::Topic").count(), 0);
    }

    #[test]
    fn test_s3_uri_with_and_without_version() {
        let versioned = ArtifactLocation::new("b", "k.zip/abc", "v1");
        assert_eq!(versioned.s3_uri(), "s3://b/k.zip/abc?versionId=v1");

        let plain = ArtifactLocation::new("b", "k.zip/abc", "");
        assert_eq!(plain.s3_uri(), "s3://b/k.zip/abc");
    }

    #[test]
    fn test_object_rewrite_omits_empty_version() {
        let node = lambda_code(&ArtifactLocation::new("bucket", "key", ""));
        assert_eq!(node.get("S3Bucket").unwrap().value, "bucket");
        assert!(node.get("S3ObjectVersion").is_none());

        let node = lambda_code(&ArtifactLocation::new("bucket", "key", "v2"));
        assert_eq!(node.get("S3ObjectVersion").unwrap().value, "v2");
    }

    #[test]
    fn test_beanstalk_bundle_is_never_versioned() {
        let node = bucket_key(&ArtifactLocation::new("bucket", "key", "v2"));
        assert_eq!(node.pairs().count(), 2);
    }

    #[test]
    #[should_panic(expected = "empty property path")]
    fn test_empty_property_path_panics() {
        let _ = PackageableRegistry::new().with("Custom::Thing", &[], s3_uri);
    }

    #[test]
    fn test_custom_definition() {
        let registry = PackageableRegistry::new().with(
            "Custom::Bundle",
            &["Properties", "Artifact"],
            s3_uri,
        );
        let def = registry.definitions_for("Custom::Bundle").next().unwrap();
        assert_eq!(def.property_path, vec!["Properties", "Artifact"]);
    }
}
