//! Object storage and identity API seams.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ApiError;

/// Versioning state of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningStatus {
    /// Versioning was never enabled.
    Unversioned,
    /// Versioning is on.
    Enabled,
    /// Versioning was turned off after being enabled.
    Suspended,
}

/// Metadata of an existing object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectHead {
    /// Version ID of the current object version.
    pub version_id: Option<String>,
}

/// An object upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectInput {
    /// Destination bucket.
    pub bucket: String,
    /// Destination key.
    pub key: String,
    /// Object bytes.
    ///
    /// The whole object is held in memory: artifact keys embed the MD5 of
    /// the complete archive, so an archive is fully built before its upload
    /// starts. Bodies are sized for function bundles and templates.
    pub body: Vec<u8>,
    /// Base64 MD5 of `body`, checked by the provider.
    pub content_md5: String,
}

/// The remote object storage service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorageApi: Send + Sync {
    /// Returns object metadata, or `None` if the key does not exist.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>, ApiError>;

    /// Uploads an object and returns the version ID the provider assigned.
    async fn put_object(&self, input: PutObjectInput) -> Result<Option<String>, ApiError>;

    /// Returns the bucket's versioning state; a missing bucket is `NotFound`.
    async fn get_bucket_versioning(&self, bucket: &str) -> Result<VersioningStatus, ApiError>;

    /// Enables versioning on a bucket.
    async fn enable_bucket_versioning(&self, bucket: &str) -> Result<(), ApiError>;

    /// Creates a bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<(), ApiError>;

    /// Replaces a bucket's tags.
    async fn put_bucket_tagging(
        &self,
        bucket: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), ApiError>;
}

/// The identity of the caller's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Account ID.
    pub account: String,
    /// ARN of the calling principal.
    pub arn: String,
}

/// The remote identity service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Returns the identity behind the current credentials.
    async fn caller_identity(&self) -> Result<CallerIdentity, ApiError>;
}
