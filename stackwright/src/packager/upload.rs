//! Content-addressed artifact upload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::api::{ObjectStorageApi, PutObjectInput};
use crate::cancellation::CancellationToken;
use crate::document::ArtifactLocation;
use crate::errors::{ApiResultExt, Result};

/// An artifact stored in the artifact bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedArtifact {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Object version; empty if the bucket returned none.
    pub version: String,
    /// True if an identical object was already present and reused.
    pub already_exists: bool,
}

impl UploadedArtifact {
    /// Returns the location to write into the template.
    #[must_use]
    pub fn location(&self) -> ArtifactLocation {
        ArtifactLocation::new(&self.bucket, &self.key, &self.version)
    }
}

/// Returns the object key for an archive built from `local_path`.
///
/// The key is `{prefix}/{name}.zip/{md5}`, without a leading slash when
/// the prefix is empty.
#[must_use]
pub fn object_key(prefix: &str, local_path: &Path, archive: &[u8]) -> String {
    let name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let name = name.strip_suffix(".zip").unwrap_or(&name);
    let hash = hex::encode(Md5::digest(archive));

    format!("{}/{name}.zip/{hash}", prefix.trim_end_matches('/'))
        .trim_start_matches('/')
        .to_string()
}

/// Uploads `archive` under `key` unless the key is already present.
///
/// The archive buffer is moved into the request, not copied.
pub async fn upload_archive(
    storage: &dyn ObjectStorageApi,
    bucket: &str,
    key: String,
    archive: Vec<u8>,
    cancel: &CancellationToken,
) -> Result<UploadedArtifact> {
    let existing = cancel
        .run(storage.head_object(bucket, &key))
        .await?
        .context("HeadObject")?;

    if let Some(head) = existing {
        debug!(bucket, key = %key, "artifact already uploaded");
        return Ok(UploadedArtifact {
            bucket: bucket.to_string(),
            key,
            version: head.version_id.unwrap_or_default(),
            already_exists: true,
        });
    }

    let content_md5 = STANDARD.encode(Md5::digest(&archive));
    let size = archive.len();
    let version = cancel
        .run(storage.put_object(PutObjectInput {
            bucket: bucket.to_string(),
            key: key.clone(),
            body: archive,
            content_md5,
        }))
        .await?
        .context("PutObject")?;

    info!(bucket, key = %key, size, "uploaded artifact");
    Ok(UploadedArtifact {
        bucket: bucket.to_string(),
        key,
        version: version.unwrap_or_default(),
        already_exists: false,
    })
}
