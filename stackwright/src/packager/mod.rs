//! Artifact packaging.
//!
//! The [`Packager`] finds every local artifact a template references, zips
//! each one, uploads it to a versioned bucket under a content-addressed key
//! and rewrites the template to point at the uploaded objects.

mod archive;
mod bucket;
mod upload;

pub use archive::{archive_path, is_zip};
pub use bucket::ensure_bucket;
pub use upload::{object_key, upload_archive, UploadedArtifact};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::api::{IdentityApi, ObjectStorageApi};
use crate::cancellation::{CancellationToken, SlotTaskGroup};
use crate::config::PackagerConfig;
use crate::document::{Document, PackageableRegistry};
use crate::errors::{ApiResultExt, DeployError, Result};

/// A template rewritten to reference uploaded artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagedTemplate {
    /// The rewritten template body.
    pub body: String,
    /// Uploaded artifacts, in reference order.
    pub artifacts: Vec<UploadedArtifact>,
}

/// Uploads local artifacts referenced by templates.
pub struct Packager {
    storage: Arc<dyn ObjectStorageApi>,
    identity: Arc<dyn IdentityApi>,
    config: PackagerConfig,
    registry: PackageableRegistry,
    cancel: Arc<CancellationToken>,
    bucket: OnceCell<String>,
}

impl Packager {
    /// Creates a packager with the standard registry.
    #[must_use]
    pub fn new(
        storage: Arc<dyn ObjectStorageApi>,
        identity: Arc<dyn IdentityApi>,
        config: PackagerConfig,
    ) -> Self {
        Self {
            storage,
            identity,
            config,
            registry: PackageableRegistry::standard(),
            cancel: Arc::new(CancellationToken::new()),
            bucket: OnceCell::new(),
        }
    }

    /// Replaces the packageable property registry.
    #[must_use]
    pub fn with_registry(mut self, registry: PackageableRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PackagerConfig {
        &self.config
    }

    /// Returns the artifact bucket, creating or versioning it on first use.
    pub async fn bucket_name(&self) -> Result<&str> {
        let name = self
            .bucket
            .get_or_try_init(|| async {
                let identity = self
                    .cancel
                    .run(self.identity.caller_identity())
                    .await?
                    .context("GetCallerIdentity")?;
                let name = self.config.bucket_name(&identity.account);
                ensure_bucket(
                    self.storage.as_ref(),
                    &name,
                    &self.config.bucket_tags,
                    &self.cancel,
                )
                .await?;
                debug!(bucket = %name, "artifact bucket ready");
                Ok::<_, DeployError>(name)
            })
            .await?;
        Ok(name.as_str())
    }

    /// Zips and uploads a single local path.
    ///
    /// The archive is built in memory on a blocking thread, hashed for its
    /// key and then uploaded in one request.
    pub async fn upload(&self, prefix: &str, path: &Path) -> Result<UploadedArtifact> {
        let bucket = self.bucket_name().await?.to_string();
        upload_path(
            self.storage.clone(),
            bucket,
            prefix.to_string(),
            path.to_path_buf(),
            self.cancel.clone(),
        )
        .await
    }

    /// Packages the template at `template_path`.
    ///
    /// Local paths in the template are resolved against its directory.
    pub async fn package_file(&self, prefix: &str, template_path: &Path) -> Result<PackagedTemplate> {
        let body = tokio::fs::read(template_path)
            .await
            .map_err(|e| DeployError::io(template_path, e))?;
        let base_dir = template_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        self.package(prefix, &base_dir, &body).await
    }

    /// Uploads every artifact `template` references and rewrites it.
    ///
    /// Relative local paths are resolved against `base_dir`. All uploads
    /// finish before the template is touched; the first failure aborts the
    /// rest and nothing already uploaded is removed.
    pub async fn package(
        &self,
        prefix: &str,
        base_dir: &Path,
        template: &[u8],
    ) -> Result<PackagedTemplate> {
        let mut document = Document::parse(template)?;
        let references = document.packageable_references(&self.registry)?;
        if references.is_empty() {
            debug!("template references no local artifacts");
            return Ok(PackagedTemplate {
                body: document.to_yaml_string()?,
                artifacts: Vec::new(),
            });
        }

        let bucket = self.bucket_name().await?.to_string();
        // The group cancels its own token on failure; the packager's token stays usable.
        let mut group: SlotTaskGroup<UploadedArtifact, DeployError> =
            SlotTaskGroup::new(Arc::new(CancellationToken::new()));
        for reference in &references {
            let outer = self.cancel.clone();
            let storage = self.storage.clone();
            let bucket = bucket.clone();
            let prefix = prefix.to_string();
            let path = base_dir.join(&reference.local_path);
            group.spawn(move |cancel| async move {
                outer
                    .run(upload_path(storage, bucket, prefix, path, cancel))
                    .await?
            });
        }
        let artifacts = group.join().await?;

        for (reference, artifact) in references.iter().zip(&artifacts) {
            document.replace(reference, &artifact.location())?;
        }

        info!(
            bucket = %bucket,
            artifacts = artifacts.len(),
            reused = artifacts.iter().filter(|a| a.already_exists).count(),
            "packaged template"
        );
        Ok(PackagedTemplate {
            body: document.to_yaml_string()?,
            artifacts,
        })
    }
}

impl std::fmt::Debug for Packager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packager")
            .field("config", &self.config)
            .field("registry_len", &self.registry.len())
            .field("bucket", &self.bucket.get())
            .finish_non_exhaustive()
    }
}

async fn upload_path(
    storage: Arc<dyn ObjectStorageApi>,
    bucket: String,
    prefix: String,
    path: PathBuf,
    cancel: Arc<CancellationToken>,
) -> Result<UploadedArtifact> {
    let (path, archive) = tokio::task::spawn_blocking(move || {
        let archive = archive_path(&path);
        (path, archive)
    })
    .await?;
    let archive = archive?;
    let key = object_key(&prefix, &path, &archive);
    upload_archive(storage.as_ref(), &bucket, key, archive, &cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeObjectStore, StaticIdentity};
    use std::fs;

    const TEMPLATE: &str = "\
Resources:
  Handler:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: src
      Runtime: python3.12
";

    fn packager(store: Arc<FakeObjectStore>) -> Packager {
        Packager::new(
            store,
            Arc::new(StaticIdentity::new("123456789012")),
            PackagerConfig::new("eu-west-1").with_bucket_tag("team", "infra"),
        )
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/app.py"), "def handler(e, c): return 1\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_bucket_created_once_and_memoized() {
        let store = Arc::new(FakeObjectStore::new());
        let packager = packager(store.clone());

        let first = packager.bucket_name().await.unwrap().to_string();
        let second = packager.bucket_name().await.unwrap().to_string();

        assert_eq!(first, "stackwright-eu-west-1-123456789012");
        assert_eq!(first, second);
        assert!(store.is_versioned(&first));
        assert_eq!(
            store.bucket_tags(&first).get("team").map(String::as_str),
            Some("infra")
        );
    }

    #[tokio::test]
    async fn test_package_rewrites_code_uri() {
        let dir = project();
        let store = Arc::new(FakeObjectStore::new());
        let packager = packager(store.clone());

        let packaged = packager
            .package("web", dir.path(), TEMPLATE.as_bytes())
            .await
            .unwrap();

        assert_eq!(packaged.artifacts.len(), 1);
        let artifact = &packaged.artifacts[0];
        assert!(artifact.key.starts_with("web/src.zip/"));
        assert!(!artifact.already_exists);

        let reparsed: serde_yaml::Value = serde_yaml::from_str(&packaged.body).unwrap();
        let code = &reparsed["Resources"]["Handler"]["Properties"]["CodeUri"];
        assert_eq!(code["Bucket"].as_str(), Some(artifact.bucket.as_str()));
        assert_eq!(code["Key"].as_str(), Some(artifact.key.as_str()));
        assert_eq!(code["Version"].as_str(), Some(artifact.version.as_str()));
    }

    #[tokio::test]
    async fn test_identical_content_reused() {
        let dir = project();
        let store = Arc::new(FakeObjectStore::new());
        let packager = packager(store.clone());

        let first = packager.upload("web", &dir.path().join("src")).await.unwrap();
        let second = packager.upload("web", &dir.path().join("src")).await.unwrap();

        assert!(!first.already_exists);
        assert!(second.already_exists);
        assert_eq!(first.key, second.key);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_uploaded_object_is_the_hashed_archive() {
        let dir = project();
        let store = Arc::new(FakeObjectStore::new());
        let packager = packager(store.clone());

        let artifact = packager.upload("web", &dir.path().join("src")).await.unwrap();

        let archive = archive_path(&dir.path().join("src")).unwrap();
        let stored = store.object(&artifact.bucket, &artifact.key).unwrap();
        assert_eq!(stored, archive);
        assert_eq!(artifact.key, object_key("web", &dir.path().join("src"), &archive));
    }

    #[tokio::test]
    async fn test_changed_content_gets_new_key() {
        let dir = project();
        let store = Arc::new(FakeObjectStore::new());
        let packager = packager(store.clone());

        let first = packager.upload("web", &dir.path().join("src")).await.unwrap();
        fs::write(dir.path().join("src/app.py"), "def handler(e, c): return 2\n").unwrap();
        let second = packager.upload("web", &dir.path().join("src")).await.unwrap();

        assert_ne!(first.key, second.key);
        assert!(!second.already_exists);
        assert_eq!(store.put_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_packaging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeObjectStore::new());
        let packager = packager(store.clone());

        let err = packager
            .package("web", dir.path(), TEMPLATE.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Io { .. }));
        assert_eq!(store.put_count(), 0);

        let project = project();
        packager.upload("web", &project.path().join("src")).await.unwrap();
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_template_without_artifacts_skips_bucket() {
        let store = Arc::new(FakeObjectStore::new());
        let packager = packager(store.clone());

        let template = "Resources:\n  Topic:\n    Type: AWS::SNS::Topic\n";
        let packaged = packager
            .package("web", Path::new("."), template.as_bytes())
            .await
            .unwrap();

        assert_eq!(packaged.body, template);
        assert!(packaged.artifacts.is_empty());
        assert_eq!(store.bucket_count(), 0);
    }

    #[tokio::test]
    async fn test_package_file_resolves_relative_to_template() {
        let dir = project();
        let template_path = dir.path().join("template.yml");
        fs::write(&template_path, TEMPLATE).unwrap();

        let store = Arc::new(FakeObjectStore::new());
        let packaged = packager(store)
            .package_file("", &template_path)
            .await
            .unwrap();
        assert!(packaged.artifacts[0].key.starts_with("src.zip/"));
    }
}
