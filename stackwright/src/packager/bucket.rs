//! Artifact bucket provisioning.

use std::collections::BTreeMap;
use tracing::info;

use crate::api::{ObjectStorageApi, VersioningStatus};
use crate::cancellation::CancellationToken;
use crate::errors::{ApiErrorKind, ApiResultExt, Result};

/// Makes sure `bucket` exists with versioning enabled.
///
/// A missing bucket is created, versioned and tagged. An existing bucket
/// without versioning gets it enabled. Tags are only applied on creation.
pub async fn ensure_bucket(
    storage: &dyn ObjectStorageApi,
    bucket: &str,
    tags: &BTreeMap<String, String>,
    cancel: &CancellationToken,
) -> Result<()> {
    match cancel.run(storage.get_bucket_versioning(bucket)).await? {
        Ok(VersioningStatus::Enabled) => Ok(()),
        Ok(status) => {
            info!(bucket, ?status, "enabling versioning on artifact bucket");
            cancel
                .run(storage.enable_bucket_versioning(bucket))
                .await?
                .context("PutBucketVersioning")
        }
        Err(err) if err.is_not_found() => {
            info!(bucket, "creating artifact bucket");
            match cancel.run(storage.create_bucket(bucket)).await? {
                Err(err) if err.kind != ApiErrorKind::AlreadyExists => {
                    return Err(err).context("CreateBucket");
                }
                _ => {}
            }
            cancel
                .run(storage.enable_bucket_versioning(bucket))
                .await?
                .context("PutBucketVersioning")?;
            if !tags.is_empty() {
                cancel
                    .run(storage.put_bucket_tagging(bucket, tags))
                    .await?
                    .context("PutBucketTagging")?;
            }
            Ok(())
        }
        Err(err) => Err(err).context("GetBucketVersioning"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockObjectStorageApi;
    use crate::errors::ApiError;

    #[tokio::test]
    async fn test_missing_bucket_created_versioned_and_tagged() {
        let mut storage = MockObjectStorageApi::new();
        storage
            .expect_get_bucket_versioning()
            .withf(|bucket| bucket == "artifacts")
            .returning(|_| Err(ApiError::not_found("NoSuchBucket")));
        storage
            .expect_create_bucket()
            .times(1)
            .returning(|_| Ok(()));
        storage
            .expect_enable_bucket_versioning()
            .times(1)
            .returning(|_| Ok(()));
        storage
            .expect_put_bucket_tagging()
            .times(1)
            .returning(|_, _| Ok(()));

        let tags = BTreeMap::from([("owner".to_string(), "platform".to_string())]);
        ensure_bucket(&storage, "artifacts", &tags, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_suspended_bucket_gets_versioning() {
        let mut storage = MockObjectStorageApi::new();
        storage
            .expect_get_bucket_versioning()
            .returning(|_| Ok(VersioningStatus::Suspended));
        storage
            .expect_enable_bucket_versioning()
            .times(1)
            .returning(|_| Ok(()));
        storage.expect_create_bucket().never();

        ensure_bucket(&storage, "artifacts", &BTreeMap::new(), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_versioned_bucket_untouched() {
        let mut storage = MockObjectStorageApi::new();
        storage
            .expect_get_bucket_versioning()
            .returning(|_| Ok(VersioningStatus::Enabled));
        storage.expect_enable_bucket_versioning().never();

        ensure_bucket(&storage, "artifacts", &BTreeMap::new(), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bucket_owned_by_caller_is_tolerated() {
        let mut storage = MockObjectStorageApi::new();
        storage
            .expect_get_bucket_versioning()
            .returning(|_| Err(ApiError::not_found("NoSuchBucket")));
        storage.expect_create_bucket().returning(|_| {
            Err(ApiError::new(
                ApiErrorKind::AlreadyExists,
                "BucketAlreadyOwnedByYou",
                "owned",
            ))
        });
        storage
            .expect_enable_bucket_versioning()
            .returning(|_| Ok(()));

        ensure_bucket(&storage, "artifacts", &BTreeMap::new(), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_access_denied_propagates() {
        let mut storage = MockObjectStorageApi::new();
        storage.expect_get_bucket_versioning().returning(|_| {
            Err(ApiError::new(ApiErrorKind::Other, "AccessDenied", "denied"))
        });

        let err = ensure_bucket(&storage, "artifacts", &BTreeMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("GetBucketVersioning failed"));
    }
}
