//! In-memory object storage and identity.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::api::{
    CallerIdentity, IdentityApi, ObjectHead, ObjectStorageApi, PutObjectInput, VersioningStatus,
};
use crate::errors::{ApiError, ApiErrorKind};

#[derive(Debug)]
struct FakeBucket {
    versioning: VersioningStatus,
    tags: BTreeMap<String, String>,
    objects: HashMap<String, (Vec<u8>, Option<String>)>,
}

impl FakeBucket {
    fn new(versioning: VersioningStatus) -> Self {
        Self {
            versioning,
            tags: BTreeMap::new(),
            objects: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    buckets: HashMap<String, FakeBucket>,
    put_count: usize,
    next_version: u64,
}

/// An in-memory bucket store.
///
/// Versioned buckets assign `v1`, `v2`, ... to each upload. Uploads whose
/// Content-MD5 does not match the body are rejected.
#[derive(Debug, Default)]
pub struct FakeObjectStore {
    state: Mutex<StoreState>,
}

impl FakeObjectStore {
    /// Creates a store with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a versioned bucket directly.
    pub fn create_bucket_now(&self, bucket: &str) {
        self.state
            .lock()
            .buckets
            .insert(bucket.to_string(), FakeBucket::new(VersioningStatus::Enabled));
    }

    /// Creates a bucket with the given versioning status directly.
    pub fn create_bucket_with_versioning(&self, bucket: &str, versioning: VersioningStatus) {
        self.state
            .lock()
            .buckets
            .insert(bucket.to_string(), FakeBucket::new(versioning));
    }

    /// Returns the number of successful uploads.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.state.lock().put_count
    }

    /// Returns the number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.state.lock().buckets.len()
    }

    /// Returns true if `bucket` exists with versioning enabled.
    #[must_use]
    pub fn is_versioned(&self, bucket: &str) -> bool {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .is_some_and(|b| b.versioning == VersioningStatus::Enabled)
    }

    /// Returns the tags on `bucket`.
    #[must_use]
    pub fn bucket_tags(&self, bucket: &str) -> BTreeMap<String, String> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .map(|b| b.tags.clone())
            .unwrap_or_default()
    }

    /// Returns the stored bytes of an object.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|(body, _)| body.clone())
    }
}

fn no_such_bucket(bucket: &str) -> ApiError {
    ApiError::new(
        ApiErrorKind::NotFound,
        "NoSuchBucket",
        format!("The specified bucket does not exist: {bucket}"),
    )
}

#[async_trait]
impl ObjectStorageApi for FakeObjectStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>, ApiError> {
        let state = self.state.lock();
        let bucket = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(bucket.objects.get(key).map(|(_, version)| ObjectHead {
            version_id: version.clone(),
        }))
    }

    async fn put_object(&self, input: PutObjectInput) -> Result<Option<String>, ApiError> {
        if STANDARD.encode(Md5::digest(&input.body)) != input.content_md5 {
            return Err(ApiError::new(
                ApiErrorKind::Validation,
                "BadDigest",
                "The Content-MD5 you specified did not match what we received.",
            ));
        }

        let mut state = self.state.lock();
        let versioning = state
            .buckets
            .get(&input.bucket)
            .map(|b| b.versioning)
            .ok_or_else(|| no_such_bucket(&input.bucket))?;
        let version = if versioning == VersioningStatus::Enabled {
            state.next_version += 1;
            Some(format!("v{}", state.next_version))
        } else {
            None
        };
        state.put_count += 1;
        if let Some(bucket) = state.buckets.get_mut(&input.bucket) {
            bucket
                .objects
                .insert(input.key, (input.body, version.clone()));
        }
        Ok(version)
    }

    async fn get_bucket_versioning(&self, bucket: &str) -> Result<VersioningStatus, ApiError> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .map(|b| b.versioning)
            .ok_or_else(|| no_such_bucket(bucket))
    }

    async fn enable_bucket_versioning(&self, bucket: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        entry.versioning = VersioningStatus::Enabled;
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        if state.buckets.contains_key(bucket) {
            return Err(ApiError::new(
                ApiErrorKind::AlreadyExists,
                "BucketAlreadyOwnedByYou",
                format!("Bucket {bucket} already exists and is owned by you"),
            ));
        }
        state
            .buckets
            .insert(bucket.to_string(), FakeBucket::new(VersioningStatus::Unversioned));
        Ok(())
    }

    async fn put_bucket_tagging(
        &self,
        bucket: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        entry.tags.clone_from(tags);
        Ok(())
    }
}

/// An identity that always reports the same account.
#[derive(Debug)]
pub struct StaticIdentity {
    account: String,
    calls: AtomicUsize,
}

impl StaticIdentity {
    /// Creates an identity for `account`.
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times the identity was queried.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityApi for StaticIdentity {
    async fn caller_identity(&self) -> Result<CallerIdentity, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CallerIdentity {
            account: self.account.clone(),
            arn: format!("arn:aws:iam::{}:user/stackwright", self.account),
        })
    }
}
