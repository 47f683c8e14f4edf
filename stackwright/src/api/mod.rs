//! Remote API seams.
//!
//! The engine talks to three collaborators through async traits:
//! - [`ProvisioningApi`] for stacks, change sets and events
//! - [`ObjectStorageApi`] for the artifact bucket
//! - [`IdentityApi`] for the caller's account
//!
//! Implementations classify failures with [`crate::errors::ApiErrorKind`].
//! In-memory implementations live in [`crate::testing`].

mod provisioning;
mod storage;

pub use provisioning::{
    ChangeSetDescription, ChangeSetHandle, CreateChangeSetInput, DeleteStackInput,
    ProvisioningApi, StackEventPage, TemplateStage,
};
pub use storage::{
    CallerIdentity, IdentityApi, ObjectHead, ObjectStorageApi, PutObjectInput, VersioningStatus,
};

#[cfg(test)]
pub use provisioning::MockProvisioningApi;
#[cfg(test)]
pub use storage::{MockIdentityApi, MockObjectStorageApi};
