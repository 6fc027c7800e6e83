//! Narrow interfaces onto the remote object store and identity service.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use filedrop_common::{AccessKeyInfo, AccessKeyStatus, Credential, Result};

/// Object-storage operations the mirror needs.
///
/// Implementations map every backend failure to `Error::Remote` with a
/// classified kind; they never retry.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Get the backend name (e.g., "s3", "memory").
    fn name(&self) -> &str;

    /// Create a bucket in a region.
    ///
    /// # Errors
    /// - `AlreadyExists` if the bucket exists, including when owned by the caller
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()>;

    /// Upload a local file under `key`, replacing any existing object.
    ///
    /// # Errors
    /// - Local file unreadable
    /// - Bucket missing, permission or transport errors
    async fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;

    /// Every key in the bucket.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>>;

    /// Delete one object. Deleting a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Access-key lifecycle operations for a named identity.
#[async_trait]
pub trait AccessKeyApi: Send + Sync {
    /// Every access key registered for the identity, following pagination.
    async fn list_keys(&self, identity: &str) -> Result<Vec<AccessKeyInfo>>;

    /// Mint a new key. The secret is only available in this response.
    async fn create_key(&self, identity: &str) -> Result<Credential>;

    /// Permanently delete a key.
    async fn delete_key(&self, identity: &str, key_id: &str) -> Result<()>;

    /// Activate or deactivate a key.
    async fn update_key_status(
        &self,
        identity: &str,
        key_id: &str,
        status: AccessKeyStatus,
    ) -> Result<()>;
}

/// Opens an object-storage client bound to a credential and a region.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        credential: &Credential,
        region: &str,
    ) -> Result<Arc<dyn ObjectStorage>>;
}
