//! In-memory object storage and identity service for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

use filedrop_common::{
    AccessKeyInfo, AccessKeyStatus, Credential, Error, RemoteErrorKind, Result, SecretKey,
};

use crate::provider::{AccessKeyApi, ObjectStorage, SessionConnector};

/// Keys an identity may hold at once, mirroring the usual IAM quota.
pub const MAX_KEYS_PER_IDENTITY: usize = 2;

/// In-memory object storage.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. A failure can be injected so every call errors
/// with a chosen kind.
#[derive(Default)]
pub struct MemoryObjectStorage {
    buckets: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    failure: RwLock<Option<RemoteErrorKind>>,
}

impl MemoryObjectStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `bucket`.
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store
            .buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bucket.to_string(), BTreeMap::new());
        store
    }

    /// Make every following call fail with `kind`, or clear with `None`.
    pub fn set_failure(&self, kind: Option<RemoteErrorKind>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = kind;
    }

    /// Stored bytes of an object.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    fn check_failure(&self, operation: &str) -> Result<()> {
        match *self.failure.read().unwrap_or_else(PoisonError::into_inner) {
            Some(kind) => Err(Error::remote(kind, format!("{}: injected failure", operation))),
            None => Ok(()),
        }
    }
}

fn no_such_bucket(bucket: &str) -> Error {
    Error::remote(
        RemoteErrorKind::NotFound,
        format!("Bucket not found: {}", bucket),
    )
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_bucket(&self, bucket: &str, _region: &str) -> Result<()> {
        self.check_failure("create bucket")?;
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        if buckets.contains_key(bucket) {
            return Err(Error::remote(
                RemoteErrorKind::AlreadyExists,
                format!("Bucket already exists: {}", bucket),
            ));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        self.check_failure("put object")?;
        let data = tokio::fs::read(local_path).await?;

        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        self.check_failure("list objects")?;
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(objects.keys().cloned().collect())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.check_failure("delete object")?;
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        objects.remove(key);
        Ok(())
    }
}

/// Access-key operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOperation {
    List,
    Create,
    Delete,
    UpdateStatus,
}

#[derive(Debug)]
struct StoredKey {
    info: AccessKeyInfo,
    secret: SecretKey,
}

/// In-memory identity service.
#[derive(Debug, Default)]
pub struct MemoryAccessKeys {
    identities: RwLock<HashMap<String, Vec<StoredKey>>>,
    failures: RwLock<HashMap<KeyOperation, RemoteErrorKind>>,
}

impl MemoryAccessKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity with no keys.
    pub fn with_identity(self, identity: &str) -> Self {
        self.identities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.to_string(), Vec::new());
        self
    }

    /// Make `operation` fail with `kind`.
    pub fn fail_on(&self, operation: KeyOperation, kind: RemoteErrorKind) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation, kind);
    }

    /// Whether `secret` is the current secret of key `key_id`.
    pub fn secret_matches(&self, identity: &str, key_id: &str, secret: &str) -> bool {
        self.identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .and_then(|keys| keys.iter().find(|k| k.info.id == key_id))
            .is_some_and(|k| k.secret.expose() == secret)
    }

    fn check_failure(&self, operation: KeyOperation) -> Result<()> {
        let failures = self.failures.read().unwrap_or_else(PoisonError::into_inner);
        match failures.get(&operation) {
            Some(kind) => Err(Error::remote(
                *kind,
                format!("{:?}: injected failure", operation),
            )),
            None => Ok(()),
        }
    }
}

fn no_such_identity(identity: &str) -> Error {
    Error::remote(
        RemoteErrorKind::NotFound,
        format!("The user with name {} cannot be found", identity),
    )
}

fn no_such_key(key_id: &str) -> Error {
    Error::remote(
        RemoteErrorKind::NotFound,
        format!("The Access Key with id {} cannot be found", key_id),
    )
}

#[async_trait]
impl AccessKeyApi for MemoryAccessKeys {
    async fn list_keys(&self, identity: &str) -> Result<Vec<AccessKeyInfo>> {
        self.check_failure(KeyOperation::List)?;
        let identities = self.identities.read().unwrap_or_else(PoisonError::into_inner);
        let keys = identities
            .get(identity)
            .ok_or_else(|| no_such_identity(identity))?;
        Ok(keys.iter().map(|k| k.info.clone()).collect())
    }

    async fn create_key(&self, identity: &str) -> Result<Credential> {
        self.check_failure(KeyOperation::Create)?;
        let mut identities = self.identities.write().unwrap_or_else(PoisonError::into_inner);
        let keys = identities
            .get_mut(identity)
            .ok_or_else(|| no_such_identity(identity))?;

        if keys.len() >= MAX_KEYS_PER_IDENTITY {
            return Err(Error::remote(
                RemoteErrorKind::Unknown,
                format!(
                    "Cannot exceed quota for AccessKeysPerUser: {}",
                    MAX_KEYS_PER_IDENTITY
                ),
            ));
        }

        let id = format!("AKIA{}", Uuid::new_v4().simple())
            .to_uppercase()
            .chars()
            .take(20)
            .collect::<String>();
        let secret = SecretKey::new(Uuid::new_v4().simple().to_string());

        keys.push(StoredKey {
            info: AccessKeyInfo {
                id: id.clone(),
                status: AccessKeyStatus::Active,
            },
            secret: secret.clone(),
        });

        Ok(Credential {
            identity: identity.to_string(),
            access_key_id: id,
            secret,
        })
    }

    async fn delete_key(&self, identity: &str, key_id: &str) -> Result<()> {
        self.check_failure(KeyOperation::Delete)?;
        let mut identities = self.identities.write().unwrap_or_else(PoisonError::into_inner);
        let keys = identities
            .get_mut(identity)
            .ok_or_else(|| no_such_identity(identity))?;

        let before = keys.len();
        keys.retain(|k| k.info.id != key_id);
        if keys.len() == before {
            return Err(no_such_key(key_id));
        }
        Ok(())
    }

    async fn update_key_status(
        &self,
        identity: &str,
        key_id: &str,
        status: AccessKeyStatus,
    ) -> Result<()> {
        self.check_failure(KeyOperation::UpdateStatus)?;
        let mut identities = self.identities.write().unwrap_or_else(PoisonError::into_inner);
        let key = identities
            .get_mut(identity)
            .ok_or_else(|| no_such_identity(identity))?
            .iter_mut()
            .find(|k| k.info.id == key_id)
            .ok_or_else(|| no_such_key(key_id))?;
        key.info.status = status;
        Ok(())
    }
}

/// Connector that hands out one shared in-memory store and only accepts
/// credentials the identity service currently knows.
pub struct MemoryConnector {
    storage: Arc<MemoryObjectStorage>,
    keys: Option<Arc<MemoryAccessKeys>>,
    connected: RwLock<HashSet<String>>,
}

impl MemoryConnector {
    /// Connector that accepts any credential.
    pub fn new(storage: Arc<MemoryObjectStorage>) -> Self {
        Self {
            storage,
            keys: None,
            connected: RwLock::new(HashSet::new()),
        }
    }

    /// Connector that rejects credentials unknown to `keys`.
    pub fn verified(storage: Arc<MemoryObjectStorage>, keys: Arc<MemoryAccessKeys>) -> Self {
        Self {
            keys: Some(keys),
            ..Self::new(storage)
        }
    }

    /// Access key ids that have been connected with.
    pub fn connected_key_ids(&self) -> HashSet<String> {
        self.connected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SessionConnector for MemoryConnector {
    async fn connect(
        &self,
        credential: &Credential,
        _region: &str,
    ) -> Result<Arc<dyn ObjectStorage>> {
        if let Some(keys) = &self.keys {
            if !keys.secret_matches(
                &credential.identity,
                &credential.access_key_id,
                credential.secret.expose(),
            ) {
                return Err(Error::remote(
                    RemoteErrorKind::PermissionDenied,
                    "The AWS Access Key Id you provided does not exist in our records",
                ));
            }
        }

        self.connected
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credential.access_key_id.clone());
        Ok(self.storage.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_bucket_lifecycle() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();

        let store = MemoryObjectStorage::new();
        store.create_bucket("b", "eu-north-1").await.unwrap();
        let again = store.create_bucket("b", "eu-north-1").await.unwrap_err();
        assert_eq!(again.remote_kind(), Some(RemoteErrorKind::AlreadyExists));

        store.put_object("b", "k/a.txt", &file).await.unwrap();
        assert_eq!(store.object("b", "k/a.txt").unwrap(), b"hello");
        assert_eq!(store.list_objects("b").await.unwrap(), vec!["k/a.txt"]);

        store.delete_object("b", "k/a.txt").await.unwrap();
        store.delete_object("b", "k/a.txt").await.unwrap();
        assert!(store.list_objects("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_missing_bucket() {
        let store = MemoryObjectStorage::new();
        let err = store.list_objects("nope").await.unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_memory_injected_failure() {
        let store = MemoryObjectStorage::with_bucket("b");
        store.set_failure(Some(RemoteErrorKind::Transient));
        let err = store.list_objects("b").await.unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::Transient));

        store.set_failure(None);
        assert!(store.list_objects("b").await.is_ok());
    }

    #[tokio::test]
    async fn test_access_key_quota() {
        let keys = MemoryAccessKeys::new().with_identity("svc");
        keys.create_key("svc").await.unwrap();
        keys.create_key("svc").await.unwrap();
        assert!(keys.create_key("svc").await.is_err());
    }

    #[tokio::test]
    async fn test_access_key_lifecycle() {
        let keys = MemoryAccessKeys::new().with_identity("svc");
        let credential = keys.create_key("svc").await.unwrap();
        assert!(credential.access_key_id.starts_with("AKIA"));
        assert_eq!(credential.access_key_id.len(), 20);

        keys.update_key_status("svc", &credential.access_key_id, AccessKeyStatus::Inactive)
            .await
            .unwrap();
        let listed = keys.list_keys("svc").await.unwrap();
        assert_eq!(listed[0].status, AccessKeyStatus::Inactive);

        keys.delete_key("svc", &credential.access_key_id).await.unwrap();
        let err = keys
            .delete_key("svc", &credential.access_key_id)
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_unknown_identity() {
        let keys = MemoryAccessKeys::new();
        let err = keys.list_keys("ghost").await.unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_verified_connector_rejects_stale_key() {
        let keys = Arc::new(MemoryAccessKeys::new().with_identity("svc"));
        let connector =
            MemoryConnector::verified(Arc::new(MemoryObjectStorage::new()), keys.clone());

        let credential = keys.create_key("svc").await.unwrap();
        assert!(connector.connect(&credential, "eu-north-1").await.is_ok());

        keys.delete_key("svc", &credential.access_key_id).await.unwrap();
        let err = connector
            .connect(&credential, "eu-north-1")
            .await
            .err()
            .unwrap();
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::PermissionDenied));
    }
}
