//! Access-key rotation and storage sessions.

use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use filedrop_common::{AccessKeyStatus, Config, Credential, Result};

use crate::provider::{AccessKeyApi, ObjectStorage, SessionConnector};

/// Object-storage client bound to a credential and a region.
#[derive(Clone)]
pub struct Session {
    credential: Credential,
    region: String,
    storage: Arc<dyn ObjectStorage>,
}

impl Session {
    pub fn new(
        credential: Credential,
        region: impl Into<String>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            credential,
            region: region.into(),
            storage,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_key_id", &self.credential.access_key_id)
            .field("region", &self.region)
            .field("storage", &self.storage.name())
            .finish()
    }
}

/// Rotates the access keys of one identity and opens sessions with the
/// new key.
///
/// Rotation deletes every existing key of the identity, including keys
/// another running instance may rely on. Only one instance should run
/// against an identity at a time.
pub struct CredentialProvisioner {
    keys: Arc<dyn AccessKeyApi>,
    connector: Arc<dyn SessionConnector>,
    identity: String,
    region: String,
}

impl CredentialProvisioner {
    pub fn new(
        keys: Arc<dyn AccessKeyApi>,
        connector: Arc<dyn SessionConnector>,
        identity: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            connector,
            identity: identity.into(),
            region: region.into(),
        }
    }

    /// Provisioner for the identity and region named in `config`.
    pub fn from_config(
        keys: Arc<dyn AccessKeyApi>,
        connector: Arc<dyn SessionConnector>,
        config: &Config,
    ) -> Self {
        Self::new(keys, connector, &config.identity_name, &config.region)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Delete every access key of the identity. Returns how many were deleted.
    ///
    /// Stops at the first failing delete.
    pub async fn clear_keys(&self) -> Result<usize> {
        let existing = self.keys.list_keys(&self.identity).await?;
        for key in &existing {
            info!("Deleting access key {} of {}", key.id, self.identity);
            self.keys.delete_key(&self.identity, &key.id).await?;
        }
        Ok(existing.len())
    }

    /// Replace all keys of the identity with exactly one new key.
    ///
    /// # Postconditions
    /// - The identity holds exactly one key: the returned one
    ///
    /// # Errors
    /// - Listing, deletion, or creation failed; nothing is retried
    pub async fn rotate(&self) -> Result<Credential> {
        let cleared = self.clear_keys().await?;
        let credential = self.keys.create_key(&self.identity).await?;
        info!(
            "Rotated access keys of {}: removed {}, created {}",
            self.identity, cleared, credential.access_key_id
        );
        Ok(credential)
    }

    /// Rotate and open a session with the new key.
    pub async fn open_session(&self) -> Result<Session> {
        let credential = self.rotate().await?;
        let storage = self.connector.connect(&credential, &self.region).await?;
        Ok(Session::new(credential, self.region.clone(), storage))
    }

    /// Startup entry point: open a session or degrade to `None`.
    ///
    /// Failures are logged; the caller keeps running with remote
    /// mirroring disabled.
    pub async fn initialize(&self) -> Option<Session> {
        match self.open_session().await {
            Ok(session) => {
                info!(
                    "Storage session ready for {} in {}",
                    self.identity, self.region
                );
                Some(session)
            }
            Err(e) => {
                error!("Credential provisioning for {} failed: {}", self.identity, e);
                warn!("Remote mirroring disabled for this process");
                None
            }
        }
    }

    /// Activate or deactivate one key of the identity.
    pub async fn set_key_status(&self, key_id: &str, status: AccessKeyStatus) -> Result<()> {
        info!("Setting access key {} of {} to {}", key_id, self.identity, status);
        self.keys
            .update_key_status(&self.identity, key_id, status)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{KeyOperation, MemoryAccessKeys, MemoryConnector, MemoryObjectStorage};
    use filedrop_common::RemoteErrorKind;

    const IDENTITY: &str = "user-flask-rest-api";

    fn fixture() -> (Arc<MemoryAccessKeys>, Arc<MemoryConnector>, CredentialProvisioner) {
        let keys = Arc::new(MemoryAccessKeys::new().with_identity(IDENTITY));
        let connector = Arc::new(MemoryConnector::verified(
            Arc::new(MemoryObjectStorage::new()),
            keys.clone(),
        ));
        let provisioner =
            CredentialProvisioner::new(keys.clone(), connector.clone(), IDENTITY, "eu-north-1");
        (keys, connector, provisioner)
    }

    #[tokio::test]
    async fn test_initialize_with_no_prior_keys() {
        let (keys, connector, provisioner) = fixture();

        let session = provisioner.initialize().await.unwrap();
        assert_eq!(session.region(), "eu-north-1");

        let listed = keys.list_keys(IDENTITY).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, session.credential().access_key_id);
        assert!(connector
            .connected_key_ids()
            .contains(&session.credential().access_key_id));
    }

    #[tokio::test]
    async fn test_second_start_invalidates_first() {
        let (keys, _connector, provisioner) = fixture();

        let first = provisioner.initialize().await.unwrap();
        let second = provisioner.initialize().await.unwrap();

        let listed = keys.list_keys(IDENTITY).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, second.credential().access_key_id);
        assert_ne!(first.credential().access_key_id, second.credential().access_key_id);
        assert!(!keys.secret_matches(
            IDENTITY,
            &first.credential().access_key_id,
            first.credential().secret.expose()
        ));
    }

    #[tokio::test]
    async fn test_rotation_frees_quota() {
        let (keys, _connector, provisioner) = fixture();
        keys.create_key(IDENTITY).await.unwrap();
        keys.create_key(IDENTITY).await.unwrap();

        let credential = provisioner.rotate().await.unwrap();
        let listed = keys.list_keys(IDENTITY).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, credential.access_key_id);
    }

    #[tokio::test]
    async fn test_initialize_degrades_on_failure() {
        for operation in [KeyOperation::List, KeyOperation::Delete, KeyOperation::Create] {
            let (keys, _connector, provisioner) = fixture();
            keys.create_key(IDENTITY).await.unwrap();
            keys.fail_on(operation, RemoteErrorKind::PermissionDenied);

            assert!(provisioner.initialize().await.is_none());
        }
    }

    #[tokio::test]
    async fn test_rotate_preserves_error_kind() {
        let (keys, _connector, provisioner) = fixture();
        keys.fail_on(KeyOperation::Create, RemoteErrorKind::Transient);

        let err = provisioner.rotate().await.unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::Transient));
    }

    #[tokio::test]
    async fn test_unknown_identity_degrades() {
        let keys = Arc::new(MemoryAccessKeys::new());
        let connector = Arc::new(MemoryConnector::new(Arc::new(MemoryObjectStorage::new())));
        let provisioner = CredentialProvisioner::new(keys, connector, "ghost", "eu-north-1");

        assert!(provisioner.initialize().await.is_none());
    }

    #[tokio::test]
    async fn test_set_key_status() {
        let (keys, _connector, provisioner) = fixture();
        let credential = provisioner.rotate().await.unwrap();

        provisioner
            .set_key_status(&credential.access_key_id, AccessKeyStatus::Inactive)
            .await
            .unwrap();
        assert_eq!(
            keys.list_keys(IDENTITY).await.unwrap()[0].status,
            AccessKeyStatus::Inactive
        );
    }

    #[test]
    fn test_session_debug_hides_secret() {
        let session = Session::new(
            Credential {
                identity: IDENTITY.to_string(),
                access_key_id: "AKIAEXAMPLE".to_string(),
                secret: filedrop_common::SecretKey::new("topsecret"),
            },
            "eu-north-1",
            Arc::new(MemoryObjectStorage::new()),
        );
        let rendered = format!("{:?}", session);
        assert!(rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("topsecret"));
    }
}
