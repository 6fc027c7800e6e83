//! File handler: local store plus remote mirror.

use std::path::PathBuf;
use tracing::{debug, info, warn};

use filedrop_common::{Config, Error, Result};
use filedrop_remote::RemoteMirror;
use filedrop_storage::{IncomingFile, LocalFileStore, StoredFile};

/// Facade over the local store and the remote mirror.
///
/// Every successful local save is followed by one upload attempt under
/// `<remote_prefix>/<relative path>`. The local file is the committed copy;
/// the remote copy is best effort and has its own lifecycle (local deletes
/// never reach the bucket).
pub struct FileHandler {
    store: LocalFileStore,
    mirror: RemoteMirror,
    config: Config,
}

impl FileHandler {
    /// Create a handler over an already built mirror.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - `Error::Process` if the upload or archive root cannot be created
    pub fn new(config: &Config, mirror: RemoteMirror) -> Result<Self> {
        config.validate()?;
        let store = LocalFileStore::new(config)?;
        Ok(Self::from_parts(store, mirror, config))
    }

    /// Assemble from parts.
    pub fn from_parts(store: LocalFileStore, mirror: RemoteMirror, config: &Config) -> Self {
        if !mirror.is_available() {
            warn!("Remote mirror unavailable, saves will be local only");
        }
        Self {
            store,
            mirror,
            config: config.clone(),
        }
    }

    /// Set up local directories, then rotate AWS credentials and open the
    /// mirror session.
    ///
    /// Directory failures are fatal; credential failures only disable
    /// mirroring.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = LocalFileStore::new(config)?;
        let mirror = RemoteMirror::connect_aws(config).await;
        Ok(Self::from_parts(store, mirror, config))
    }

    pub fn store(&self) -> &LocalFileStore {
        &self.store
    }

    pub fn mirror(&self) -> &RemoteMirror {
        &self.mirror
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Root the relative paths resolve against, for serving downloads.
    pub fn upload_root(&self) -> PathBuf {
        self.store.upload_root().to_path_buf()
    }

    /// Save a file locally, then mirror it.
    ///
    /// # Postconditions
    /// - `None` input returns `Ok(None)` with no side effects
    /// - A returned file is on disk whatever the mirror outcome;
    ///   `remote_key` is set only if the upload succeeded
    ///
    /// # Errors
    /// - Local write failures
    pub async fn save(&self, file: Option<IncomingFile>) -> Result<Option<StoredFile>> {
        let Some(mut stored) = self.store.save(file).await? else {
            return Ok(None);
        };

        let key = self.config.remote_key(&stored.relative_path());
        match self.mirror.upload(&stored.local_path, Some(&key)).await {
            Ok(key) => stored.remote_key = Some(key),
            Err(Error::Unavailable(reason)) => {
                debug!("Skipping mirror of {}: {}", stored.path, reason)
            }
            Err(e) => warn!("Mirroring {} failed: {}", stored.path, e),
        }

        info!("Saved {} ({} bytes)", stored.path, stored.size);
        Ok(Some(stored))
    }

    /// Relative paths of every stored file. Empty on listing errors.
    pub async fn list(&self) -> Vec<String> {
        self.store.list().await
    }

    /// Handle a delete request. Errors are logged and reported as `false`.
    pub async fn delete(&self, path: Option<&str>) -> bool {
        match self.store.delete(path).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Delete of {:?} failed: {}", path, e);
                false
            }
        }
    }

    /// Resolve a relative path to a stored file on disk.
    pub async fn locate(&self, path: &str) -> Result<PathBuf> {
        self.store.locate(path).await
    }
}
