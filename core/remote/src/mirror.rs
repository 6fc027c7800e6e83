//! Best-effort mirror of local files into one bucket.

use std::path::Path;
use tracing::{info, warn};

use filedrop_common::{Config, Error, Result};

use crate::credentials::Session;

/// Remote mirror over an optional session.
///
/// Without a session every operation fails with `Error::Unavailable`
/// instead of reaching the network.
#[derive(Debug)]
pub struct RemoteMirror {
    session: Option<Session>,
    bucket: String,
}

impl RemoteMirror {
    pub fn new(session: Option<Session>, bucket: impl Into<String>) -> Self {
        Self {
            session,
            bucket: bucket.into(),
        }
    }

    /// Mirror with no session.
    pub fn disabled(bucket: impl Into<String>) -> Self {
        Self::new(None, bucket)
    }

    /// Provision AWS credentials and mirror into the configured bucket.
    ///
    /// Provisioning failures leave the mirror disabled.
    pub async fn connect_aws(config: &Config) -> Self {
        let session = crate::aws::provisioner(config).await.initialize().await;
        Self::new(session, &config.bucket_name)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.session.is_some()
    }

    fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or_else(|| {
            Error::Unavailable(format!("no storage session for bucket {}", self.bucket))
        })
    }

    /// Create the bucket in the session's region.
    ///
    /// An existing bucket is reported as `AlreadyExists`. Failures are
    /// logged here and returned.
    pub async fn ensure_bucket(&self) -> Result<()> {
        let session = self.require_session()?;
        if let Err(e) = session
            .storage()
            .create_bucket(&self.bucket, session.region())
            .await
        {
            warn!("Creating bucket {} failed: {}", self.bucket, e);
            return Err(e);
        }
        info!("Created bucket {} in {}", self.bucket, session.region());
        Ok(())
    }

    /// Upload a local file. `key` defaults to the file's base name.
    ///
    /// Returns the key written. Existing objects are overwritten.
    pub async fn upload(&self, local_path: &Path, key: Option<&str>) -> Result<String> {
        let session = self.require_session()?;
        let key = match key {
            Some(key) => key.to_string(),
            None => local_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    Error::InvalidInput(format!("{} has no file name", local_path.display()))
                })?,
        };

        session
            .storage()
            .put_object(&self.bucket, &key, local_path)
            .await?;
        info!("Mirrored {} to {}/{}", local_path.display(), self.bucket, key);
        Ok(key)
    }

    /// Every key in the bucket. Failures are logged here and returned.
    pub async fn list_objects(&self) -> Result<Vec<String>> {
        let session = self.require_session()?;
        session
            .storage()
            .list_objects(&self.bucket)
            .await
            .inspect_err(|e| warn!("Listing bucket {} failed: {}", self.bucket, e))
    }

    /// Delete every object, one at a time. Returns how many were deleted.
    ///
    /// Not atomic: a failure stops the sweep and leaves the remaining
    /// objects in place.
    pub async fn clear_bucket(&self) -> Result<usize> {
        let keys = self.list_objects().await?;
        let session = self.require_session()?;

        let mut deleted = 0;
        for key in &keys {
            info!("Deleting {}/{}", self.bucket, key);
            if let Err(e) = session.storage().delete_object(&self.bucket, key).await {
                warn!(
                    "Clearing {} stopped after {} of {} objects",
                    self.bucket,
                    deleted,
                    keys.len()
                );
                return Err(e);
            }
            deleted += 1;
        }

        Ok(deleted)
    }
}
