//! Service configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Largest accepted upload body, matching the web layer's request limit.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1_000_000;

/// What `delete` does with the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Log the request and report success without touching the file.
    #[default]
    LogOnly,
    /// Remove the file from the upload root.
    Remove,
}

/// How a save resolves a same-day name collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Replace the existing file; last write wins.
    #[default]
    Overwrite,
    /// Append `-1`, `-2`, ... before the extension until the name is free.
    Suffix,
}

/// Filedrop configuration.
///
/// Every field has a default, so a partial JSON document is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity whose access keys are rotated on startup.
    pub identity_name: String,
    /// Bucket the uploads are mirrored to.
    pub bucket_name: String,
    /// Region for the bucket and the storage session.
    pub region: String,
    /// Root directory for uploads.
    pub base_upload_dir: PathBuf,
    /// Root directory for archives (created, currently unused).
    pub base_archive_dir: PathBuf,
    /// Prefix prepended to the relative path to form the remote key.
    pub remote_prefix: String,
    pub delete_mode: DeleteMode,
    pub collision: CollisionPolicy,
    /// Uploads larger than this are rejected.
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity_name: "user-flask-rest-api".to_string(),
            bucket_name: "bucket-flask-rest-api".to_string(),
            region: "eu-north-1".to_string(),
            base_upload_dir: PathBuf::from("uploads"),
            base_archive_dir: PathBuf::from("archives"),
            remote_prefix: "uploads".to_string(),
            delete_mode: DeleteMode::default(),
            collision: CollisionPolicy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Default configuration rooted at `base`: `<base>/uploads` and
    /// `<base>/archives`.
    pub fn with_base_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            base_upload_dir: base.join("uploads"),
            base_archive_dir: base.join("archives"),
            ..Self::default()
        }
    }

    /// Check that required values are present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("identity_name", self.identity_name.as_str()),
            ("bucket_name", self.bucket_name.as_str()),
            ("region", self.region.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("'{}' must not be empty", field)));
            }
        }
        if self.base_upload_dir.as_os_str().is_empty() {
            return Err(Error::Config("'base_upload_dir' must not be empty".to_string()));
        }
        if self.base_archive_dir.as_os_str().is_empty() {
            return Err(Error::Config("'base_archive_dir' must not be empty".to_string()));
        }
        if self.remote_prefix.contains("..") {
            return Err(Error::Config(
                "'remote_prefix' must not contain '..'".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("'max_upload_bytes' must be positive".to_string()));
        }
        Ok(())
    }

    /// Build the remote key for a relative path.
    pub fn remote_key(&self, relative: &str) -> String {
        let prefix = self.remote_prefix.trim_matches('/');
        if prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", prefix, relative)
        }
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize and validate configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.delete_mode, DeleteMode::LogOnly);
        assert_eq!(config.collision, CollisionPolicy::Overwrite);
        assert_eq!(config.max_upload_bytes, 1_000_000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(
            r#"{"bucket_name": "my-bucket", "delete_mode": "remove", "collision": "suffix"}"#,
        )
        .unwrap();
        assert_eq!(config.bucket_name, "my-bucket");
        assert_eq!(config.region, "eu-north-1");
        assert_eq!(config.delete_mode, DeleteMode::Remove);
        assert_eq!(config.collision, CollisionPolicy::Suffix);
    }

    #[test]
    fn test_empty_region_rejected() {
        let result = Config::from_json(r#"{"region": " "}"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = Config::with_base_dir("/srv/filedrop");
        let parsed = Config::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.base_upload_dir, PathBuf::from("/srv/filedrop/uploads"));
    }

    #[test]
    fn test_remote_key() {
        let mut config = Config::default();
        assert_eq!(config.remote_key("20240101/a"), "uploads/20240101/a");
        config.remote_prefix = String::new();
        assert_eq!(config.remote_key("20240101/a"), "20240101/a");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filedrop.json");
        std::fs::write(&path, r#"{"identity_name": "uploader"}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.identity_name, "uploader");

        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(Error::Config(_))
        ));
    }
}
