//! Common types used throughout Filedrop.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// A path relative to the upload root, independent of the host separator.
///
/// Components are never empty, never `.` or `..`, and never contain a
/// separator, so a `StoredPath` can always be joined onto the upload root
/// without escaping it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoredPath {
    components: Vec<String>,
}

impl StoredPath {
    /// Create a path from string components.
    ///
    /// # Errors
    /// - No components
    /// - Any component is empty, `.`, `..`, or contains a separator
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        if components.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Stored path cannot be empty".to_string(),
            ));
        }
        for comp in &components {
            validate_component(comp)?;
        }
        Ok(Self { components })
    }

    /// Parse a `/`-separated relative path. `\` is treated as a separator
    /// too, so Windows-style input cannot smuggle in a traversal.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let trimmed = path.trim_matches(|c| c == '/' || c == '\\');
        let components: Vec<String> = trimmed
            .split(|c| c == '/' || c == '\\')
            .map(String::from)
            .collect();
        if trimmed.is_empty() {
            return Self::from_components(Vec::new());
        }
        Self::from_components(components)
    }

    /// Get the file name (last component).
    pub fn name(&self) -> &str {
        // from_components guarantees at least one component
        self.components.last().map(|s| s.as_str()).unwrap_or_default()
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Join the components onto a filesystem root.
    pub fn to_fs_path(&self, root: &std::path::Path) -> std::path::PathBuf {
        let mut fs_path = root.to_path_buf();
        for component in &self.components {
            fs_path.push(component);
        }
        fs_path
    }

    /// Convert to the `/`-separated string form.
    pub fn as_string(&self) -> String {
        self.components.join("/")
    }
}

impl fmt::Display for StoredPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

fn validate_component(comp: &str) -> crate::Result<()> {
    if comp.is_empty() {
        return Err(crate::Error::InvalidInput(
            "Path component cannot be empty".to_string(),
        ));
    }
    if comp == "." || comp == ".." {
        return Err(crate::Error::InvalidInput(format!(
            "Path component '{}' is not allowed",
            comp
        )));
    }
    if comp.contains('/') || comp.contains('\\') || comp.contains('\0') {
        return Err(crate::Error::InvalidInput(
            "Path component cannot contain separators".to_string(),
        ));
    }
    Ok(())
}

/// Secret access key that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey(String);

impl SecretKey {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for handing to an SDK client.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// Status of an identity access key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessKeyStatus {
    Active,
    Inactive,
}

impl AccessKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for AccessKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access key as reported by a key listing (no secret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyInfo {
    pub id: String,
    pub status: AccessKeyStatus,
}

/// Access key id and secret bound to one identity.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Identity the key belongs to.
    pub identity: String,
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret: SecretKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::{Component, Path};

    #[test]
    fn test_stored_path_parse() {
        let path = StoredPath::parse("20240101/20240101_a.txt").unwrap();
        assert_eq!(path.components(), &["20240101", "20240101_a.txt"]);
        assert_eq!(path.name(), "20240101_a.txt");
        assert_eq!(path.to_string(), "20240101/20240101_a.txt");
    }

    #[test]
    fn test_stored_path_rejects_traversal() {
        assert!(StoredPath::parse("../etc/passwd").is_err());
        assert!(StoredPath::parse("a/./b").is_err());
        assert!(StoredPath::parse("a\\..\\b").is_err());
        assert!(StoredPath::parse("a//b").is_err());
        assert!(StoredPath::parse("").is_err());
        assert!(StoredPath::parse("/").is_err());
    }

    #[test]
    fn test_stored_path_leading_slash_is_relative() {
        let path = StoredPath::parse("/20240101/x").unwrap();
        assert_eq!(
            path.to_fs_path(Path::new("/srv/uploads")),
            Path::new("/srv/uploads/20240101/x")
        );
    }

    #[test]
    fn test_secret_key_redacted() {
        let secret = SecretKey::new("wJalrXUtnFEMI");
        assert_eq!(format!("{:?}", secret), "SecretKey([REDACTED])");
        assert_eq!(secret.expose(), "wJalrXUtnFEMI");
    }

    proptest! {
        #[test]
        fn prop_parsed_path_stays_under_root(raw in "[a-z0-9._/\\\\-]{0,24}") {
            let root = Path::new("/srv/uploads");
            if let Ok(path) = StoredPath::parse(&raw) {
                let fs_path = path.to_fs_path(root);
                let relative = fs_path.strip_prefix(root).unwrap();
                prop_assert_eq!(relative.components().count(), path.components().len());
                prop_assert!(relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_))));
            }
        }

        #[test]
        fn prop_parent_segment_rejected(
            head in "[a-z0-9]{0,8}",
            tail in "[a-z0-9]{0,8}",
            sep in "[/\\\\]",
        ) {
            let raw = format!("{head}{sep}..{sep}{tail}");
            prop_assert!(StoredPath::parse(&raw).is_err());
        }
    }
}
