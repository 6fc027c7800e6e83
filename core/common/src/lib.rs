//! Common utilities and types shared across Filedrop modules.
//!
//! This module provides foundational types that are used throughout the codebase:
//! the error taxonomy, relative upload paths, credentials, and configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CollisionPolicy, Config, DeleteMode, DEFAULT_MAX_UPLOAD_BYTES};
pub use error::{Error, RemoteErrorKind, Result};
pub use types::{AccessKeyInfo, AccessKeyStatus, Credential, SecretKey, StoredPath};
