//! Filedrop file handler.
//!
//! Exposes the three boundary operations a web layer calls (`save`, `list`,
//! `delete`) over the local store and the remote mirror.

pub mod handler;

pub use handler::FileHandler;

pub use filedrop_common::{Config, Error, Result};
pub use filedrop_storage::{IncomingFile, StoredFile};
