//! Local storage for Filedrop.
//!
//! Uploads are written under a date-partitioned directory tree:
//! `<upload_root>/<YYYYMMDD>/<YYYYMMDD>_<sanitized name>`.
//!
//! # Design Principles
//! - Client filenames never reach the filesystem unsanitized
//! - One dated subdirectory per calendar day, created lazily
//! - Listing failures are absorbed here; directory setup at startup is the
//!   only fatal error

pub mod calendar;
pub mod file;
pub mod local;
pub mod sanitize;

pub use calendar::{Calendar, FixedCalendar, SystemCalendar, DATE_DIR_FORMAT};
pub use file::{ByteStream, IncomingFile, StoredFile};
pub use local::LocalFileStore;
pub use sanitize::{sanitize_filename, FALLBACK_NAME};
