//! Incoming upload streams and stored file records.

use futures::{stream, Stream};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;

use filedrop_common::{Error, Result, StoredPath};

/// Byte stream type for uploads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// A file handed over by a client: its original name plus its content.
pub struct IncomingFile {
    /// Filename as supplied by the client, unsanitized.
    pub filename: String,
    /// File content.
    pub stream: ByteStream,
}

impl IncomingFile {
    /// Wrap a content stream.
    pub fn new(filename: impl Into<String>, stream: ByteStream) -> Self {
        Self {
            filename: filename.into(),
            stream,
        }
    }

    /// Build from an in-memory buffer.
    pub fn from_bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(filename, Box::pin(stream::once(async move { Ok::<_, Error>(data) })))
    }

    /// Build from pre-split chunks.
    pub fn from_chunks(filename: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
        Self::new(filename, Box::pin(stream::iter(chunks.into_iter().map(Ok::<_, Error>))))
    }
}

impl fmt::Debug for IncomingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingFile")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// A file committed to the upload root.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    /// Path relative to the upload root: `<YYYYMMDD>/<YYYYMMDD>_<name>`.
    pub path: StoredPath,
    /// Absolute location on disk.
    pub local_path: PathBuf,
    /// Bytes written.
    pub size: u64,
    /// Object key of the remote copy, when mirroring succeeded.
    pub remote_key: Option<String>,
}

impl StoredFile {
    /// Relative path in its `/`-separated string form.
    pub fn relative_path(&self) -> String {
        self.path.as_string()
    }

    /// Whether a remote copy was written.
    pub fn is_mirrored(&self) -> bool {
        self.remote_key.is_some()
    }
}
