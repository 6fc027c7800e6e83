//! Date-partitioned local file store.

use futures::future::BoxFuture;
use futures::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use filedrop_common::{CollisionPolicy, Config, DeleteMode, Error, Result, StoredPath};

use crate::calendar::{Calendar, SystemCalendar};
use crate::file::{IncomingFile, StoredFile};
use crate::sanitize::sanitize_filename;

/// Local file store.
///
/// Owns an upload root holding one `YYYYMMDD` subdirectory per day, and an
/// archive root that is created but not otherwise used.
pub struct LocalFileStore {
    upload_root: PathBuf,
    archive_root: PathBuf,
    delete_mode: DeleteMode,
    collision: CollisionPolicy,
    max_upload_bytes: u64,
    calendar: Arc<dyn Calendar>,
}

impl LocalFileStore {
    /// Create the store, creating both root directories when absent.
    ///
    /// # Errors
    /// - `Error::Process` if either directory cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        let upload_root = config.base_upload_dir.clone();
        let archive_root = config.base_archive_dir.clone();

        // sync for constructor; an existing non-directory root fails here
        for dir in [&upload_root, &archive_root] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Process(format!("Cannot create directory {}: {}", dir.display(), e))
            })?;
        }

        Ok(Self {
            upload_root,
            archive_root,
            delete_mode: config.delete_mode,
            collision: config.collision,
            max_upload_bytes: config.max_upload_bytes,
            calendar: Arc::new(SystemCalendar),
        })
    }

    /// Replace the date source.
    pub fn with_calendar(mut self, calendar: Arc<dyn Calendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }

    /// Make sure today's subdirectory exists and return its name.
    ///
    /// Not cached: existence is checked again on every call.
    pub async fn ensure_today_subdir(&self) -> Result<String> {
        let subdir = self.calendar.today_dir();
        debug!("Upload subdirectory: {}", subdir);

        let path = self.upload_root.join(&subdir);
        if !fs::try_exists(&path).await? {
            fs::create_dir_all(&path).await?;
            info!("Created upload subdirectory {}", path.display());
        }

        Ok(subdir)
    }

    /// Save an incoming file under today's subdirectory.
    ///
    /// # Postconditions
    /// - `None` input returns `Ok(None)` and touches nothing
    /// - The file lands at `<upload_root>/<subdir>/<subdir>_<sanitized name>`
    /// - The returned record has no remote key yet
    ///
    /// # Errors
    /// - I/O errors while writing
    /// - Stream errors from the source
    /// - Content larger than `max_upload_bytes`
    ///
    /// A failed write removes the partial file.
    pub async fn save(&self, file: Option<IncomingFile>) -> Result<Option<StoredFile>> {
        let Some(file) = file else {
            return Ok(None);
        };

        let subdir = self.ensure_today_subdir().await?;
        let dir = self.upload_root.join(&subdir);
        let filename = format!("{}_{}", subdir, sanitize_filename(&file.filename));
        let filename = match self.collision {
            CollisionPolicy::Overwrite => filename,
            CollisionPolicy::Suffix => free_name(&dir, &filename).await?,
        };
        info!("Saving {} as {}", file.filename, filename);

        let local_path = dir.join(&filename);
        let size = match self.write_stream(&local_path, file).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&local_path).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(
                            "Failed to remove partial upload {}: {}",
                            local_path.display(),
                            cleanup
                        );
                    }
                }
                return Err(e);
            }
        };

        Ok(Some(StoredFile {
            path: StoredPath::from_components(vec![subdir, filename])?,
            local_path,
            size,
            remote_key: None,
        }))
    }

    async fn write_stream(&self, path: &Path, mut file: IncomingFile) -> Result<u64> {
        let mut out = fs::File::create(path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = file.stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_upload_bytes {
                return Err(Error::InvalidInput(format!(
                    "Upload exceeds {} bytes",
                    self.max_upload_bytes
                )));
            }
            out.write_all(&chunk).await?;
        }

        out.flush().await?;
        Ok(written)
    }

    /// List every regular file under the upload root, relative to it.
    ///
    /// Walks the root and every nested directory. Paths use `/` and are
    /// sorted. A walk error is logged and yields an empty list.
    pub async fn list(&self) -> Vec<String> {
        match self.walk().await {
            Ok(files) => files,
            Err(e) => {
                warn!("Listing {} failed: {}", self.upload_root.display(), e);
                Vec::new()
            }
        }
    }

    async fn walk(&self) -> io::Result<Vec<String>> {
        let mut dirs = vec![self.upload_root.clone()];
        scan_subdirs(&self.upload_root, &mut dirs).await?;

        let mut files = Vec::new();
        for dir in &dirs {
            let mut entries = fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    files.push(relative_string(&self.upload_root, &entry.path()));
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Resolve a relative path to an existing file on disk.
    ///
    /// # Errors
    /// - `InvalidInput` for traversal or malformed paths
    /// - `NotFound` if no regular file exists there
    pub async fn locate(&self, path: &str) -> Result<PathBuf> {
        let stored = StoredPath::parse(path)?;
        let fs_path = stored.to_fs_path(&self.upload_root);

        match fs::metadata(&fs_path).await {
            Ok(meta) if meta.is_file() => Ok(fs_path),
            Ok(_) => Err(Error::NotFound(format!("Not a file: {}", stored))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("File not found: {}", stored)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Handle a delete request.
    ///
    /// With `DeleteMode::LogOnly` the request is only logged and reported
    /// as successful. With `DeleteMode::Remove` the file is removed;
    /// `Ok(false)` means it did not exist. `None` input returns `Ok(false)`.
    pub async fn delete(&self, path: Option<&str>) -> Result<bool> {
        let Some(path) = path else {
            return Ok(false);
        };
        info!("Removing {}", path);

        match self.delete_mode {
            DeleteMode::LogOnly => {
                debug!("Delete mode is log_only, leaving {} in place", path);
                Ok(true)
            }
            DeleteMode::Remove => match self.locate(path).await {
                Ok(fs_path) => {
                    fs::remove_file(&fs_path).await?;
                    Ok(true)
                }
                Err(Error::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            },
        }
    }
}

/// Collect every directory below `dir`, depth-first.
fn scan_subdirs<'a>(dir: &'a Path, out: &'a mut Vec<PathBuf>) -> BoxFuture<'a, io::Result<()>> {
    Box::pin(async move {
        let mut subdirs = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                subdirs.push(entry.path());
            }
        }

        for subdir in subdirs {
            out.push(subdir.clone());
            scan_subdirs(&subdir, out).await?;
        }
        Ok(())
    })
}

fn relative_string(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// First of `name`, `stem-1.ext`, `stem-2.ext`, ... not present in `dir`.
async fn free_name(dir: &Path, name: &str) -> Result<String> {
    if !fs::try_exists(dir.join(name)).await? {
        return Ok(name.to_string());
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };

    let mut counter: u32 = 1;
    loop {
        let candidate = format!("{}-{}{}", stem, counter, ext);
        if !fs::try_exists(dir.join(&candidate)).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}
