//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local
//! filesystem. Files are read from a configured directory using `tokio::fs`
//! for async I/O.

use crate::backend::{BoxAsyncRead, PathStream};
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum ListEntry {
    File(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// Reads files from a directory on the local filesystem. All paths are
/// relative to the configured root directory.
///
/// The root does not need to exist when the backend is constructed. It is
/// created (including any missing parents) the first time it is listed, and
/// that first listing is empty.
///
/// # Examples
///
/// ```no_run
/// use apkdrop_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("packages", "/srv/apkdrop/public/apks")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is not
    /// absolute, or if it exists but is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() && !root.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the absolute path for a relative storage path.
    ///
    /// Validates the path and joins it with the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    /// Looks up metadata for `path`, following symlinks, and insists the
    /// result is a regular file.
    async fn file_metadata(&self, path: &Path) -> Result<(PathBuf, Metadata)> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Ok((abs_path, metadata))
    }

    /// Errors can't be `?`-ed inside the listing stream, so the per-entry
    /// logic lives here and the stream just yields whatever comes back.
    async fn process_entry(&self, entry: DirEntry) -> Result<ListEntry> {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| ErrorKind::from_io(e, &path))?;
        let is_file = if file_type.is_symlink() {
            match fs::metadata(&path).await {
                Ok(metadata) => metadata.is_file(),
                // Note: silently drop what is most likely a broken symlink.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => exn::bail!(ErrorKind::from_io(e, &path)),
            }
        } else {
            file_type.is_file()
        };
        match is_file {
            true => Ok(ListEntry::File(PathBuf::from(entry.file_name()))),
            false => Ok(ListEntry::Skip),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> PathStream<'_> {
        Box::pin(stream! {
            let mut entries = match fs::read_dir(&self.root).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::info!(backend = %self.name, root = %self.root.display(), "Creating missing storage root");
                    if let Err(err) = fs::create_dir_all(&self.root).await {
                        yield Err(exn::Exn::from(ErrorKind::from_io(err, &self.root)));
                    }
                    return;
                },
                Err(err) => {
                    yield Err(exn::Exn::from(ErrorKind::from_io(err, &self.root)));
                    return;
                },
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(exn::Exn::from(ErrorKind::from_io(err, &self.root)));
                        return;
                    },
                };
                match self.process_entry(entry).await {
                    Ok(ListEntry::File(name)) => yield Ok(name),
                    Ok(ListEntry::Skip) => {},
                    Err(e) => yield Err(e),
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        match self.file_metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let (_, metadata) = self.file_metadata(path).await?;
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(FileInfo::new(validate_path(path)?, metadata.len(), modified))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let (abs_path, _) = self.file_metadata(path).await?;
        Ok(fs::read(&abs_path).await.map_err(|e| ErrorKind::from_io(e, path))?)
    }

    async fn reader(&self, path: &Path) -> Result<BoxAsyncRead> {
        let (abs_path, _) = self.file_metadata(path).await?;
        let file = fs::File::open(&abs_path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        Ok(Box::pin(file))
    }

    async fn open(&self, path: &Path) -> Result<(FileInfo, BoxAsyncRead)> {
        let validated = validate_path(path)?;
        let abs_path = self.root.join(&validated);
        let file = fs::File::open(&abs_path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        // Metadata of the open handle, not of whatever the path names now.
        let metadata = file.metadata().await.map_err(|e| ErrorKind::from_io(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(validated));
        }
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok((FileInfo::new(validated, metadata.len(), modified), Box::pin(file)))
    }
}
