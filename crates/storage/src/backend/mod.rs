//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the narrow read-only
//! interface every part of apkdrop uses to look at a directory: list it,
//! stat a file, read a file, or stream it.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::{Fault, MockBackend};
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncRead;

pub type PathStream<'a> = Pin<Box<dyn Stream<Item = Result<PathBuf>> + Send + 'a>>;
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Unified interface for storage backends.
///
/// All operations are asynchronous so that one slow disk never stalls other
/// requests being served at the same time. Backends are strictly read-only:
/// nothing here writes, moves or deletes files.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use apkdrop_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of(backend: &dyn StorageBackend, name: &str) -> Result<u64> {
///     let path = Path::new(name);
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// List the regular files directly inside the storage root.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`], failing on the first error.
    async fn list(&self) -> Result<Vec<PathBuf>> {
        self.list_stream().try_collect().await
    }

    /// Stream the names of the regular files directly inside the storage
    /// root, in whatever order the backend produces them.
    ///
    /// # Notes
    /// - The listing is **not** recursive: subdirectories are skipped.
    /// - A root that doesn't exist is an empty listing, not an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use apkdrop_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream();
    /// while let Some(path) = stream.try_next().await? {
    ///     println!("{}", path.display());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream(&self) -> PathStream<'_>;

    /// Check if a regular file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Open a file for streaming reads.
    ///
    /// The file is opened before returning, so a missing file is reported
    /// here as [`NotFound`](crate::error::ErrorKind::NotFound) rather than
    /// partway through a transfer.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use tokio::io::AsyncReadExt;
    /// # use apkdrop_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut reader = backend.reader(Path::new("Game_Pro.apk")).await?;
    /// let mut magic = [0u8; 4];
    /// reader.read_exact(&mut magic).await.map_err(apkdrop_storage::error::ErrorKind::Io)?;
    /// # Ok(())
    /// # }
    /// ```
    async fn reader(&self, path: &Path) -> Result<BoxAsyncRead>;

    /// Open a file for streaming reads, along with the metadata of the file
    /// that was actually opened.
    ///
    /// Unlike [`stat()`](Self::stat) followed by [`reader()`](Self::reader),
    /// the size and modification time always describe the bytes the reader
    /// yields, even if the file is replaced in between.
    async fn open(&self, path: &Path) -> Result<(FileInfo, BoxAsyncRead)>;
}
