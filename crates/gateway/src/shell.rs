//! The client application shell.
//!
//! The shell is a directory of static files with an `index.html` entry
//! document. Either a directory on disk (a client build output) or the
//! minimal shell compiled into the binary.

use apkdrop_storage::backend::{BoxAsyncRead, LocalBackend, PathStream};
use apkdrop_storage::error::{ErrorKind, Result};
use apkdrop_storage::{BackendHandle, FileInfo, StorageBackend, is_hidden, validate_path};
use async_trait::async_trait;
use futures::stream;
use rust_embed::{Embed, EmbeddedFile};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::UtcDateTime;

#[derive(Embed)]
#[folder = "../../assets/shell/"]
struct ShellAssets;

/// Read-only backend over the shell files embedded at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedShell;
impl EmbeddedShell {
    fn get(path: &Path) -> Result<(PathBuf, EmbeddedFile)> {
        let validated = validate_path(path)?;
        // rust-embed keys always use forward slashes.
        let key = validated.iter().map(|c| c.to_str()).collect::<Option<Vec<_>>>().map(|parts| parts.join("/"));
        match key.and_then(|key| ShellAssets::get(&key)) {
            Some(file) => Ok((validated, file)),
            None => exn::bail!(ErrorKind::NotFound(validated)),
        }
    }

    fn info(path: PathBuf, file: &EmbeddedFile) -> FileInfo {
        let modified = file
            .metadata
            .last_modified()
            .and_then(|secs| UtcDateTime::from_unix_timestamp(secs.try_into().ok()?).ok())
            .unwrap_or(UtcDateTime::UNIX_EPOCH);
        FileInfo::new(path, file.data.len() as u64, modified)
    }
}

#[async_trait]
impl StorageBackend for EmbeddedShell {
    fn name(&self) -> &str {
        "embedded-shell"
    }

    fn list_stream(&self) -> PathStream<'_> {
        let names: Vec<_> = ShellAssets::iter().filter(|name| !name.contains('/')).collect();
        Box::pin(stream::iter(names.into_iter().map(|name| Ok(PathBuf::from(name.into_owned())))))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        match Self::get(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let (path, file) = Self::get(path)?;
        Ok(Self::info(path, &file))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(Self::get(path)?.1.data.into_owned())
    }

    async fn reader(&self, path: &Path) -> Result<BoxAsyncRead> {
        Ok(Box::pin(Cursor::new(self.read(path).await?)))
    }

    async fn open(&self, path: &Path) -> Result<(FileInfo, BoxAsyncRead)> {
        let (path, file) = Self::get(path)?;
        let info = Self::info(path, &file);
        Ok((info, Box::pin(Cursor::new(file.data.into_owned()))))
    }
}

/// A shell file ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellFile {
    pub path: PathBuf,
    pub data: Vec<u8>,
}

/// The client application, served for every path no other route claims.
#[derive(Clone)]
pub struct AppShell {
    backend: BackendHandle,
}
impl AppShell {
    pub const ENTRY_DOCUMENT: &str = "index.html";

    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }

    /// The shell compiled into the binary.
    pub fn embedded() -> Self {
        Self::new(Arc::new(EmbeddedShell))
    }

    /// A client build output directory on disk.
    pub fn directory(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(LocalBackend::new("shell", root)?)))
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Picks the file to answer `request_path` with: the asset it names if
    /// there is one and it isn't a dotfile, otherwise the entry document.
    ///
    /// # Errors
    /// Only when the entry document itself can't be read, which means the
    /// shell was never deployed.
    pub async fn load(&self, request_path: &str) -> Result<ShellFile> {
        if let Ok(asset) = validate_path(request_path)
            && !is_hidden(&asset)
        {
            if matches!(self.backend.exists(&asset).await, Ok(true)) {
                if let Ok(data) = self.backend.read(&asset).await {
                    return Ok(ShellFile { path: asset, data });
                }
            }
        }
        let path = PathBuf::from(Self::ENTRY_DOCUMENT);
        let data = self.backend.read(&path).await?;
        Ok(ShellFile { path, data })
    }
}
