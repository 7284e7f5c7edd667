//! In-memory storage backend for testing.

use super::{BoxAsyncRead, PathStream};
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// Operations a [`MockBackend`] can be told to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Listing the root fails with `PermissionDenied`.
    List,
    /// Looking up metadata for this path, or opening it, fails with
    /// `PermissionDenied`.
    Stat(PathBuf),
}

/// In-memory storage backend for testing.
///
/// Files are stored in a sorted map behind a [`RwLock`], so the listing order
/// is deterministic (lexicographic by path) and all trait methods can operate
/// on `&self`. [`insert`](Self::insert) and [`remove`](Self::remove) stand in
/// for somebody else changing the directory while the portal is running.
///
/// # Examples
///
/// ```
/// use apkdrop_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("Game_Pro.apk", b"PK\x03\x04"),
/// ]);
/// assert!(backend.exists(Path::new("Game_Pro.apk")).await?);
///
/// backend.remove("Game_Pro.apk").await;
/// assert!(!backend.exists(Path::new("Game_Pro.apk")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<PathBuf, (UtcDateTime, Vec<u8>)>>,
    faults: Vec<Fault>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            faults: Vec::new(),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make an operation fail every time it is attempted.
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Add (or replace) a file, as if it had been dropped into the directory.
    ///
    /// Panics on an invalid path, same as [`with_files`](Self::with_files).
    pub async fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let path = path.into();
        let Ok(validated) = validate_path(&path) else {
            panic!("MockBackend::insert: invalid path {}", path.display());
        };
        self.storage.write().await.insert(validated, (UtcDateTime::now(), data.into()));
    }

    /// Remove a file, as if it had been deleted out from under the portal.
    /// Returns `true` if the file existed.
    pub async fn remove(&self, path: impl AsRef<Path>) -> bool {
        match validate_path(path.as_ref()) {
            Ok(path) => self.storage.write().await.remove(&path).is_some(),
            Err(_) => false,
        }
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }

    async fn get(&self, path: &Path) -> Result<(PathBuf, UtcDateTime, Vec<u8>)> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let (inserted, data) = guard.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok((path, inserted, data))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> PathStream<'_> {
        Box::pin(stream! {
            if self.has_fault(&Fault::List) {
                yield Err(exn::Exn::from(ErrorKind::PermissionDenied(PathBuf::from("."))));
                return;
            }
            // Snapshot entries under the read lock, then drop it before
            // yielding to avoid holding the lock across yield points.
            let entries: Vec<PathBuf> = {
                let guard = self.storage.read().await;
                // Only direct children of the root, the same as a flat directory.
                guard.keys().filter(|path| path.components().count() == 1).cloned().collect()
            };
            for path in entries {
                yield Ok(path);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let validated = validate_path(path)?;
        if self.has_fault(&Fault::Stat(validated.clone())) {
            exn::bail!(ErrorKind::PermissionDenied(validated));
        }
        let (path, inserted, data) = self.get(&validated).await?;
        Ok(FileInfo::new(path, data.len() as u64, inserted))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let (_path, _inserted, data) = self.get(path).await?;
        Ok(data)
    }

    async fn reader(&self, path: &Path) -> Result<BoxAsyncRead> {
        let (_path, _inserted, data) = self.get(path).await?;
        Ok(Box::pin(Cursor::new(data)))
    }

    async fn open(&self, path: &Path) -> Result<(FileInfo, BoxAsyncRead)> {
        let validated = validate_path(path)?;
        if self.has_fault(&Fault::Stat(validated.clone())) {
            exn::bail!(ErrorKind::PermissionDenied(validated));
        }
        // One lookup, so a concurrent `insert` can't split size from contents.
        let (path, inserted, data) = self.get(&validated).await?;
        let info = FileInfo::new(path, data.len() as u64, inserted);
        Ok((info, Box::pin(Cursor::new(data))))
    }
}
