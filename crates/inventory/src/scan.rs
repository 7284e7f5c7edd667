use crate::entry::PackageEntry;
use crate::error::{Error, ErrorKind, Result};
use crate::{DEFAULT_MOUNT, DEFAULT_SUFFIX};
use apkdrop_storage::BackendHandle;
use apkdrop_storage::error::Error as StorageError;
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use std::future::ready;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Upper bound on metadata lookups in flight during a single scan.
const METADATA_CONCURRENCY: usize = 16;

/// Order in which entries (and therefore ids) are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Whatever order the backend lists the directory in. Not guaranteed to
    /// be stable across platforms.
    #[default]
    Listing,
    /// Sorted by file name (byte-wise) before ids are assigned.
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryOptions {
    /// Case-sensitive file name suffix that marks a package file.
    pub suffix: String,
    /// URL path prefix the download links are built from.
    pub mount: String,
    pub order: Order,
}
impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            mount: DEFAULT_MOUNT.to_string(),
            order: Order::default(),
        }
    }
}

/// The package scanner.
///
/// # Example
///
/// ```
/// use apkdrop_inventory::{Inventory, InventoryOptions};
/// use apkdrop_storage::backend::MockBackend;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backend = MockBackend::with_files([("My_App-2.apk", vec![0u8; 1_048_576])]);
/// let inventory = Inventory::new(Arc::new(backend), InventoryOptions::default());
/// let entries = inventory.scan().await.unwrap();
/// assert_eq!(entries[0].name, "My App 2");
/// assert_eq!(entries[0].size, "1.00 MB");
/// # }
/// ```
#[derive(Clone)]
pub struct Inventory {
    backend: BackendHandle,
    options: InventoryOptions,
}
impl Inventory {
    pub fn new(backend: BackendHandle, options: InventoryOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn options(&self) -> &InventoryOptions {
        &self.options
    }

    /// Whether a file name qualifies as a package file.
    pub fn is_package(&self, filename: &str) -> bool {
        filename.ends_with(self.options.suffix.as_str())
    }

    /// Lists the directory and builds one [`PackageEntry`] per package file.
    ///
    /// A missing directory is created by the backend and yields an empty
    /// inventory. Only package files get a metadata lookup, and lookups run
    /// concurrently while still producing entries in listing order.
    ///
    /// # Errors
    /// The first listing or metadata failure aborts the whole scan with
    /// [`ErrorKind::Listing`] or [`ErrorKind::Metadata`].
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn scan(&self) -> Result<Vec<PackageEntry>> {
        let mut filenames: Vec<String> = self
            .backend
            .list_stream()
            .map_err(|e| raise(e, ErrorKind::Listing))
            .try_filter_map(|path| ready(Ok(self.package_name(path))))
            .try_collect()
            .await?;
        if self.options.order == Order::Name {
            filenames.sort();
        }

        let entries: Vec<PackageEntry> = stream::iter(filenames.into_iter().zip(1..))
            .map(|(filename, id)| self.entry(id, filename))
            .buffered(METADATA_CONCURRENCY)
            .try_collect()
            .await?;
        tracing::debug!(count = entries.len(), "Scanned package directory");
        Ok(entries)
    }

    async fn entry(&self, id: u64, filename: String) -> Result<PackageEntry> {
        let info = self.backend.stat(Path::new(&filename)).await.map_err(|e| raise(e, ErrorKind::Metadata))?;
        Ok(PackageEntry::new(id, filename, info.size, &self.options.suffix, &self.options.mount))
    }

    fn package_name(&self, path: PathBuf) -> Option<String> {
        match path.into_os_string().into_string() {
            Ok(name) if self.is_package(&name) => Some(name),
            Ok(_) => None,
            Err(name) => {
                tracing::debug!(name = ?name, "Skipping file name that isn't valid UTF-8");
                None
            },
        }
    }
}

fn raise(err: StorageError, kind: impl FnOnce(String) -> ErrorKind) -> Error {
    let detail = (*err).to_string();
    err.raise(kind(detail))
}
