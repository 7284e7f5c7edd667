//! Read-only storage access for apkdrop.
//!
//! Everything the portal knows about the filesystem goes through the
//! [`StorageBackend`] trait: listing a flat directory, looking up file
//! metadata, and reading (or streaming) file contents. The package directory
//! and the application shell directory are both just backends, which lets
//! tests swap in the in-memory `MockBackend` (behind the `mock` feature).

pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::FileInfo;
pub use crate::path::{is_hidden, validate as validate_path, validate_name};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
