//! Package inventory for apkdrop.
//!
//! Turns the flat contents of a storage backend into the list of
//! [`PackageEntry`] records served by the listing endpoint. Nothing is
//! cached: every call to [`Inventory::scan`] looks at the directory again.

mod entry;
pub mod error;
mod scan;

pub use crate::entry::{PackageEntry, display_name, format_size};
pub use crate::scan::{Inventory, InventoryOptions, Order};

/// File name suffix that marks a package file.
pub const DEFAULT_SUFFIX: &str = ".apk";
/// URL path under which package files are downloadable.
pub const DEFAULT_MOUNT: &str = "/apks";
/// URL path the listing is served from.
pub const DEFAULT_INVENTORY_PATH: &str = "/api/apks";
