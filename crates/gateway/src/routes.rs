//! Route precedence.
//!
//! The gateway answers three classes of request. They are matched in a fixed
//! order and the first match wins, with the application shell always last so
//! that it can never shadow the listing or a download.

use crate::error::{ErrorKind, Result};

/// A class of request the gateway knows how to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The package listing, as JSON.
    Inventory,
    /// A raw package file under the download mount.
    Download,
    /// The client application: a static asset, or its entry document.
    Shell,
}

/// Ordered route table, first match wins.
///
/// ```
/// use apkdrop_gateway::{Route, RouteTable};
///
/// let table = RouteTable::new("/api/apks", "/apks").unwrap();
/// assert_eq!(table.resolve("/api/apks"), Route::Inventory);
/// assert_eq!(table.resolve("/apks/Game_Pro.apk"), Route::Download);
/// assert_eq!(table.resolve("/apksfoo"), Route::Shell);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    inventory_path: String,
    mount: String,
}
impl RouteTable {
    const ORDER: [Route; 3] = [Route::Inventory, Route::Download, Route::Shell];

    /// # Errors
    /// [`InvalidRoutes`](ErrorKind::InvalidRoutes) if either path is not an
    /// absolute URL path, if the mount is `/` (which would swallow the shell),
    /// or if the listing path falls under the mount.
    pub fn new(inventory_path: impl Into<String>, mount: impl Into<String>) -> Result<Self> {
        let inventory_path = inventory_path.into();
        let requested_mount = mount.into();
        let mount = requested_mount.trim_end_matches('/').to_string();
        if !inventory_path.starts_with('/') || inventory_path.len() < 2 || inventory_path.ends_with('/') {
            exn::bail!(ErrorKind::InvalidRoutes(format!("listing path `{inventory_path}` is not a valid URL path")));
        }
        if !mount.starts_with('/') {
            exn::bail!(ErrorKind::InvalidRoutes(format!("download mount `{requested_mount}` is not a valid URL path")));
        }
        let table = Self { inventory_path, mount };
        if table.under_mount(&table.inventory_path) {
            exn::bail!(ErrorKind::InvalidRoutes(format!(
                "listing path `{}` is shadowed by download mount `{}`",
                table.inventory_path, table.mount
            )));
        }
        Ok(table)
    }

    pub fn inventory_path(&self) -> &str {
        &self.inventory_path
    }

    /// Download mount, without a trailing slash.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Routes in precedence order. [`Route::Shell`] is always last.
    pub fn routes(&self) -> &'static [Route] {
        &Self::ORDER
    }

    /// Classifies a request path.
    pub fn resolve(&self, path: &str) -> Route {
        Self::ORDER.into_iter().find(|route| self.matches(*route, path)).unwrap_or(Route::Shell)
    }

    fn matches(&self, route: Route, path: &str) -> bool {
        match route {
            Route::Inventory => path == self.inventory_path,
            Route::Download => self.under_mount(path),
            Route::Shell => true,
        }
    }

    fn under_mount(&self, path: &str) -> bool {
        path.strip_prefix(self.mount.as_str()).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}
