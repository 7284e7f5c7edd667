//! HTTP front of apkdrop.
//!
//! One [`Gateway`] answers every request: the package listing as JSON, raw
//! package downloads, and the client application for anything else. It holds
//! no per-request state, so every listing request scans the directory again.
//!
//! # Example
//!
//! ```no_run
//! use apkdrop_gateway::{AppShell, Gateway, GatewayConfig};
//! use apkdrop_storage::backend::LocalBackend;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let packages = Arc::new(LocalBackend::new("packages", "/srv/apkdrop/public/apks")?);
//! let gateway = Gateway::new(GatewayConfig::default(), packages, AppShell::embedded())?;
//! let listener = Gateway::bind("0.0.0.0:5176".parse()?).await?;
//! gateway.serve(listener, std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod handlers;
mod routes;
mod shell;

pub use crate::routes::{Route, RouteTable};
pub use crate::shell::{AppShell, EmbeddedShell, ShellFile};
pub use apkdrop_inventory::DEFAULT_INVENTORY_PATH;
use crate::error::{ErrorKind, Result};
use apkdrop_inventory::{DEFAULT_MOUNT, DEFAULT_SUFFIX, Inventory, InventoryOptions, Order};
use apkdrop_storage::BackendHandle;
use axum::Router;
use axum::routing::get;
use exn::ResultExt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Everything the gateway needs to know about URLs and package files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub inventory_path: String,
    pub mount: String,
    pub suffix: String,
    pub order: Order,
}
impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            inventory_path: DEFAULT_INVENTORY_PATH.to_string(),
            mount: DEFAULT_MOUNT.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            order: Order::default(),
        }
    }
}

pub(crate) struct AppState {
    pub(crate) routes: RouteTable,
    pub(crate) inventory: Inventory,
    pub(crate) shell: AppShell,
}

pub struct Gateway {
    state: Arc<AppState>,
}
impl Gateway {
    /// # Errors
    /// [`InvalidRoutes`](ErrorKind::InvalidRoutes) if the listing path and
    /// download mount overlap.
    pub fn new(config: GatewayConfig, packages: BackendHandle, shell: AppShell) -> Result<Self> {
        let routes = RouteTable::new(config.inventory_path, config.mount)?;
        let options = InventoryOptions {
            suffix: config.suffix,
            mount: routes.mount().to_string(),
            order: config.order,
        };
        let state = AppState {
            routes,
            inventory: Inventory::new(packages, options),
            shell,
        };
        Ok(Self { state: Arc::new(state) })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.state.routes
    }

    /// Builds the axum router from the route table, in precedence order.
    ///
    /// Paths under the mount that can't name a file (the mount itself, or a
    /// trailing slash) reach the fallback, which consults the table again.
    pub fn router(&self) -> Router {
        let routes = self.routes();
        let mut router = Router::new();
        for route in routes.routes() {
            router = match route {
                Route::Inventory => router.route(routes.inventory_path(), get(handlers::inventory)),
                Route::Download => router.route(&format!("{}/{{*filename}}", routes.mount()), get(handlers::download)),
                Route::Shell => router.fallback(handlers::fallback),
            };
        }
        router.with_state(self.state.clone()).layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
    }

    pub async fn bind(address: SocketAddr) -> Result<TcpListener> {
        TcpListener::bind(address).await.or_raise(|| ErrorKind::Bind(address))
    }

    /// Serves until `shutdown` resolves, then lets in-flight requests finish.
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let router = self.router();
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await.or_raise(|| ErrorKind::Serve)
    }
}
