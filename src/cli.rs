use crate::error::{ErrorKind, Result};
use apkdrop_config::Config;
use apkdrop_gateway::{AppShell, DEFAULT_INVENTORY_PATH, Gateway, GatewayConfig};
use apkdrop_inventory::{Inventory, InventoryOptions, Order};
use apkdrop_storage::backend::LocalBackend;
use clap::{ArgAction, Args, Parser, Subcommand};
use exn::ResultExt;
use figment::Figment;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Serve a directory of Android packages, with a browsable catalogue.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, value_name = "PATH", env = "APKDROP_CONFIG")]
    pub config: Option<PathBuf>,

    /// More logging (-v for debug, -vv for trace). Ignored when RUST_LOG is set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (the default)
    Serve(ServeArgs),
    /// Scan the package directory once and print the listing as JSON
    List(ListArgs),
}
impl Default for Command {
    fn default() -> Self {
        Self::Serve(ServeArgs::default())
    }
}

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Interface to bind
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Package directory
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Directory of a client build to serve instead of the built-in page
    #[arg(long, value_name = "DIR")]
    pub shell_dir: Option<PathBuf>,
}
impl ServeArgs {
    fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(host) = self.host {
            figment = figment.merge(("server.host", host.to_string()));
        }
        if let Some(port) = self.port {
            figment = figment.merge(("server.port", port));
        }
        if let Some(dir) = &self.dir {
            figment = figment.merge(("packages.directory", dir));
        }
        if let Some(dir) = &self.shell_dir {
            figment = figment.merge(("shell.directory", dir));
        }
        figment
    }
}

#[derive(Debug, Default, Args)]
pub struct ListArgs {
    /// Package directory
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Sort by file name instead of directory order
    #[arg(long)]
    pub sort: bool,
}
impl ListArgs {
    fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(dir) = &self.dir {
            figment = figment.merge(("packages.directory", dir));
        }
        if self.sort {
            figment = figment.merge(("packages.order", "name"));
        }
        figment
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let file = cli.config.or_else(apkdrop_config::default_config_file);
    let figment = Config::figment(file.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command.unwrap_or_default() {
        Command::Serve(args) => serve(args.apply(figment)).await,
        Command::List(args) => list(args.apply(figment)).await,
    }
}

fn gateway_config(config: &Config) -> GatewayConfig {
    GatewayConfig {
        inventory_path: DEFAULT_INVENTORY_PATH.to_string(),
        mount: config.packages.mount.clone(),
        suffix: config.packages.suffix.clone(),
        order: config.packages.order,
    }
}

fn packages_backend(config: &Config) -> Result<LocalBackend> {
    LocalBackend::new("packages", &config.packages.directory).or_raise(|| ErrorKind::Storage)
}

async fn serve(figment: Figment) -> Result<()> {
    let config = Config::from_figment(figment).or_raise(|| ErrorKind::Config)?;
    let packages = packages_backend(&config)?;
    let shell = match &config.shell.directory {
        Some(dir) => AppShell::directory(dir).or_raise(|| ErrorKind::Storage)?,
        None => AppShell::embedded(),
    };
    let gateway = Gateway::new(gateway_config(&config), Arc::new(packages), shell).or_raise(|| ErrorKind::Gateway)?;

    let address = config.server.address();
    let listener = Gateway::bind(address).await.or_raise(|| ErrorKind::Gateway)?;
    tracing::info!(
        address = %listener.local_addr().unwrap_or(address),
        packages = %config.packages.directory.display(),
        shell = %config.shell.directory.as_deref().map_or("embedded".into(), |dir| dir.display().to_string()),
        "Listening",
    );
    gateway.serve(listener, shutdown_signal()).await.or_raise(|| ErrorKind::Gateway)?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn list(figment: Figment) -> Result<()> {
    let config = Config::from_figment(figment).or_raise(|| ErrorKind::Config)?;
    let options = InventoryOptions {
        suffix: config.packages.suffix.clone(),
        mount: config.packages.mount.clone(),
        order: config.packages.order,
    };
    let inventory = Inventory::new(Arc::new(packages_backend(&config)?), options);
    let entries = inventory.scan().await.or_raise(|| ErrorKind::Inventory)?;
    let json = serde_json::to_string_pretty(&entries).or_raise(|| ErrorKind::Output)?;
    println!("{json}");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(err) => {
                tracing::warn!(error = %err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down, waiting for in-flight requests");
}
