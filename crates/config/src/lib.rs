//! Configuration loading and validation for apkdrop.
//!
//! Configuration is layered with [figment], lowest precedence first:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. an optional TOML, YAML or JSON file,
//! 3. `APKDROP_`-prefixed environment variables, with `__` separating
//!    nested keys (`APKDROP_PACKAGES__DIRECTORY=/srv/apks`),
//! 4. the bare `PORT` environment variable, as set by most hosting
//!    platforms,
//!
//! after which callers may merge their own overrides (command-line flags)
//! before calling [`Config::from_figment`].
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [packages]
//! directory = "/srv/apkdrop/public/apks"
//! order = "name"
//!
//! [shell]
//! directory = "/srv/apkdrop/dist"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use apkdrop_inventory::{DEFAULT_INVENTORY_PATH, DEFAULT_MOUNT, DEFAULT_SUFFIX, Order};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "APKDROP_";
pub const DEFAULT_PORT: u16 = 5176;
pub const DEFAULT_PACKAGE_DIRECTORY: &str = "public/apks";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub packages: PackagesConfig,
    pub shell: ShellConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind; all interfaces by default.
    pub host: IpAddr,
    pub port: u16,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}
impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    /// Flat directory holding the package files. Created on first scan if
    /// it doesn't exist.
    ///
    /// A relative path is resolved against the working directory the server
    /// was started from, not the location of the executable. Run from the
    /// install root (or set an absolute path) to get `<install-root>/public/apks`.
    pub directory: PathBuf,
    /// Case-sensitive suffix a file name must end with to be listed.
    pub suffix: String,
    /// URL path prefix under which package files are downloadable.
    pub mount: String,
    pub order: Order,
}
impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_PACKAGE_DIRECTORY),
            suffix: DEFAULT_SUFFIX.to_string(),
            mount: DEFAULT_MOUNT.to_string(),
            order: Order::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Directory containing the built client application (`index.html` plus
    /// its assets). When unset, the shell compiled into the binary is used.
    /// Relative paths resolve against the working directory, the same as
    /// [`PackagesConfig::directory`].
    pub directory: Option<PathBuf>,
}

/// The per-user configuration file, if one exists.
pub fn default_config_file() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "apkdrop")?;
    let path = dirs.config_dir().join("config.toml");
    path.is_file().then_some(path)
}

impl Config {
    /// Builds the layered [`Figment`]: defaults, then `file` (if any), then
    /// the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            if !file.is_file() {
                exn::bail!(ErrorKind::MissingFile(file.to_path_buf()));
            }
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
            };
        }
        Ok(figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into())))
    }

    /// Loads from `file` and the environment, with no further overrides.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?)
    }

    /// Extracts, validates, and resolves relative directories against the
    /// current working directory.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(|e| ErrorKind::Load(e.to_string()))?;
        config.validate()?;
        let cwd = std::env::current_dir().or_raise(|| ErrorKind::WorkingDirectory)?;
        let config = config.resolve_paths(&cwd);
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Checks invariants that deserialization can't express.
    pub fn validate(&self) -> Result<()> {
        let packages = &self.packages;
        if packages.suffix.is_empty() {
            exn::bail!(ErrorKind::Invalid("packages.suffix must not be empty".to_string()));
        }
        if packages.suffix.contains('/') {
            exn::bail!(ErrorKind::Invalid(format!("packages.suffix `{}` must not contain `/`", packages.suffix)));
        }
        if !packages.mount.starts_with('/') || packages.mount.len() < 2 {
            exn::bail!(ErrorKind::Invalid(format!(
                "packages.mount `{}` must be an absolute URL path other than `/`",
                packages.mount
            )));
        }
        if packages.mount.ends_with('/') {
            exn::bail!(ErrorKind::Invalid(format!("packages.mount `{}` must not end with `/`", packages.mount)));
        }
        let shadowed = DEFAULT_INVENTORY_PATH
            .strip_prefix(packages.mount.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if shadowed {
            exn::bail!(ErrorKind::Invalid(format!(
                "packages.mount `{}` would hide the listing at `{DEFAULT_INVENTORY_PATH}`",
                packages.mount
            )));
        }
        if packages.directory.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("packages.directory must not be empty".to_string()));
        }
        Ok(())
    }

    /// Makes every configured directory absolute.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        self.packages.directory = absolutize(base, self.packages.directory);
        self.shell.directory = self.shell.directory.map(|dir| absolutize(base, dir));
        self
    }
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    match path.is_absolute() {
        true => path,
        false => base.join(path),
    }
}
