//! Path validation and security utilities.
//!
//! Request paths come straight off the wire, so every path handed to a
//! backend is normalised here first and must never escape the storage root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path for security and correctness.
/// Ensures that paths don't escape the storage root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use apkdrop_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("assets/index.js").is_ok());
/// assert!(validate_path("a/../index.html").is_ok()); // (never leaves root)
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err()); // (leaves root)
/// assert!(validate_path("a\0b").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("/wrong/../assets/./index.js/").unwrap(),
///     Path::new("assets/index.js")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls, reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Validates a bare file name: a path that must resolve to exactly one
/// component directly inside the storage root.
///
/// ```
/// use apkdrop_storage::validate_name;
/// assert!(validate_name("Game_Pro.apk").is_ok());
/// assert!(validate_name("nested/Game_Pro.apk").is_err());
/// assert!(validate_name("..").is_err());
/// ```
pub fn validate_name(name: impl AsRef<Path>) -> Result<PathBuf> {
    let validated = validate(name.as_ref())?;
    if validated.components().count() != 1 {
        exn::bail!(ErrorKind::InvalidPath(name.as_ref().to_path_buf()));
    }
    Ok(validated)
}

/// Whether any component of an already validated path is a dotfile, which
/// is never served to clients.
///
/// ```
/// use apkdrop_storage::is_hidden;
/// assert!(is_hidden(".env"));
/// assert!(is_hidden("assets/.git/config"));
/// assert!(!is_hidden("assets/app.js"));
/// ```
pub fn is_hidden(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .components()
        .any(|component| matches!(component, Component::Normal(s) if s.as_encoded_bytes().starts_with(b".")))
}
