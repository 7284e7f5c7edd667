//! Inventory Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Both variants carry the underlying storage error's
//! description so it can be shown to whoever asked for the listing.

use derive_more::{Display, Error};

/// An inventory error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for inventory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a scan was abandoned. A failed scan never returns partial results.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The package directory itself could not be listed.
    #[display("failed to list package directory: {_0}")]
    Listing(#[error(not(source))] String),
    /// A package file was listed but its metadata could not be read.
    #[display("failed to read package metadata: {_0}")]
    Metadata(#[error(not(source))] String),
}

impl ErrorKind {
    /// Description of the storage failure behind this error.
    pub fn detail(&self) -> &str {
        match self {
            Self::Listing(detail) | Self::Metadata(detail) => detail,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
