//! Gateway Error Types
//!
//! Request-level failures never leave the gateway: each one is turned into a
//! status code and a short payload by its handler. The errors here cover
//! building the router and running the server.

use derive_more::{Display, Error};
use std::net::SocketAddr;

/// A gateway error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configured URL paths would make one route shadow another.
    #[display("invalid routes: {_0}")]
    InvalidRoutes(#[error(not(source))] String),
    /// The listening socket could not be bound.
    #[display("could not bind to {_0}")]
    Bind(#[error(not(source))] SocketAddr),
    /// The server stopped because of an I/O failure on the listener.
    #[display("server terminated unexpectedly")]
    Serve,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Somebody else may let go of the port.
        matches!(self, Self::Bind(_))
    }
}
