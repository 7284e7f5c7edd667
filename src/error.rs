use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of the command gave up.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open storage")]
    Storage,
    #[display("could not scan the package directory")]
    Inventory,
    #[display("HTTP server failed")]
    Gateway,
    #[display("could not write output")]
    Output,
}
