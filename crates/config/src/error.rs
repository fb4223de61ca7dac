use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// A source could not be read or parsed, or holds a value of the wrong type.
    #[display("could not load configuration")]
    Load,
    /// Every source loaded, but the merged values make no sense.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// No platform directory to default the cache location to.
    #[display("no cache path configured and no platform cache directory available")]
    NoCacheDir,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
