//! Root error type shared across the receiver crates.

use thiserror::Error;

/// Common result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can originate below the receiver's own taxonomy
/// (`fmrds_receiver::error::ReceiverError` wraps this as a leaf variant).
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}
