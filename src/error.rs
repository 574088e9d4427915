//! Crate-wide error type.
//!
//! Each subsystem that can fail in more than one way owns its own error
//! enum (see [`crate::table::TableError`], [`crate::log::LogError`],
//! [`crate::env::EnvError`]); this module composes them into a single
//! [`Error`] so callers crossing module boundaries (e.g. a memtable
//! flushing into a table builder) don't have to thread several error
//! types through `?`.
//!
//! The five kinds in spec §7 map onto [`Error`] as follows:
//!
//! | spec kind | variant |
//! |---|---|
//! | `NotFound` | [`Error::NotFound`] |
//! | `Corruption` | [`Error::Corruption`] |
//! | `InvalidArgument` | [`Error::InvalidArgument`] |
//! | `IOError` | [`Error::Io`] |
//! | `Unsupported` | [`Error::Unsupported`] |
//!
//! Programming errors (out-of-order `add`, negative allocation size,
//! operating on a closed/abandoned builder) are not represented here:
//! per spec §7 they are fatal and are reported via `panic!`, not `Result`.

use thiserror::Error;

/// Errors surfaced by the crate's public APIs.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested key has no entry (distinct from a tombstone).
    #[error("not found")]
    NotFound,

    /// On-disk data failed a structural or checksum check.
    #[error("corruption: {0}")]
    Corruption(String),

    /// A caller supplied an argument that violates an API contract
    /// that is not a fatal programming error (e.g. zero-length file name).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Propagated from the [`crate::env::Env`] file-system abstraction.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A recognized but unimplemented on-disk feature (Snappy compression).
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<crate::table::TableError> for Error {
    fn from(e: crate::table::TableError) -> Self {
        match e {
            crate::table::TableError::NotFound => Error::NotFound,
            crate::table::TableError::Io(e) => Error::Io(e),
            crate::table::TableError::Corruption(msg) => Error::Corruption(msg),
            crate::table::TableError::Unsupported(msg) => Error::Unsupported(msg),
            crate::table::TableError::InvalidArgument(msg) => Error::InvalidArgument(msg),
        }
    }
}

impl From<crate::log::LogError> for Error {
    fn from(e: crate::log::LogError) -> Self {
        match e {
            crate::log::LogError::Io(e) => Error::Io(e),
            crate::log::LogError::Corruption(msg) => Error::Corruption(msg),
        }
    }
}

impl From<crate::env::EnvError> for Error {
    fn from(e: crate::env::EnvError) -> Self {
        match e {
            crate::env::EnvError::Io(e) => Error::Io(e),
            crate::env::EnvError::NotFound(msg) => {
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, msg))
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
