//! SST block format, builder, reader, and two-level iteration
//! (spec §3 "SST block"/"SST table", §4.4–§4.8), grouped the way the
//! teacher crate groups its own `sstable` submodule tree.

pub mod block;
pub mod builder;
pub mod filter_block;
pub mod format;
pub mod reader;
pub mod two_level;

use std::io;

use thiserror::Error;

pub use builder::TableBuilder;
pub use reader::Table;

/// Errors from building, opening, or reading an SST file.
#[derive(Debug, Error)]
pub enum TableError {
    /// The requested key has no entry (distinct from a tombstone).
    #[error("not found")]
    NotFound,
    /// Propagated from the [`crate::env::Env`] abstraction (including a
    /// missing file, reported with [`io::ErrorKind::NotFound`]).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A structural or checksum check failed on on-disk data.
    #[error("corruption: {0}")]
    Corruption(String),
    /// A recognized but unimplemented feature (Snappy-compressed block).
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A caller supplied an argument violating an API contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub(crate) type Result<T> = std::result::Result<T, TableError>;

impl From<format::FormatError> for TableError {
    fn from(e: format::FormatError) -> Self {
        TableError::Corruption(e.to_string())
    }
}

impl From<crate::env::EnvError> for TableError {
    fn from(e: crate::env::EnvError) -> Self {
        match e {
            crate::env::EnvError::Io(io_err) => TableError::Io(io_err),
            crate::env::EnvError::NotFound(msg) => {
                TableError::Io(io::Error::new(io::ErrorKind::NotFound, msg))
            }
        }
    }
}

impl From<crate::error::Error> for TableError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::NotFound => TableError::NotFound,
            crate::error::Error::Corruption(msg) => TableError::Corruption(msg),
            crate::error::Error::InvalidArgument(msg) => TableError::InvalidArgument(msg),
            crate::error::Error::Io(io_err) => TableError::Io(io_err),
            crate::error::Error::Unsupported(msg) => TableError::Unsupported(msg),
        }
    }
}
