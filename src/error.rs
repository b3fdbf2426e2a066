//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`], an alias
//! over [`Error`]. Low-level causes (I/O, HDF5, Zstd) are wrapped at the
//! component boundary with the offending object's URI and operation so
//! that a caller sees a single descriptive line rather than a bare
//! `io::Error`.

use std::fmt;
use std::io;
use thiserror::Error;

/// The kinds of failure a Cool or HIC operation can produce.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem, HDF5, or byte-stream I/O failure.
    #[error("I/O error at {uri}: {source}")]
    Io { uri: String, source: io::Error },

    /// Missing magic/group/dataset, unsupported version, wrong dtype.
    #[error("format error in {uri}: {message}")]
    Format { uri: String, message: String },

    /// An on-disk invariant is violated.
    #[error("corrupted file {uri}: {message}")]
    Corruption { uri: String, message: String },

    /// A caller-provided offset, bin, or chromosome id is out of bounds.
    #[error("out of range in {uri}: {message}")]
    OutOfRange { uri: String, message: String },

    /// Malformed query, zero resolution, empty chromosome name, and similar
    /// caller mistakes.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A numeric coercion would drop information.
    #[error("conversion loss: cannot represent {value} as {target_type} without loss")]
    ConversionLoss { value: String, target_type: &'static str },

    /// An operation that requires a capability the file or version does not
    /// provide (e.g. non symmetric-upper storage, a HIC version below the
    /// supported minimum).
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(uri: impl Into<String>, source: io::Error) -> Self {
        Error::Io { uri: uri.into(), source }
    }

    pub fn format(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Format { uri: uri.into(), message: message.into() }
    }

    pub fn corruption(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Corruption { uri: uri.into(), message: message.into() }
    }

    pub fn out_of_range(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Error::OutOfRange { uri: uri.into(), message: message.into() }
    }

    pub fn conversion_loss(value: impl fmt::Display, target_type: &'static str) -> Self {
        Error::ConversionLoss { value: value.to_string(), target_type }
    }
}

/// Helper for wrapping a bare `io::Error` with the URI of the object that
/// produced it. Mirrors the teacher's `#[from]` idiom but for the common
/// case where we also know which file the error came from.
pub(crate) trait WithUri<T> {
    fn with_uri(self, uri: impl Into<String>) -> Result<T>;
}

impl<T> WithUri<T> for io::Result<T> {
    fn with_uri(self, uri: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::io(uri, e))
    }
}
