use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Keymill errors.
///
/// Topology mistakes (routing a record to a writer index that does not
/// exist, merging more than 255 sub-readers) and session mistakes (two
/// concurrent readers on one store, reading outside a session) are
/// programmer errors and panic instead of surfacing here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// A byte-string or text key component contains an embedded zero byte.
    EmbeddedNul,
    /// The tuple codec was asked to handle a primitive it does not support.
    UnsupportedType(String),
    /// Invalid data, typically decoding errors, corruption, or unexpected internal values.
    InvalidData(String),
    /// Invalid user input, typically unknown pipeline or stage names.
    InvalidInput(String),
    /// An IO error, including opaque failures surfaced by a store backend.
    IO(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::EmbeddedNul => write!(f, "cannot encode embedded zero bytes"),
            Error::UnsupportedType(name) => {
                write!(f, "lexicographic encoding not available for {name}")
            }
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
        }
    }
}

/// Constructs an Error::InvalidData for the given format string.
#[macro_export]
macro_rules! errdata {
    ($($args:tt)*) => { $crate::error::Error::InvalidData(format!($($args)*)) };
}

/// Constructs an Error::InvalidInput for the given format string.
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => { $crate::error::Error::InvalidInput(format!($($args)*)) };
}

/// A keymill Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::IO(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        Error::InvalidData(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::IO(err.to_string())
    }
}
