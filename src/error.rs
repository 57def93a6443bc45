use std::error::Error as StdError;
use std::fmt;

use crate::encoder;

/// API-misuse and data-encoding errors.
///
/// Template syntax problems are deliberately *not* represented here:
/// malformed tokens degrade to literal text during parsing, so
/// rendering itself never fails.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// `register_filter` was called with a name that does not match
    /// `^[a-z]\w*$`.
    InvalidFilterName(String),
    /// The caller-supplied `Serialize` data could not be encoded.
    Encoder(encoder::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidFilterName(ref name) => {
                write!(f, "invalid filter name {:?}: names must start with a lowercase letter followed by word characters", name)
            }
            Error::Encoder(ref err) => write!(f, "failed to encode data: {}", err),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Encoder(ref err) => Some(err),
            Error::InvalidFilterName(_) => None,
        }
    }
}

impl From<encoder::Error> for Error {
    fn from(err: encoder::Error) -> Error {
        Error::Encoder(err)
    }
}
