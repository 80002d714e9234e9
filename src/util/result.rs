//! Standard error and result types for the library.
use crate::script::ScriptError;
use hex::FromHexError;
use secp256k1::Error as Secp256k1Error;
use std::io;

/// Standard error type used in the library
#[derive(Debug)]
pub enum Error {
    /// An argument provided is invalid
    BadArgument(String),
    /// The data given is not valid
    BadData(String),
    /// Hex string could not be decoded
    FromHexError(FromHexError),
    /// The state is not valid
    IllegalState(String),
    /// Standard library IO error
    IOError(io::Error),
    /// Script evaluation failed with a consensus error code
    Script(ScriptError),
    /// Error in the Secp256k1 library
    Secp256k1Error(Secp256k1Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadArgument(s) => write!(f, "Bad argument: {}", s),
            Error::BadData(s) => write!(f, "Bad data: {}", s),
            Error::FromHexError(e) => write!(f, "Hex decoding error: {}", e),
            Error::IllegalState(s) => write!(f, "Illegal state: {}", s),
            Error::IOError(e) => write!(f, "IO error: {}", e),
            Error::Script(e) => write!(f, "Script error: {}", e),
            Error::Secp256k1Error(e) => write!(f, "Secp256k1 error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FromHexError(e) => Some(e),
            Error::IOError(e) => Some(e),
            Error::Secp256k1Error(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FromHexError> for Error {
    fn from(e: FromHexError) -> Self {
        Error::FromHexError(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IOError(e)
    }
}

impl From<ScriptError> for Error {
    fn from(e: ScriptError) -> Self {
        Error::Script(e)
    }
}

impl From<Secp256k1Error> for Error {
    fn from(e: Secp256k1Error) -> Self {
        Error::Secp256k1Error(e)
    }
}

/// Standard Result used in the library
pub type Result<T> = std::result::Result<T, Error>;
