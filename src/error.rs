use thiserror::Error;

/// Stable, string-typed errors for the ledger core.
///
/// Each variant's `Display` message is load-bearing: callers (including the
/// CLI) compare against these strings, so wording changes are breaking.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request")]
    BadRequest,

    #[error("resource not found")]
    NotFound,

    #[error("bucket does not exist")]
    BucketNotExist,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(err: sled::transaction::TransactionError<Error>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => Error::Internal(e.to_string()),
        }
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
