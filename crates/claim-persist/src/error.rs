//! Persistence error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    /// LMDB error.
    #[error("database error: {0}")]
    Database(#[from] heed::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A ledger key that is not a uuid.
    #[error("malformed ledger key: {0:?}")]
    MalformedKey(String),

    /// The writer thread has already shut down.
    #[error("persistence worker is closed")]
    WorkerClosed,
}

pub type PersistResult<T> = Result<T, PersistError>;
