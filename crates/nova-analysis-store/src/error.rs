use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors produced while reading, writing or locking a persisted analysis.
///
/// Problems with the *contents* of a stored analysis (corruption, schema or
/// version mismatch) are not errors: the store reports them as "no previous
/// analysis". Only I/O failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("store location {path} has no file name")]
    InvalidLocation { path: PathBuf },
}
