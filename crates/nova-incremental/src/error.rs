use nova_analysis_store::StoreError;
use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IncrementalError>;

/// Which of the two compiler backends a failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    Primary,
    Secondary,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Primary => f.write_str("primary"),
            Backend::Secondary => f.write_str("secondary"),
        }
    }
}

/// Step of a run that touched the metadata store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorePhase {
    Lock,
    Read,
    Write,
}

impl fmt::Display for StorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorePhase::Lock => f.write_str("lock"),
            StorePhase::Read => f.write_str("read"),
            StorePhase::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IncrementalError {
    #[error("failed to {phase} analysis store {path}: {source}")]
    Store {
        phase: StorePhase,
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("{backend} compilation failed with {errors} error(s) in {} source(s)", sources.len())]
    Compile {
        backend: Backend,
        errors: usize,
        sources: Vec<PathBuf>,
    },

    #[error("failed to run the {backend} compiler: {source}")]
    CompilerInvocation {
        backend: Backend,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis of compiled artifacts failed for {} source(s): {message}", sources.len())]
    Analysis {
        sources: Vec<PathBuf>,
        message: String,
    },

    #[error("failed to prepare output directory {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stamp {path}: {source}")]
    Stamp {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("incremental engine failed: {0}")]
    Engine(String),
}

impl IncrementalError {
    pub(crate) fn store(phase: StorePhase, path: impl Into<PathBuf>, source: StoreError) -> Self {
        IncrementalError::Store {
            phase,
            path: path.into(),
            source,
        }
    }
}
