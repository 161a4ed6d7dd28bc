use crate::callback::AnalysisCallback;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything the primary compiler needs for one invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompilerArguments {
    pub options: Vec<String>,
    pub output: PathBuf,
    pub classpath: Vec<PathBuf>,
    /// Sources to compile.
    pub sources: Vec<PathBuf>,
    /// Secondary-language sources passed along for cross-reference only.
    pub mixed_sources: Vec<PathBuf>,
}

impl CompilerArguments {
    /// Command-line rendering: options, `-d`, `-classpath`, then sources.
    pub fn render(&self) -> Vec<String> {
        let mut args = self.options.clone();
        args.push("-d".to_owned());
        args.push(self.output.to_string_lossy().into_owned());
        if !self.classpath.is_empty() {
            args.push("-classpath".to_owned());
            args.push(join_classpath(&self.classpath));
        }
        args.extend(
            self.sources
                .iter()
                .chain(&self.mixed_sources)
                .map(|source| source.to_string_lossy().into_owned()),
        );
        args
    }
}

pub(crate) fn join_classpath(classpath: &[PathBuf]) -> String {
    match std::env::join_paths(classpath) {
        Ok(joined) => joined.to_string_lossy().into_owned(),
        // An entry containing the separator; fall back to a plain join so
        // the compiler reports the bad entry.
        Err(_) => classpath
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(if cfg!(windows) { ";" } else { ":" }),
    }
}

/// Why a compiler backend did not produce output.
#[derive(Debug, thiserror::Error)]
pub enum CompileFailure {
    /// The compiler ran and reported errors in the sources.
    #[error("{errors} error(s)")]
    Reported { errors: usize, message: String },

    /// The compiler could not be run at all.
    #[error(transparent)]
    Invocation(#[from] io::Error),
}

/// Failure to recover facts from compiled artifacts.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AnalysisFailure {
    pub message: String,
}

impl AnalysisFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The compiler for the primary language. It reports facts as it compiles.
pub trait PrimaryCompiler: Send + Sync {
    /// Entries the compiler searches before the user classpath.
    fn boot_classpath(&self) -> Vec<PathBuf>;

    fn compile(
        &self,
        args: &CompilerArguments,
        callback: &mut dyn AnalysisCallback,
        max_errors: usize,
    ) -> Result<(), CompileFailure>;
}

/// The compiler for secondary-language sources. It only produces artifacts.
pub trait SecondaryCompiler: Send + Sync {
    /// `max_errors` caps the errors the compiler reports; `0` leaves its own
    /// default in place.
    fn compile(
        &self,
        sources: &[PathBuf],
        classpath: &[PathBuf],
        output: &Path,
        options: &[String],
        max_errors: usize,
    ) -> Result<(), CompileFailure>;
}

/// Artifacts produced by one secondary compilation.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisRequest<'a> {
    pub sources: &'a [PathBuf],
    /// Class files that are new or changed since before the compilation.
    pub artifacts: &'a [PathBuf],
    /// Roots of the secondary source trees the sources live in.
    pub source_roots: &'a [PathBuf],
    pub output: &'a Path,
    pub classpath: &'a [PathBuf],
}

/// Recovers facts about secondary sources from their compiled artifacts.
pub trait ArtifactAnalyzer: Send + Sync {
    fn analyze(
        &self,
        request: &AnalysisRequest<'_>,
        callback: &mut dyn AnalysisCallback,
    ) -> Result<(), AnalysisFailure>;
}

/// Handles to the compiler backends of one build.
#[derive(Clone)]
pub struct Compilers {
    pub primary: Arc<dyn PrimaryCompiler>,
    pub secondary: Arc<dyn SecondaryCompiler>,
    pub analyzer: Arc<dyn ArtifactAnalyzer>,
}

impl Compilers {
    pub fn new(
        primary: Arc<dyn PrimaryCompiler>,
        secondary: Arc<dyn SecondaryCompiler>,
        analyzer: Arc<dyn ArtifactAnalyzer>,
    ) -> Self {
        Self {
            primary,
            secondary,
            analyzer,
        }
    }
}

impl fmt::Debug for Compilers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compilers").finish_non_exhaustive()
    }
}
