//! Incremental compilation of mixed primary/secondary-language source trees.
//!
//! One run goes through these steps, all while holding the project's store
//! (see [`nova_analysis_store::RunScope`]):
//!
//! 1. [`RunConfigurationBuilder::build`] reads the previous `(metadata, setup)`
//!    once and fixes every input of the run.
//! 2. [`SetupGate`] prunes the previous metadata to the current sources and
//!    decides whether it can be trusted at all.
//! 3. An [`IncrementalEngine`] works out what is stale and asks the
//!    [`DualCompilerCoordinator`] to compile it, round by round. Facts from
//!    both compilers land in one [`AnalysisCallback`]; dependencies on sibling
//!    projects are resolved by the [`ExternalApiResolver`].
//! 4. The resulting metadata replaces the stored entry.
//!
//! [`IncrementalCompiler`] ties these together.

mod api_resolver;
mod callback;
mod classpath;
mod command;
mod compiler;
mod config;
mod configuration;
mod coordinator;
mod driver;
mod engine;
mod error;
mod javac;
mod lookup;
mod setup_gate;
mod sources;

pub use api_resolver::{ExternalApiResolver, ExternalApis};
pub use callback::{AnalysisCallback, RecordingSink};
pub use classpath::{class_file_name, explicit_boot_classpath, ClasspathEntry, ClasspathLocator};
pub use command::{CommandOutput, CommandRunner, DefaultCommandRunner};
pub use compiler::{
    AnalysisFailure, AnalysisRequest, ArtifactAnalyzer, CompileFailure, CompilerArguments,
    Compilers, PrimaryCompiler, SecondaryCompiler,
};
pub use config::{init_tracing, ConfigError, IncrementalConfig, LoggingConfig, StoreConfig};
pub use configuration::{RunConfiguration, RunConfigurationBuilder};
pub use coordinator::DualCompilerCoordinator;
pub use driver::{CompileReport, IncrementalCompiler};
pub use engine::{CompileRound, IncrementalEngine};
pub use error::{Backend, IncrementalError, Result, StorePhase};
pub use javac::{count_javac_errors, JavacCompiler};
pub use lookup::{MetadataLookup, NoProjects, StoreLookup};
pub use setup_gate::{Baseline, DefaultSetupEquivalence, SetupEquivalence, SetupGate, Staleness};
pub use sources::{SourceClassifier, SourceKind};
