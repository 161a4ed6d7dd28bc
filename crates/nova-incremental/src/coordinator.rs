use crate::callback::AnalysisCallback;
use crate::compiler::{AnalysisRequest, CompileFailure, CompilerArguments};
use crate::configuration::{absolute, RunConfiguration};
use crate::engine::CompileRound;
use crate::error::{Backend, IncrementalError, Result};
use nova_analysis::{ApiFingerprint, CompileOrder};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Drives both compiler backends for each round the engine asks for.
///
/// The primary compiler reports facts while it compiles. The secondary one
/// cannot, so its new artifacts are handed to the configured
/// [`crate::ArtifactAnalyzer`] afterwards. Both feed the same callback.
///
/// Class files of secondary sources are deleted before those sources are
/// recompiled, so every artifact the compiler writes shows up as new.
#[derive(Debug)]
pub struct DualCompilerCoordinator<'a> {
    config: &'a RunConfiguration,
    rounds: usize,
    compiled: BTreeSet<PathBuf>,
    /// Products reported for secondary sources in earlier rounds of this run.
    secondary_products: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl<'a> DualCompilerCoordinator<'a> {
    pub fn new(config: &'a RunConfiguration) -> Self {
        Self {
            config,
            rounds: 0,
            compiled: BTreeSet::new(),
            secondary_products: BTreeMap::new(),
        }
    }

    /// Rounds run so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Every source compiled in any round so far.
    pub fn compiled_sources(&self) -> &BTreeSet<PathBuf> {
        &self.compiled
    }

    fn compile_primary(
        &self,
        sources: Vec<PathBuf>,
        mixed_sources: Vec<PathBuf>,
        classpath: &[PathBuf],
        callback: &mut dyn AnalysisCallback,
    ) -> Result<()> {
        if sources.is_empty() {
            return Ok(());
        }

        let args = CompilerArguments {
            options: self.config.setup().options.primary.clone(),
            output: self.config.output().to_path_buf(),
            classpath: classpath.to_vec(),
            sources,
            mixed_sources,
        };
        tracing::debug!(
            target: "nova.incremental",
            sources = args.sources.len(),
            mixed_sources = args.mixed_sources.len(),
            "invoking primary compiler"
        );

        self.config
            .compilers()
            .primary
            .compile(&args, callback, self.config.max_errors())
            .map_err(|failure| compile_error(Backend::Primary, failure, args.sources))
    }

    fn compile_secondary(
        &mut self,
        sources: Vec<PathBuf>,
        classpath: &[PathBuf],
        callback: &mut dyn AnalysisCallback,
    ) -> Result<()> {
        if sources.is_empty() {
            return Ok(());
        }

        let config = self.config;
        let output = config.output();
        let compilers = config.compilers();
        self.remove_stale_products(&sources)?;
        tracing::debug!(
            target: "nova.incremental",
            sources = sources.len(),
            "invoking secondary compiler"
        );

        let before = snapshot_class_files(output);
        compilers
            .secondary
            .compile(
                &sources,
                classpath,
                output,
                &config.setup().options.secondary,
                config.max_errors(),
            )
            .map_err(|failure| compile_error(Backend::Secondary, failure, sources.clone()))?;
        let after = snapshot_class_files(output);

        let artifacts: Vec<PathBuf> = after
            .into_iter()
            .filter(|(path, stamp)| before.get(path) != Some(stamp))
            .map(|(path, _)| path)
            .collect();

        let request = AnalysisRequest {
            sources: &sources,
            artifacts: &artifacts,
            source_roots: config.secondary_source_roots(),
            output,
            classpath,
        };
        tracing::debug!(
            target: "nova.incremental",
            sources = sources.len(),
            artifacts = artifacts.len(),
            "analyzing secondary artifacts"
        );
        let mut tracker = ProductTracker {
            inner: callback,
            products: &mut self.secondary_products,
        };
        compilers
            .analyzer
            .analyze(&request, &mut tracker)
            .map_err(|err| IncrementalError::Analysis {
                sources: sources.clone(),
                message: err.message,
            })
    }

    /// Delete the class files last produced by `sources`, whether recorded by
    /// the previous build or reported in an earlier round of this one.
    ///
    /// Only files under the output directory are touched.
    fn remove_stale_products(&mut self, sources: &[PathBuf]) -> Result<()> {
        let config = self.config;
        let previous = &config.previous_metadata().relations;
        let output = absolute(config.output());

        let mut stale = BTreeSet::new();
        for source in sources {
            stale.extend(previous.products_of(source));
            stale.extend(self.secondary_products.remove(source).unwrap_or_default());
        }

        let mut removed = 0usize;
        for product in stale.iter().filter(|product| absolute(product).starts_with(&output)) {
            match std::fs::remove_file(product) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(IncrementalError::Output {
                        path: product.clone(),
                        source,
                    })
                }
            }
        }
        tracing::debug!(
            target: "nova.incremental",
            sources = sources.len(),
            removed,
            "removed previous secondary products"
        );
        Ok(())
    }
}

/// Forwards analyzer facts, remembering which products each source generated.
struct ProductTracker<'c, 'p> {
    inner: &'c mut dyn AnalysisCallback,
    products: &'p mut BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl AnalysisCallback for ProductTracker<'_, '_> {
    fn api(&mut self, source: &Path, api: ApiFingerprint) {
        self.inner.api(source, api);
    }

    fn generated_class(&mut self, source: &Path, product: &Path, class_name: &str) {
        self.products
            .entry(source.to_path_buf())
            .or_default()
            .insert(product.to_path_buf());
        self.inner.generated_class(source, product, class_name);
    }

    fn source_dependency(&mut self, source: &Path, on: &Path) {
        self.inner.source_dependency(source, on);
    }

    fn binary_dependency(&mut self, source: &Path, binary: &Path, class_name: &str) {
        self.inner.binary_dependency(source, binary, class_name);
    }
}

/// Classpath handed to both compilers: the output directory, then the user
/// classpath without it.
fn compile_classpath(output: &Path, classpath: &[PathBuf]) -> Vec<PathBuf> {
    let absolute_output = absolute(output);
    let mut entries = vec![output.to_path_buf()];
    entries.extend(
        classpath
            .iter()
            .filter(|entry| absolute(entry) != absolute_output)
            .cloned(),
    );
    entries
}

impl CompileRound for DualCompilerCoordinator<'_> {
    fn compile(
        &mut self,
        include: &BTreeSet<PathBuf>,
        callback: &mut dyn AnalysisCallback,
    ) -> Result<()> {
        let config = self.config;
        let output = config.output();
        std::fs::create_dir_all(output).map_err(|source| IncrementalError::Output {
            path: output.to_path_buf(),
            source,
        })?;

        let configured: BTreeSet<&PathBuf> = config.sources().iter().collect();
        for ignored in include.iter().filter(|path| !configured.contains(path)) {
            tracing::debug!(
                target: "nova.incremental",
                path = %ignored.display(),
                "ignoring included path that is not a source of this run"
            );
        }

        let round_sources: Vec<&PathBuf> = config
            .sources()
            .iter()
            .filter(|source| include.contains(*source))
            .collect();
        let (primary, secondary) = config
            .classifier()
            .partition(round_sources.iter().copied());

        self.rounds += 1;
        tracing::info!(
            target: "nova.incremental",
            round = self.rounds,
            primary = primary.len(),
            secondary = secondary.len(),
            "starting compilation round"
        );

        let classpath = compile_classpath(config.output(), config.classpath());
        let order = config.setup().order;
        let mixed_sources = if order == CompileOrder::Mixed {
            secondary.clone()
        } else {
            Vec::new()
        };

        match order {
            CompileOrder::Mixed | CompileOrder::PrimaryThenSecondary => {
                self.compile_primary(primary, mixed_sources, &classpath, callback)?;
                self.compile_secondary(secondary, &classpath, callback)?;
            }
            CompileOrder::SecondaryThenPrimary => {
                self.compile_secondary(secondary, &classpath, callback)?;
                self.compile_primary(primary, mixed_sources, &classpath, callback)?;
            }
        }

        self.compiled
            .extend(round_sources.into_iter().cloned());
        Ok(())
    }
}

fn compile_error(backend: Backend, failure: CompileFailure, sources: Vec<PathBuf>) -> IncrementalError {
    match failure {
        CompileFailure::Reported { errors, message } => {
            tracing::debug!(
                target: "nova.incremental",
                %backend,
                errors,
                message = %message,
                "compilation failed"
            );
            IncrementalError::Compile {
                backend,
                errors,
                sources,
            }
        }
        CompileFailure::Invocation(source) => {
            IncrementalError::CompilerInvocation { backend, source }
        }
    }
}

/// `(len, mtime)` of every class file under `output`.
fn snapshot_class_files(output: &Path) -> BTreeMap<PathBuf, (u64, Option<SystemTime>)> {
    walkdir::WalkDir::new(output)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension() == Some(OsStr::new("class")))
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            Some((entry.into_path(), (meta.len(), meta.modified().ok())))
        })
        .collect()
}
