use crate::classpath::explicit_boot_classpath;
use crate::compiler::Compilers;
use crate::config::IncrementalConfig;
use crate::error::{IncrementalError, Result, StorePhase};
use crate::lookup::{MetadataLookup, NoProjects};
use crate::sources::SourceClassifier;
use nova_analysis::{BuildMetadata, BuildSetup};
use nova_analysis_store::MetadataStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable inputs of one compilation run.
#[derive(Debug)]
pub struct RunConfiguration {
    sources: Vec<PathBuf>,
    classpath: Vec<PathBuf>,
    search_classpath: Vec<PathBuf>,
    secondary_source_roots: Vec<PathBuf>,
    previous_metadata: BuildMetadata,
    previous_setup: Option<BuildSetup>,
    setup: BuildSetup,
    lookup: Arc<dyn MetadataLookup>,
    max_errors: usize,
    compilers: Compilers,
    classifier: SourceClassifier,
}

impl RunConfiguration {
    pub fn builder(setup: BuildSetup, compilers: Compilers) -> RunConfigurationBuilder {
        RunConfigurationBuilder::new(setup, compilers)
    }

    /// All sources of the run, without duplicates, in the order given.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// User classpath, made absolute.
    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    /// Where classes are looked up: boot entries first, then [`Self::classpath`].
    pub fn search_classpath(&self) -> &[PathBuf] {
        &self.search_classpath
    }

    pub fn secondary_source_roots(&self) -> &[PathBuf] {
        &self.secondary_source_roots
    }

    pub fn previous_metadata(&self) -> &BuildMetadata {
        &self.previous_metadata
    }

    /// `None` when there is no usable previous build.
    pub fn previous_setup(&self) -> Option<&BuildSetup> {
        self.previous_setup.as_ref()
    }

    pub fn setup(&self) -> &BuildSetup {
        &self.setup
    }

    pub fn output(&self) -> &Path {
        &self.setup.output
    }

    pub fn lookup(&self) -> &Arc<dyn MetadataLookup> {
        &self.lookup
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub fn compilers(&self) -> &Compilers {
        &self.compilers
    }

    pub fn classifier(&self) -> &SourceClassifier {
        &self.classifier
    }
}

pub struct RunConfigurationBuilder {
    setup: BuildSetup,
    compilers: Compilers,
    sources: Vec<PathBuf>,
    classpath: Vec<PathBuf>,
    secondary_source_roots: Vec<PathBuf>,
    lookup: Arc<dyn MetadataLookup>,
    max_errors: usize,
    classifier: SourceClassifier,
}

impl RunConfigurationBuilder {
    pub fn new(setup: BuildSetup, compilers: Compilers) -> Self {
        let config = IncrementalConfig::default();
        Self {
            setup,
            compilers,
            sources: Vec::new(),
            classpath: Vec::new(),
            secondary_source_roots: Vec::new(),
            lookup: Arc::new(NoProjects),
            max_errors: config.max_errors,
            classifier: config.classifier(),
        }
    }

    /// Take the error budget, compile order and source classification from
    /// `config`.
    pub fn with_config(mut self, config: &IncrementalConfig) -> Self {
        self.setup.order = config.compile_order;
        self.max_errors(config.max_errors)
            .classifier(config.classifier())
    }

    pub fn sources<I, P>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn classpath<I, P>(mut self, classpath: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.classpath = classpath.into_iter().map(Into::into).collect();
        self
    }

    /// Roots of the secondary-language source trees, for the artifact analyzer.
    pub fn secondary_source_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.secondary_source_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn project_lookup(mut self, lookup: Arc<dyn MetadataLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn classifier(mut self, classifier: SourceClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Assemble the configuration, reading `store` exactly once.
    ///
    /// An empty or unusable store yields empty metadata and no previous setup.
    /// Only a store that cannot be accessed is an error.
    pub fn build(self, store: &dyn MetadataStore) -> Result<RunConfiguration> {
        let (previous_metadata, previous_setup) = match store.get() {
            Ok(Some((metadata, setup))) => (metadata, Some(setup)),
            Ok(None) => (BuildMetadata::empty(), None),
            Err(err) => {
                return Err(IncrementalError::store(
                    StorePhase::Read,
                    store.location(),
                    err,
                ))
            }
        };

        let mut seen = HashSet::new();
        let sources: Vec<PathBuf> = self
            .sources
            .into_iter()
            .filter(|source| seen.insert(source.clone()))
            .collect();

        let classpath: Vec<PathBuf> = self.classpath.iter().map(|p| absolute(p)).collect();

        let mut search_classpath = explicit_boot_classpath(&self.setup.options.primary);
        search_classpath.extend(self.compilers.primary.boot_classpath());
        search_classpath.extend(classpath.iter().cloned());

        tracing::debug!(
            target: "nova.incremental",
            sources = sources.len(),
            classpath = classpath.len(),
            search_classpath = search_classpath.len(),
            previous_sources = previous_metadata.sources().len(),
            has_previous_setup = previous_setup.is_some(),
            "assembled run configuration"
        );

        Ok(RunConfiguration {
            sources,
            classpath,
            search_classpath,
            secondary_source_roots: self.secondary_source_roots,
            previous_metadata,
            previous_setup,
            setup: self.setup,
            lookup: self.lookup,
            max_errors: self.max_errors,
            compilers: self.compilers,
            classifier: self.classifier,
        })
    }
}

impl std::fmt::Debug for RunConfigurationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfigurationBuilder")
            .field("setup", &self.setup)
            .field("sources", &self.sources.len())
            .field("classpath", &self.classpath)
            .finish_non_exhaustive()
    }
}

/// `path` made absolute against the working directory, without touching the
/// file system.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
