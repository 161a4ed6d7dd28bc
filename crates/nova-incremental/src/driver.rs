use crate::api_resolver::ExternalApiResolver;
use crate::configuration::RunConfigurationBuilder;
use crate::coordinator::DualCompilerCoordinator;
use crate::engine::IncrementalEngine;
use crate::error::{IncrementalError, Result, StorePhase};
use crate::setup_gate::{DefaultSetupEquivalence, SetupEquivalence, SetupGate};
use nova_analysis::BuildMetadata;
use nova_analysis_store::{lock_path_for, MetadataStore, RunScope};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Dispatch;

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileReport {
    /// What was stored for the next run.
    pub metadata: BuildMetadata,
    pub rounds: usize,
    pub compiled_sources: BTreeSet<PathBuf>,
}

/// Runs a whole incremental build against one store.
pub struct IncrementalCompiler {
    engine: Arc<dyn IncrementalEngine>,
    equivalence: Arc<dyn SetupEquivalence>,
    ambient: Option<Dispatch>,
}

impl IncrementalCompiler {
    pub fn new(engine: Arc<dyn IncrementalEngine>) -> Self {
        Self {
            engine,
            equivalence: Arc::new(DefaultSetupEquivalence),
            ambient: None,
        }
    }

    pub fn with_equivalence(mut self, equivalence: Arc<dyn SetupEquivalence>) -> Self {
        self.equivalence = equivalence;
        self
    }

    /// Logging target for everything that happens while the run holds the
    /// store, compiler backends included.
    pub fn with_ambient_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.ambient = Some(dispatch);
        self
    }

    /// Read, compile, write.
    ///
    /// The store location stays locked for the whole run. Nothing is written
    /// unless every round succeeded.
    pub fn compile(
        &self,
        builder: RunConfigurationBuilder,
        store: &dyn MetadataStore,
    ) -> Result<CompileReport> {
        let _scope = RunScope::enter(store, self.ambient.as_ref()).map_err(|err| {
            IncrementalError::store(StorePhase::Lock, lock_path_for(store.location()), err)
        })?;

        let config = builder.build(store)?;
        let gate = SetupGate::new(self.equivalence.clone());
        let baseline = gate.resolve_baseline(
            config.previous_metadata().clone(),
            config.previous_setup(),
            config.setup(),
            config.sources(),
        );

        let resolver = ExternalApiResolver::new(config.search_classpath(), config.lookup().clone());
        let mut coordinator = DualCompilerCoordinator::new(&config);
        let mut metadata =
            self.engine
                .run(config.sources(), &mut coordinator, baseline, &resolver)?;

        let current: BTreeSet<PathBuf> = config.sources().iter().cloned().collect();
        metadata.retain_sources(&current);
        let missing = metadata.missing_entries(&current);
        if !missing.is_empty() {
            return Err(IncrementalError::Engine(format!(
                "engine returned no analysis for {} source(s), e.g. {}",
                missing.len(),
                missing[0].display()
            )));
        }

        store
            .set(&metadata, config.setup())
            .map_err(|err| IncrementalError::store(StorePhase::Write, store.location(), err))?;

        tracing::info!(
            target: "nova.incremental",
            sources = current.len(),
            rounds = coordinator.rounds(),
            compiled = coordinator.compiled_sources().len(),
            "incremental compilation finished"
        );

        Ok(CompileReport {
            rounds: coordinator.rounds(),
            compiled_sources: coordinator.compiled_sources().clone(),
            metadata,
        })
    }
}

impl std::fmt::Debug for IncrementalCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalCompiler")
            .field("ambient", &self.ambient.is_some())
            .finish_non_exhaustive()
    }
}
