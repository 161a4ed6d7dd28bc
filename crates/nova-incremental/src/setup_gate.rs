use nova_analysis::{BuildMetadata, BuildSetup};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// How much of the baseline the engine may trust.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Staleness {
    /// Stamps and APIs decide per source what is stale.
    Incremental,
    /// Every source is stale regardless of its stamps.
    All,
}

/// Starting point handed to the incremental engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Baseline {
    /// Previous metadata, restricted to the current sources.
    pub metadata: BuildMetadata,
    pub staleness: Staleness,
}

impl Baseline {
    /// A first build: nothing to reuse.
    pub fn fresh() -> Self {
        Self {
            metadata: BuildMetadata::empty(),
            staleness: Staleness::All,
        }
    }

    pub fn is_fully_stale(&self) -> bool {
        self.staleness == Staleness::All
    }
}

/// Decides whether metadata recorded under one setup may seed a build under
/// another.
pub trait SetupEquivalence: Send + Sync {
    fn equivalent(&self, previous: &BuildSetup, current: &BuildSetup) -> bool;
}

impl<F> SetupEquivalence for F
where
    F: Fn(&BuildSetup, &BuildSetup) -> bool + Send + Sync,
{
    fn equivalent(&self, previous: &BuildSetup, current: &BuildSetup) -> bool {
        self(previous, current)
    }
}

/// [`BuildSetup::is_equivalent`]: everything must match except the order of
/// option units.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSetupEquivalence;

impl SetupEquivalence for DefaultSetupEquivalence {
    fn equivalent(&self, previous: &BuildSetup, current: &BuildSetup) -> bool {
        current.is_equivalent(previous)
    }
}

pub struct SetupGate {
    equivalence: Arc<dyn SetupEquivalence>,
}

impl SetupGate {
    pub fn new(equivalence: Arc<dyn SetupEquivalence>) -> Self {
        Self { equivalence }
    }

    /// Prune `previous` to `sources` and decide how far it can be trusted.
    ///
    /// Any inequivalence between the setups makes the whole baseline stale;
    /// there is no attempt to find out which option changes are harmless.
    pub fn resolve_baseline(
        &self,
        previous: BuildMetadata,
        previous_setup: Option<&BuildSetup>,
        current: &BuildSetup,
        sources: &[PathBuf],
    ) -> Baseline {
        let mut metadata = previous;
        let before = metadata.sources().len();
        let current_sources: BTreeSet<PathBuf> = sources.iter().cloned().collect();
        metadata.retain_sources(&current_sources);

        let staleness = match previous_setup {
            None => {
                tracing::debug!(target: "nova.incremental", "no previous setup; compiling everything");
                Staleness::All
            }
            Some(previous_setup) if !self.equivalence.equivalent(previous_setup, current) => {
                tracing::info!(
                    target: "nova.incremental",
                    previous_version = %previous_setup.compiler_version,
                    current_version = %current.compiler_version,
                    "build setup changed; previous analysis is stale"
                );
                Staleness::All
            }
            Some(_) => Staleness::Incremental,
        };

        tracing::debug!(
            target: "nova.incremental",
            pruned = before - metadata.sources().len(),
            kept = metadata.sources().len(),
            ?staleness,
            "resolved baseline"
        );

        Baseline {
            metadata,
            staleness,
        }
    }
}

impl Default for SetupGate {
    fn default() -> Self {
        Self::new(Arc::new(DefaultSetupEquivalence))
    }
}

impl std::fmt::Debug for SetupGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupGate").finish_non_exhaustive()
    }
}
