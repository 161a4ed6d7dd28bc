use crate::api_resolver::ExternalApis;
use crate::callback::AnalysisCallback;
use crate::error::Result;
use crate::setup_gate::Baseline;
use nova_analysis::BuildMetadata;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One compilation round over a subset of the run's sources.
pub trait CompileRound {
    /// Compile the configured sources that are in `include`, reporting facts
    /// to `callback`.
    fn compile(
        &mut self,
        include: &BTreeSet<PathBuf>,
        callback: &mut dyn AnalysisCallback,
    ) -> Result<()>;
}

/// The invalidation fixed point.
///
/// Given the run's sources and a baseline, an engine decides which sources are
/// stale, compiles them through `round` (possibly several times, as API
/// changes propagate) and returns metadata covering every source in
/// `sources`. No engine ships with this crate.
pub trait IncrementalEngine: Send + Sync {
    fn run(
        &self,
        sources: &[PathBuf],
        round: &mut dyn CompileRound,
        baseline: Baseline,
        apis: &dyn ExternalApis,
    ) -> Result<BuildMetadata>;
}
