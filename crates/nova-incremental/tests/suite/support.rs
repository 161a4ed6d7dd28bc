//! Scripted compiler backends and a stamp-driven engine.
//!
//! Sources are small scripts, one directive per line:
//!
//! ```text
//! class p.A                  # generates out/p/A.class
//! api v1                     # reports an API fingerprint
//! dep B.scala                # depends on another source of the project
//! lib sib/out/p/L.class p.L  # loads p.L from a binary, relative to the workspace
//! error                      # fails compilation
//! ```

use nova_analysis::{
    ApiFingerprint, BuildMetadata, BuildSetup, CompileOptions, CompileOrder, Stamp,
};
use nova_analysis_store::{FileStore, MetadataStore, StoreEntry};
use nova_incremental::{
    class_file_name, AnalysisCallback, AnalysisFailure, AnalysisRequest, ArtifactAnalyzer,
    Baseline, CompileFailure, CompileReport, CompileRound, CompilerArguments, Compilers,
    ExternalApis, IncrementalCompiler, IncrementalEngine, PrimaryCompiler, RecordingSink,
    RunConfiguration, RunConfigurationBuilder, SecondaryCompiler, Staleness,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Modification time of every class file the secondary compiler writes,
/// standing in for a file system with coarse timestamps.
const SECONDARY_MTIME: Duration = Duration::from_secs(1_700_000_000);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Primary {
        sources: Vec<PathBuf>,
        mixed_sources: Vec<PathBuf>,
        classpath: Vec<PathBuf>,
    },
    Secondary {
        sources: Vec<PathBuf>,
    },
    Analyze {
        sources: Vec<PathBuf>,
        artifacts: Vec<PathBuf>,
    },
}

pub type Events = Arc<Mutex<Vec<Event>>>;

#[derive(Debug, Default)]
struct Script {
    classes: Vec<String>,
    apis: Vec<String>,
    deps: Vec<String>,
    libs: Vec<(String, String)>,
    error: bool,
}

impl Script {
    fn read(path: &Path) -> Script {
        let text = std::fs::read_to_string(path).unwrap_or_default();
        let mut script = Script::default();
        for line in text.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["class", class] => script.classes.push((*class).to_owned()),
                ["api", rest @ ..] if !rest.is_empty() => script.apis.push(rest.join(" ")),
                ["dep", name] => script.deps.push((*name).to_owned()),
                ["lib", binary, class] => {
                    script.libs.push(((*binary).to_owned(), (*class).to_owned()))
                }
                ["error"] => script.error = true,
                _ => {}
            }
        }
        script
    }
}

/// Where scripts resolve their relative paths.
#[derive(Clone, Debug)]
struct Layout {
    workspace: PathBuf,
    src: PathBuf,
}

impl Layout {
    fn check(&self, sources: &[PathBuf]) -> Result<(), CompileFailure> {
        let broken: Vec<&PathBuf> = sources
            .iter()
            .filter(|source| Script::read(source).error)
            .collect();
        if broken.is_empty() {
            return Ok(());
        }
        Err(CompileFailure::Reported {
            errors: broken.len(),
            message: format!("{} does not compile", broken[0].display()),
        })
    }

    fn write_classes(
        &self,
        sources: &[PathBuf],
        output: &Path,
        mtime: Option<SystemTime>,
    ) -> std::io::Result<()> {
        for source in sources {
            let text = std::fs::read(source)?;
            for class in Script::read(source).classes {
                let product = output.join(class_file_name(&class));
                if let Some(parent) = product.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&product, &text)?;
                if let Some(mtime) = mtime {
                    std::fs::File::options()
                        .write(true)
                        .open(&product)?
                        .set_modified(mtime)?;
                }
            }
        }
        Ok(())
    }

    /// Report the scripted facts of `source`. With `artifacts`, only classes
    /// whose class file is among them are reported as generated.
    fn report(
        &self,
        source: &Path,
        output: &Path,
        artifacts: Option<&[PathBuf]>,
        callback: &mut dyn AnalysisCallback,
    ) {
        let script = Script::read(source);
        for class in &script.classes {
            let product = output.join(class_file_name(class));
            if artifacts.is_some_and(|artifacts| !artifacts.contains(&product)) {
                continue;
            }
            callback.generated_class(source, &product, class);
        }
        for api in &script.apis {
            callback.api(source, ApiFingerprint::from_bytes(api));
        }
        for dep in &script.deps {
            callback.source_dependency(source, &self.src.join(dep));
        }
        for (binary, class) in &script.libs {
            callback.binary_dependency(source, &self.workspace.join(binary), class);
        }
    }
}

pub struct ScriptedPrimary {
    layout: Layout,
    events: Events,
}

impl PrimaryCompiler for ScriptedPrimary {
    fn boot_classpath(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn compile(
        &self,
        args: &CompilerArguments,
        callback: &mut dyn AnalysisCallback,
        _max_errors: usize,
    ) -> Result<(), CompileFailure> {
        self.events.lock().unwrap().push(Event::Primary {
            sources: args.sources.clone(),
            mixed_sources: args.mixed_sources.clone(),
            classpath: args.classpath.clone(),
        });
        self.layout.check(&args.sources)?;
        self.layout.write_classes(&args.sources, &args.output, None)?;
        for source in &args.sources {
            self.layout.report(source, &args.output, None, callback);
        }
        Ok(())
    }
}

pub struct ScriptedSecondary {
    layout: Layout,
    events: Events,
}

impl SecondaryCompiler for ScriptedSecondary {
    fn compile(
        &self,
        sources: &[PathBuf],
        _classpath: &[PathBuf],
        output: &Path,
        _options: &[String],
        _max_errors: usize,
    ) -> Result<(), CompileFailure> {
        self.events.lock().unwrap().push(Event::Secondary {
            sources: sources.to_vec(),
        });
        self.layout.check(sources)?;
        self.layout
            .write_classes(sources, output, Some(SystemTime::UNIX_EPOCH + SECONDARY_MTIME))?;
        Ok(())
    }
}

/// Recovers the scripted facts of secondary sources after the fact. Like a
/// real analyzer it only knows about the artifacts it is handed.
pub struct ScriptedAnalyzer {
    layout: Layout,
    events: Events,
}

impl ArtifactAnalyzer for ScriptedAnalyzer {
    fn analyze(
        &self,
        request: &AnalysisRequest<'_>,
        callback: &mut dyn AnalysisCallback,
    ) -> Result<(), AnalysisFailure> {
        let mut artifacts = request.artifacts.to_vec();
        artifacts.sort();
        self.events.lock().unwrap().push(Event::Analyze {
            sources: request.sources.to_vec(),
            artifacts,
        });
        for source in request.sources {
            self.layout
                .report(source, request.output, Some(request.artifacts), callback);
        }
        Ok(())
    }
}

/// Recompiles sources whose stamps or external APIs changed, then their
/// dependents for as long as APIs keep changing.
#[derive(Debug, Default)]
pub struct StampEngine;

impl StampEngine {
    fn is_stale(
        metadata: &BuildMetadata,
        source: &Path,
        all: &BTreeSet<PathBuf>,
        apis: &dyn ExternalApis,
    ) -> bool {
        let recorded = metadata.stamps.source(source);
        let current = Stamp::hash(source).ok();
        if recorded.is_none() || recorded != current.as_ref() {
            return true;
        }
        let key = source.to_path_buf();
        let relations = &metadata.relations;
        let modified = |path: &Path, recorded: Option<&Stamp>| {
            Stamp::last_modified_or_missing(path).ok().as_ref() != recorded
        };
        relations
            .source_deps
            .forward(&key)
            .any(|dep| !all.contains(dep))
            || relations
                .products_of(source)
                .iter()
                .any(|product| modified(product.as_path(), metadata.stamps.product(product)))
            || relations
                .library_deps
                .forward(&key)
                .any(|binary| modified(binary.as_path(), metadata.stamps.binary(binary)))
            || relations.external_deps.forward(&key).any(|class_name| {
                let current = apis.resolve_class(class_name);
                current.is_empty() || metadata.apis.external_api(class_name) != Some(&current)
            })
    }
}

impl IncrementalEngine for StampEngine {
    fn run(
        &self,
        sources: &[PathBuf],
        round: &mut dyn CompileRound,
        baseline: Baseline,
        apis: &dyn ExternalApis,
    ) -> nova_incremental::Result<BuildMetadata> {
        let Baseline {
            mut metadata,
            staleness,
        } = baseline;
        let all: BTreeSet<PathBuf> = sources.iter().cloned().collect();

        let mut invalid: BTreeSet<PathBuf> = match staleness {
            Staleness::All => all.clone(),
            Staleness::Incremental => all
                .iter()
                .filter(|source| Self::is_stale(&metadata, source, &all, apis))
                .cloned()
                .collect(),
        };

        let mut compiled = BTreeSet::new();
        while !invalid.is_empty() {
            let mut sink = RecordingSink::for_round(&metadata, &invalid);
            round.compile(&invalid, &mut sink)?;
            let delta = sink.into_metadata(apis)?;

            let changed: Vec<PathBuf> = invalid
                .iter()
                .filter(|source| {
                    metadata.apis.internal_api(source) != delta.apis.internal_api(source)
                })
                .cloned()
                .collect();
            metadata.merge(delta);
            compiled.extend(invalid.iter().cloned());

            invalid = changed
                .iter()
                .flat_map(|source| metadata.relations.dependents(source))
                .filter(|dependent| all.contains(dependent) && !compiled.contains(dependent))
                .collect();
        }

        Ok(metadata)
    }
}

/// One project of a workspace: sources under `src/`, classes under `out/`.
pub struct Project {
    pub dir: PathBuf,
    pub setup: BuildSetup,
    pub classpath: Vec<PathBuf>,
    pub lookup: Option<Arc<dyn nova_incremental::MetadataLookup>>,
    pub store: FileStore,
    events: Events,
    layout: Layout,
}

impl Project {
    pub fn new(workspace: &Path, name: &str) -> Self {
        let dir = workspace.join(name);
        let src = dir.join("src");
        std::fs::create_dir_all(&src).unwrap();
        Self {
            setup: BuildSetup::new(
                dir.join("out"),
                CompileOptions::default(),
                "scripted-1.0",
                CompileOrder::Mixed,
            ),
            classpath: Vec::new(),
            lookup: None,
            store: FileStore::new(dir.join("target/analysis.bin")),
            events: Events::default(),
            layout: Layout {
                workspace: workspace.to_path_buf(),
                src,
            },
            dir,
        }
    }

    pub fn src(&self, name: &str) -> PathBuf {
        self.layout.src.join(name)
    }

    pub fn out(&self) -> PathBuf {
        self.setup.output.clone()
    }

    pub fn write(&self, name: &str, script: &str) -> PathBuf {
        let path = self.src(name);
        std::fs::write(&path, script).unwrap();
        path
    }

    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.src(name)).unwrap();
    }

    pub fn compilers(&self) -> Compilers {
        Compilers::new(
            Arc::new(ScriptedPrimary {
                layout: self.layout.clone(),
                events: self.events.clone(),
            }),
            Arc::new(ScriptedSecondary {
                layout: self.layout.clone(),
                events: self.events.clone(),
            }),
            Arc::new(ScriptedAnalyzer {
                layout: self.layout.clone(),
                events: self.events.clone(),
            }),
        )
    }

    pub fn builder(&self, sources: &[&str]) -> RunConfigurationBuilder {
        let mut builder = RunConfiguration::builder(self.setup.clone(), self.compilers())
            .sources(sources.iter().map(|name| self.src(name)))
            .classpath(self.classpath.iter().cloned());
        if let Some(lookup) = &self.lookup {
            builder = builder.project_lookup(lookup.clone());
        }
        builder
    }

    pub fn compile(&self, sources: &[&str]) -> nova_incremental::Result<CompileReport> {
        IncrementalCompiler::new(Arc::new(StampEngine)).compile(self.builder(sources), &self.store)
    }

    pub fn stored(&self) -> Option<StoreEntry> {
        self.store.get().unwrap()
    }

    /// Compiler invocations since the last call.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn paths(&self, names: &[&str]) -> BTreeSet<PathBuf> {
        names.iter().map(|name| self.src(name)).collect()
    }
}
