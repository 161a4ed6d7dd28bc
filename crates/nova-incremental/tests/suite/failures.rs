use crate::suite::support::{Project, StampEngine};
use nova_analysis::BuildMetadata;
use nova_analysis_store::{shared_store, MetadataStore};
use nova_incremental::{
    Backend, Baseline, CompileRound, ExternalApis, IncrementalCompiler, IncrementalEngine,
    IncrementalError, StorePhase,
};
use std::path::PathBuf;
use std::sync::{Arc, Barrier};

#[test]
fn compile_error_leaves_the_store_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("A.scala", "class p.A\napi a-v1\n");
    project.write("B.scala", "class p.B\napi b-v1\n");
    project.compile(&["A.scala", "B.scala"]).unwrap();
    let before = project.stored().unwrap();

    project.write("B.scala", "class p.B\napi b-v2\nerror\n");
    let err = project.compile(&["A.scala", "B.scala"]).unwrap_err();

    match err {
        IncrementalError::Compile {
            backend,
            errors,
            sources,
        } => {
            assert_eq!(backend, Backend::Primary);
            assert_eq!(errors, 1);
            assert_eq!(sources, vec![project.src("B.scala")]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(project.stored().unwrap(), before);

    // Fixing the source picks up where the failed run left off.
    project.write("B.scala", "class p.B\napi b-v2\n");
    let report = project.compile(&["A.scala", "B.scala"]).unwrap();
    assert_eq!(report.compiled_sources, project.paths(&["B.scala"]));
}

#[test]
fn failed_first_build_stores_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("C.java", "class q.C\nerror\n");

    let err = project.compile(&["C.java"]).unwrap_err();

    assert!(matches!(
        err,
        IncrementalError::Compile {
            backend: Backend::Secondary,
            ..
        }
    ));
    assert!(project.stored().is_none());
}

#[test]
fn unreadable_store_fails_before_compiling() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("A.scala", "class p.A\n");
    std::fs::create_dir_all(project.store.location()).unwrap();

    let err = project.compile(&["A.scala"]).unwrap_err();

    assert!(matches!(
        err,
        IncrementalError::Store {
            phase: StorePhase::Read,
            ..
        }
    ));
    assert!(project.take_events().is_empty());
}

struct ForgetfulEngine;

impl IncrementalEngine for ForgetfulEngine {
    fn run(
        &self,
        _sources: &[PathBuf],
        _round: &mut dyn CompileRound,
        _baseline: Baseline,
        _apis: &dyn ExternalApis,
    ) -> nova_incremental::Result<BuildMetadata> {
        Ok(BuildMetadata::empty())
    }
}

#[test]
fn incomplete_engine_result_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("A.scala", "class p.A\n");

    let err = IncrementalCompiler::new(Arc::new(ForgetfulEngine))
        .compile(project.builder(&["A.scala"]), &project.store)
        .unwrap_err();

    assert!(matches!(err, IncrementalError::Engine(_)));
    assert!(project.stored().is_none());
}

#[test]
fn concurrent_runs_on_one_store_are_serialized() {
    const THREADS: usize = 4;

    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("A.scala", "class p.A\napi a-v1\n");
    project.write("B.scala", "class p.B\napi b-v1\ndep A.scala\n");
    project.write("C.scala", "class p.C\napi c-v1\n");
    let store = shared_store(project.store.location());
    let barrier = Barrier::new(THREADS);

    let compiled: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    IncrementalCompiler::new(Arc::new(StampEngine))
                        .compile(
                            project.builder(&["A.scala", "B.scala", "C.scala"]),
                            store.as_ref(),
                        )
                        .unwrap()
                        .compiled_sources
                        .len()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).sum()
    });

    // Exactly one run saw an empty store; the rest found nothing to do.
    assert_eq!(compiled, 3);
    assert_eq!(
        store.get().unwrap().unwrap().0.sources(),
        project.paths(&["A.scala", "B.scala", "C.scala"])
    );
}
