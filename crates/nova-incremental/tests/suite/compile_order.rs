use crate::suite::support::{Event, Project};
use nova_analysis::{ApiFingerprint, CompileOrder};

fn mixed_sources(project: &Project) {
    project.write("A.scala", "class p.A\napi a-v1\n");
    project.write("B.scala", "class p.B\napi b-v1\ndep C.java\n");
    project.write("C.java", "class q.C\napi c-v1\ndep A.scala\n");
}

const SOURCES: [&str; 3] = ["A.scala", "B.scala", "C.java"];

#[test]
fn mixed_order_runs_primary_with_secondary_sources_then_secondary() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    mixed_sources(&project);

    let report = project.compile(&SOURCES).unwrap();

    assert_eq!(report.rounds, 1);
    assert_eq!(
        project.take_events(),
        vec![
            Event::Primary {
                sources: vec![project.src("A.scala"), project.src("B.scala")],
                mixed_sources: vec![project.src("C.java")],
                classpath: vec![project.out()],
            },
            Event::Secondary {
                sources: vec![project.src("C.java")],
            },
            Event::Analyze {
                sources: vec![project.src("C.java")],
                artifacts: vec![project.out().join("q/C.class")],
            },
        ]
    );

    let metadata = &report.metadata;
    assert_eq!(metadata.sources(), project.paths(&SOURCES));
    assert_eq!(
        metadata.apis.internal_api(&project.src("C.java")),
        Some(&ApiFingerprint::from_bytes("c-v1"))
    );
    assert_eq!(
        metadata.defining_source("q.C"),
        Some(&project.src("C.java"))
    );
    assert_eq!(
        metadata.relations.dependents(&project.src("A.scala")),
        project.paths(&["C.java"])
    );
    assert_eq!(
        metadata.relations.dependents(&project.src("C.java")),
        project.paths(&["B.scala"])
    );
}

#[test]
fn secondary_then_primary_order_is_honored() {
    let tmp = tempfile::tempdir().unwrap();
    let mut project = Project::new(tmp.path(), "app");
    project.setup.order = CompileOrder::SecondaryThenPrimary;
    mixed_sources(&project);

    project.compile(&SOURCES).unwrap();

    let events = project.take_events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], Event::Secondary { .. }));
    assert!(matches!(events[1], Event::Analyze { .. }));
    assert_eq!(
        events[2],
        Event::Primary {
            sources: vec![project.src("A.scala"), project.src("B.scala")],
            mixed_sources: Vec::new(),
            classpath: vec![project.out()],
        }
    );
}

#[test]
fn primary_then_secondary_order_hides_secondary_sources_from_primary() {
    let tmp = tempfile::tempdir().unwrap();
    let mut project = Project::new(tmp.path(), "app");
    project.setup.order = CompileOrder::PrimaryThenSecondary;
    mixed_sources(&project);

    project.compile(&SOURCES).unwrap();

    let events = project.take_events();
    assert_eq!(events.len(), 3);
    match &events[0] {
        Event::Primary { mixed_sources, .. } => assert!(mixed_sources.is_empty()),
        other => panic!("expected primary compilation first, got {other:?}"),
    }
    assert!(matches!(events[1], Event::Secondary { .. }));
    assert!(matches!(events[2], Event::Analyze { .. }));
}

#[test]
fn secondary_compiler_is_skipped_without_secondary_sources() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("A.scala", "class p.A\napi a-v1\n");

    project.compile(&["A.scala"]).unwrap();

    let events = project.take_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::Primary { .. }));
}

#[test]
fn primary_compiler_is_skipped_without_primary_sources() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("C.java", "class q.C\napi c-v1\n");

    let report = project.compile(&["C.java"]).unwrap();

    let events = project.take_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::Secondary { .. }));
    assert!(matches!(events[1], Event::Analyze { .. }));
    assert!(report.metadata.contains_source(&project.src("C.java")));
}

#[test]
fn analyzer_only_sees_artifacts_of_the_current_round() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("C.java", "class q.C\napi c-v1\n");
    project.write("D.java", "class q.D\napi d-v1\n");
    project.compile(&["C.java", "D.java"]).unwrap();
    project.take_events();

    project.write("D.java", "class q.D\napi d-v1\n# edited\n");
    project.compile(&["C.java", "D.java"]).unwrap();

    let analyzed: Vec<Event> = project
        .take_events()
        .into_iter()
        .filter(|event| matches!(event, Event::Analyze { .. }))
        .collect();
    assert_eq!(
        analyzed,
        vec![Event::Analyze {
            sources: vec![project.src("D.java")],
            artifacts: vec![project.out().join("q/D.class")],
        }]
    );
}

#[test]
fn same_size_rewrite_with_unchanged_mtime_reaches_the_analyzer() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("C.java", "class q.C\napi c-v1\n");
    project.compile(&["C.java"]).unwrap();
    project.take_events();

    // Same length, and the scripted compiler pins class file mtimes, so the
    // rewritten class file looks untouched on disk.
    project.write("C.java", "class q.C\napi c-v2\n");
    let report = project.compile(&["C.java"]).unwrap();

    let class_file = project.out().join("q/C.class");
    assert_eq!(
        project.take_events().last(),
        Some(&Event::Analyze {
            sources: vec![project.src("C.java")],
            artifacts: vec![class_file.clone()],
        })
    );
    let metadata = &report.metadata;
    assert_eq!(metadata.defining_source("q.C"), Some(&project.src("C.java")));
    assert_eq!(
        metadata.relations.products_of(&project.src("C.java")),
        [class_file].into_iter().collect()
    );
    assert_eq!(
        metadata.apis.internal_api(&project.src("C.java")),
        Some(&ApiFingerprint::from_bytes("c-v2"))
    );
}

#[test]
fn classes_dropped_from_a_secondary_source_are_deleted() {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path(), "app");
    project.write("C.java", "class q.C\nclass q.Helper\napi c-v1\n");
    project.compile(&["C.java"]).unwrap();
    assert!(project.out().join("q/Helper.class").exists());

    project.write("C.java", "class q.C\napi c-v1\n");
    let report = project.compile(&["C.java"]).unwrap();

    assert!(!project.out().join("q/Helper.class").exists());
    assert!(project.out().join("q/C.class").exists());
    assert_eq!(report.metadata.defining_source("q.Helper"), None);
}
