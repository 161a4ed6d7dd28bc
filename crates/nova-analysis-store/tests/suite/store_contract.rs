use nova_analysis::{
    ApiFingerprint, BuildMetadata, BuildSetup, CompileOptions, CompileOrder, Stamp,
};
use nova_analysis_store::{shared_store, CachedStore, FileStore, MetadataStore};
use std::path::PathBuf;
use std::sync::Arc;

fn setup(version: &str) -> BuildSetup {
    BuildSetup::new(
        "out",
        CompileOptions::new(vec!["-feature".into()], vec!["-g".into()]),
        version,
        CompileOrder::Mixed,
    )
}

fn metadata_with(source: &str) -> BuildMetadata {
    let mut metadata = BuildMetadata::empty();
    let path = PathBuf::from(source);
    metadata
        .stamps
        .sources
        .insert(path.clone(), Stamp::hash_bytes(source.as_bytes()));
    metadata
        .apis
        .internal
        .insert(path.clone(), ApiFingerprint::from_bytes(source));
    metadata
        .relations
        .classes
        .insert(path, source.trim_end_matches(".scala").to_string());
    metadata
}

#[test]
fn set_replaces_the_whole_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileStore::new(tmp.path().join("analysis.bin"));

    store.set(&metadata_with("A.scala"), &setup("1")).unwrap();
    store.set(&metadata_with("B.scala"), &setup("2")).unwrap();

    let (metadata, stored_setup) = store.get().unwrap().unwrap();
    assert_eq!(metadata, metadata_with("B.scala"));
    assert_eq!(stored_setup, setup("2"));
    assert!(!metadata.contains_source(&PathBuf::from("A.scala")));
}

#[test]
fn cached_store_is_transparent_over_file_store() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("analysis.bin");
    let cached = CachedStore::new(FileStore::new(&path));
    let plain = FileStore::new(&path);

    assert_eq!(cached.get().unwrap(), plain.get().unwrap());

    cached.set(&metadata_with("A.scala"), &setup("1")).unwrap();
    assert_eq!(cached.get().unwrap(), plain.get().unwrap());
    assert_eq!(cached.location(), plain.location());
}

#[test]
fn corrupt_file_reads_as_no_previous_analysis() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("analysis.bin");
    std::fs::write(&path, b"definitely not bincode").unwrap();

    let store = FileStore::new(&path);
    assert!(store.get().unwrap().is_none());

    // A later successful run overwrites the garbage.
    store.set(&metadata_with("A.scala"), &setup("1")).unwrap();
    assert!(store.get().unwrap().is_some());
}

#[test]
fn truncated_file_reads_as_no_previous_analysis() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("analysis.bin");
    let store = FileStore::new(&path);
    store.set(&metadata_with("A.scala"), &setup("1")).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(store.get().unwrap().is_none());
}

#[test]
fn unreadable_location_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    // A directory where the file should be.
    let store = FileStore::new(tmp.path());
    assert!(store.get().is_err());
}

#[test]
fn shared_store_sees_its_own_writes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("shared.bin");

    let writer = shared_store(&path);
    writer.set(&metadata_with("A.scala"), &setup("1")).unwrap();

    let reader = shared_store(&path);
    assert!(Arc::ptr_eq(&writer, &reader));
    let (metadata, _) = reader.get().unwrap().unwrap();
    assert_eq!(metadata, metadata_with("A.scala"));
}
