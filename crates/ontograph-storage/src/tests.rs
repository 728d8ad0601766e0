//! Lifecycle tests against an in-memory remote

use super::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

const MANIFEST_URL: &str = "mem://manifest.json";

// CSO layout: the broader topic is the subject.
const SOURCE_V1: &str = "\
\"artificial intelligence\";klink:broaderGeneric;\"machine learning\"
\"machine learning\";rdfs:label;\"machine learning\"
\"artificial intelligence\";rdfs:label;\"artificial intelligence\"
";

const SOURCE_V2: &str = "\
\"artificial intelligence\";klink:broaderGeneric;\"machine learning\"
\"machine learning\";klink:broaderGeneric;\"deep learning\"
\"machine learning\";rdfs:label;\"machine learning\"
\"artificial intelligence\";rdfs:label;\"artificial intelligence\"
\"deep learning\";rdfs:label;\"deep learning\"
";

/// URL → body. A missing URL is a network failure.
#[derive(Clone, Default)]
struct MemoryRemote {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MemoryRemote {
    fn publish(&self, version: &str, body: &str) {
        let url = format!("mem://cso_v{version}.csv");
        let manifest = format!(r#"{{"last_version": {{"version": "{version}", "url": "{url}"}}}}"#);
        let mut files = self.files.lock().unwrap();
        files.insert(MANIFEST_URL.to_string(), manifest.into_bytes());
        files.insert(url, body.as_bytes().to_vec());
    }

    fn withdraw(&self, version: &str) {
        let url = format!("mem://cso_v{version}.csv");
        self.files.lock().unwrap().remove(&url);
    }

    fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

impl RemoteSource for MemoryRemote {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| StorageError::Network(format!("connection refused: {url}")))
    }
}

fn test_store() -> (OntologyStore, MemoryRemote, TempDir) {
    let dir = tempdir().unwrap();
    let mut config = StorageConfig::default().with_data_dir(dir.path().join("data"));
    config.remote.manifest_url = MANIFEST_URL.to_string();
    config.remote.base_url = "mem://".to_string();

    let remote = MemoryRemote::default();
    let store = OntologyStore::new(config, Box::new(remote.clone()));
    (store, remote, dir)
}

#[test]
fn test_setup_downloads_builds_and_persists() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);

    let outcome = store.setup().unwrap();
    assert_eq!(
        outcome,
        SetupOutcome::Built {
            version: "3.3".to_string()
        }
    );
    assert!(store.config().source_path().exists());
    assert!(store.config().snapshot_path().exists());
    assert_eq!(store.local_version().as_deref(), Some("3.3"));

    assert_eq!(store.setup().unwrap(), SetupOutcome::AlreadyAvailable);
}

#[test]
fn test_load_uses_snapshot_without_reading_source() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);
    store.setup().unwrap();
    let fetches = remote.fetch_count();

    // The fast path must not need the relation source at all.
    std::fs::remove_file(store.config().source_path()).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.source, LoadSource::Snapshot);
    assert_eq!(loaded.version, "3.3");
    assert_eq!(
        loaded.graph.all_broaders_of("machine learning").into_iter().collect::<Vec<_>>(),
        vec!["artificial intelligence"]
    );
    assert_eq!(remote.fetch_count(), fetches);
}

#[test]
fn test_load_without_anything_bootstraps_from_remote() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);

    let loaded = store.load().unwrap();
    assert_eq!(loaded.source, LoadSource::Rebuilt);
    assert_eq!(loaded.version, "3.3");
    assert!(loaded.graph.contains("machine learning"));
}

#[test]
fn test_update_with_equal_version_is_a_no_op() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);
    store.setup().unwrap();
    let before = std::fs::read(store.config().snapshot_path()).unwrap();

    let outcome = store.update(false).unwrap();
    assert!(matches!(
        outcome,
        UpdateOutcome::AlreadyUpToDate { ref version } if version == "3.3"
    ));
    assert_eq!(std::fs::read(store.config().snapshot_path()).unwrap(), before);
}

#[test]
fn test_update_to_newer_version_replaces_files() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.9", SOURCE_V1);
    store.setup().unwrap();

    remote.publish("3.10", SOURCE_V2);
    let outcome = store.update(false).unwrap();
    match outcome {
        UpdateOutcome::Updated { previous, ontology } => {
            assert_eq!(previous.as_deref(), Some("3.9"));
            assert_eq!(ontology.version, "3.10");
            assert!(ontology.graph.contains("deep learning"));
        }
        other => panic!("expected an update, got {other:?}"),
    }

    let loaded = store.load().unwrap();
    assert_eq!(loaded.source, LoadSource::Snapshot);
    assert_eq!(loaded.version, "3.10");
    assert_eq!(loaded.graph.level_of("deep learning"), Some(3));
    assert_eq!(
        std::fs::read_to_string(store.config().source_path()).unwrap(),
        SOURCE_V2
    );
}

#[test]
fn test_forced_update_at_same_version_rebuilds() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);
    store.setup().unwrap();
    let snapshot_before = std::fs::read(store.config().snapshot_path()).unwrap();

    // Same version tag, different content.
    remote.publish("3.3", SOURCE_V2);
    assert!(matches!(
        store.update(false).unwrap(),
        UpdateOutcome::AlreadyUpToDate { .. }
    ));

    match store.update(true).unwrap() {
        UpdateOutcome::Updated { previous, ontology } => {
            assert_eq!(previous.as_deref(), Some("3.3"));
            assert_eq!(ontology.version, "3.3");
            assert!(ontology.graph.contains("deep learning"));
            assert_eq!(ontology.graph.level_of("deep learning"), Some(3));
        }
        other => panic!("expected an update, got {other:?}"),
    }

    let snapshot_after = std::fs::read(store.config().snapshot_path()).unwrap();
    assert_ne!(snapshot_after, snapshot_before);
    let header = Snapshot::read_header(&snapshot_after).unwrap();
    assert_eq!(header.ontology_version, "3.3");
    assert_eq!(header.source_digest, source_digest(SOURCE_V2.as_bytes()));
    assert_eq!(
        std::fs::read_to_string(store.config().source_path()).unwrap(),
        SOURCE_V2
    );

    let loaded = store.load().unwrap();
    assert_eq!(loaded.source, LoadSource::Snapshot);
    assert!(loaded.graph.contains("deep learning"));
}

#[test]
fn test_failed_fetch_during_forced_update_keeps_existing_files() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);
    store.setup().unwrap();
    let snapshot_before = std::fs::read(store.config().snapshot_path()).unwrap();
    let source_before = std::fs::read(store.config().source_path()).unwrap();

    remote.publish("3.4", SOURCE_V2);
    remote.withdraw("3.4");

    let err = store.update(true).unwrap_err();
    assert!(matches!(err, StorageError::Network(_)));
    assert_eq!(
        std::fs::read(store.config().snapshot_path()).unwrap(),
        snapshot_before
    );
    assert_eq!(std::fs::read(store.config().source_path()).unwrap(), source_before);
    assert_eq!(store.local_version().as_deref(), Some("3.3"));
}

#[test]
fn test_malformed_release_is_a_build_failure_and_keeps_files() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);
    store.setup().unwrap();
    let snapshot_before = std::fs::read(store.config().snapshot_path()).unwrap();

    remote.publish("3.4", "\"a\";rdfs:label\n");
    let err = store.update(false).unwrap_err();
    assert!(matches!(err, StorageError::Build(_)));
    assert_eq!(
        std::fs::read(store.config().snapshot_path()).unwrap(),
        snapshot_before
    );
}

#[test]
fn test_stale_snapshot_is_rebuilt_from_source() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);
    store.setup().unwrap();

    // Record a different version than the snapshot carries.
    std::fs::write(store.config().source_path(), SOURCE_V2).unwrap();
    store.write_state("3.4", "mem://elsewhere").unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.source, LoadSource::Rebuilt);
    assert_eq!(loaded.version, "3.4");
    assert!(loaded.graph.contains("deep learning"));

    let header =
        Snapshot::read_header(&std::fs::read(store.config().snapshot_path()).unwrap()).unwrap();
    assert_eq!(header.ontology_version, "3.4");
    assert_eq!(header.source_digest, source_digest(SOURCE_V2.as_bytes()));
}

#[test]
fn test_corrupt_snapshot_is_rebuilt() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);
    store.setup().unwrap();

    std::fs::write(store.config().snapshot_path(), b"garbage").unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded.source, LoadSource::Rebuilt);
    assert!(loaded.graph.contains("artificial intelligence"));
}

#[test]
fn test_version_status() {
    let (store, remote, _dir) = test_store();
    remote.publish("3.3", SOURCE_V1);

    let report = store.version_status().unwrap();
    assert_eq!(report.local, None);
    assert_eq!(report.status, VersionStatus::UpdateAvailable);

    store.setup().unwrap();
    assert_eq!(store.version_status().unwrap().status, VersionStatus::UpToDate);

    remote.publish("3.10", SOURCE_V2);
    assert_eq!(
        store.version_status().unwrap().status,
        VersionStatus::UpdateAvailable
    );

    remote.publish("3.2", SOURCE_V1);
    let report = store.version_status().unwrap();
    assert_eq!(report.status, VersionStatus::AheadOfRemote);
    assert_eq!(report.local.as_deref(), Some("3.3"));
    assert_eq!(report.remote, "3.2");
}

#[test]
fn test_import_local_source_works_offline() {
    let (store, remote, dir) = test_store();
    let source = dir.path().join("cso.csv");
    std::fs::write(&source, SOURCE_V2).unwrap();

    let loaded = store.import(&source, "3.4").unwrap();
    assert_eq!(loaded.version, "3.4");
    assert_eq!(remote.fetch_count(), 0);

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.source, LoadSource::Snapshot);
    assert_eq!(reloaded.graph, loaded.graph);
    assert_eq!(remote.fetch_count(), 0);
}

#[test]
fn test_network_failure_without_local_files() {
    let (store, _remote, _dir) = test_store();
    assert!(matches!(store.load(), Err(StorageError::Network(_))));
    assert!(!store.config().snapshot_path().exists());
}

#[test]
fn test_source_digest_is_hex_sha256() {
    assert_eq!(
        source_digest(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}
