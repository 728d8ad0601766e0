//! Ontograph Snapshot Cache
//!
//! Owns the on-disk lifecycle of a topic graph:
//!
//! ```text
//!   manifest ──► relation source ──► TopicGraph ──► snapshot
//!   (remote)      (ontology.csv)      (in memory)    (ontology.ontg)
//! ```
//!
//! - `load`: restore from the snapshot when it is current, rebuild otherwise
//! - `build`: parse the relation source (downloading it if absent) and persist
//! - `update`: fetch and build a newer release, then replace the files
//! - `setup` / `version_status`: bootstrap and version reporting
//!
//! The locally recorded version lives in a small JSON state file written
//! whenever a relation source is fetched or imported. A snapshot whose
//! header disagrees with it is stale.

pub mod config;
pub mod remote;

#[cfg(test)]
mod tests;

pub use config::{QueryDefaults, RemoteConfig, StorageConfig};
#[cfg(feature = "http")]
pub use remote::HttpSource;
pub use remote::{compare_versions, Release, RemoteSource, FALLBACK_VERSION};

use chrono::{DateTime, Utc};
use ontograph_graph::{OntologyError, Snapshot, TopicGraph};
use ontograph_ingest::{parse_relations_from_bytes, IngestError, TripleFormat};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The relation source or snapshot could not be turned into a graph.
    #[error("ontology build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid version manifest: {0}")]
    Manifest(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Query(OntologyError),
}

impl From<IngestError> for StorageError {
    fn from(err: IngestError) -> Self {
        StorageError::Build(err.to_string())
    }
}

impl From<OntologyError> for StorageError {
    fn from(err: OntologyError) -> Self {
        match err {
            OntologyError::Snapshot(_) => StorageError::Build(err.to_string()),
            other => StorageError::Query(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// Restored from a current snapshot; the relation source was not read.
    Snapshot,
    /// Parsed and built from the relation source, then persisted.
    Rebuilt,
}

#[derive(Debug, Clone)]
pub struct LoadedOntology {
    pub graph: TopicGraph,
    pub version: String,
    pub source: LoadSource,
}

#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Updated {
        previous: Option<String>,
        ontology: LoadedOntology,
    },
    AlreadyUpToDate { version: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    AlreadyAvailable,
    Built { version: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    UpToDate,
    UpdateAvailable,
    /// The local version is newer than anything the remote announces.
    AheadOfRemote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReport {
    pub local: Option<String>,
    pub remote: String,
    pub status: VersionStatus,
}

/// Contents of the state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyState {
    pub version: String,
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
}

// ============================================================================
// Store
// ============================================================================

/// File-backed ontology store.
pub struct OntologyStore {
    config: StorageConfig,
    remote: Box<dyn RemoteSource>,
}

impl OntologyStore {
    pub fn new(config: StorageConfig, remote: Box<dyn RemoteSource>) -> Self {
        Self { config, remote }
    }

    /// Store backed by the blocking HTTP client.
    #[cfg(feature = "http")]
    pub fn with_http(config: StorageConfig) -> Result<Self> {
        let remote = HttpSource::new(&config.remote)?;
        Ok(Self::new(config, Box::new(remote)))
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Version recorded by the last fetch or import, if any.
    pub fn local_version(&self) -> Option<String> {
        self.read_state().map(|state| state.version)
    }

    /// Restore the graph from the snapshot, rebuilding when it is missing,
    /// unreadable or stale.
    pub fn load(&self) -> Result<LoadedOntology> {
        let snapshot_path = self.config.snapshot_path();
        if snapshot_path.exists() {
            match self.read_current_snapshot(&snapshot_path) {
                Ok(Some(snapshot)) => {
                    tracing::info!(
                        path = %snapshot_path.display(),
                        version = %snapshot.header.ontology_version,
                        topics = snapshot.graph.topic_count(),
                        "loaded ontology snapshot"
                    );
                    return Ok(LoadedOntology {
                        version: snapshot.header.ontology_version,
                        graph: snapshot.graph,
                        source: LoadSource::Snapshot,
                    });
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(
                    path = %snapshot_path.display(),
                    error = %err,
                    "discarding unreadable snapshot"
                ),
            }
        } else {
            tracing::info!(path = %snapshot_path.display(), "ontology snapshot is missing");
        }
        self.build()
    }

    /// The snapshot, unless its version disagrees with the state file.
    fn read_current_snapshot(&self, path: &Path) -> Result<Option<Snapshot>> {
        let bytes = std::fs::read(path).map_err(io_error(path))?;
        let header = Snapshot::read_header(&bytes)?;
        if let Some(state) = self.read_state() {
            if state.version != header.ontology_version {
                tracing::warn!(
                    snapshot_version = %header.ontology_version,
                    recorded_version = %state.version,
                    "ontology snapshot is stale"
                );
                return Ok(None);
            }
        }
        Ok(Some(Snapshot::from_bytes(&bytes)?))
    }

    /// Build from the relation source, downloading it first if absent, and
    /// write a fresh snapshot.
    pub fn build(&self) -> Result<LoadedOntology> {
        let source_path = self.config.source_path();
        let (bytes, version) = if source_path.exists() {
            let bytes = std::fs::read(&source_path).map_err(io_error(&source_path))?;
            let version = self
                .local_version()
                .unwrap_or_else(|| FALLBACK_VERSION.to_string());
            (bytes, version)
        } else {
            tracing::info!(
                path = %source_path.display(),
                "relation source is missing; downloading the latest release"
            );
            let release = self.latest_release()?;
            let bytes = self.remote.fetch(&release.url)?;
            self.ensure_data_dir()?;
            write_atomic(&source_path, &bytes)?;
            self.write_state(&release.version, &release.url)?;
            (bytes, release.version)
        };

        let snapshot = build_snapshot(&bytes, &version, &self.config.format)?;
        self.persist_snapshot(&snapshot)?;
        Ok(LoadedOntology {
            graph: snapshot.graph,
            version,
            source: LoadSource::Rebuilt,
        })
    }

    /// Build from a local relation file and adopt it as the current source.
    pub fn import(&self, source: &Path, version: &str) -> Result<LoadedOntology> {
        let bytes = std::fs::read(source).map_err(io_error(source))?;
        let snapshot = build_snapshot(&bytes, version, &self.config.format)?;

        self.ensure_data_dir()?;
        let source_path = self.config.source_path();
        if source_path != source {
            write_atomic(&source_path, &bytes)?;
        }
        self.write_state(version, &format!("file://{}", source.display()))?;
        self.persist_snapshot(&snapshot)?;

        Ok(LoadedOntology {
            graph: snapshot.graph,
            version: version.to_string(),
            source: LoadSource::Rebuilt,
        })
    }

    /// Download and rebuild when forced or when the remote is newer.
    ///
    /// The new release is fetched and built in memory before any file is
    /// touched, so a failure leaves the current snapshot and source intact.
    pub fn update(&self, force: bool) -> Result<UpdateOutcome> {
        let previous = self.local_version();
        let release = self.latest_release()?;

        if !force {
            if let Some(local) = &previous {
                if compare_versions(&release.version, local) != Ordering::Greater {
                    tracing::info!(version = %local, "ontology is already up to date");
                    return Ok(UpdateOutcome::AlreadyUpToDate {
                        version: local.clone(),
                    });
                }
            }
        }

        tracing::info!(
            from = previous.as_deref().unwrap_or("none"),
            to = %release.version,
            url = %release.url,
            "updating ontology"
        );
        let bytes = self.remote.fetch(&release.url)?;
        let snapshot = build_snapshot(&bytes, &release.version, &self.config.format)?;

        self.ensure_data_dir()?;
        remove_if_exists(&self.config.snapshot_path())?;
        write_atomic(&self.config.source_path(), &bytes)?;
        self.write_state(&release.version, &release.url)?;
        self.persist_snapshot(&snapshot)?;

        Ok(UpdateOutcome::Updated {
            previous,
            ontology: LoadedOntology {
                graph: snapshot.graph,
                version: release.version,
                source: LoadSource::Rebuilt,
            },
        })
    }

    /// Make sure a snapshot exists, building one if needed.
    pub fn setup(&self) -> Result<SetupOutcome> {
        if self.config.snapshot_path().exists() {
            tracing::info!("nothing to do; the ontology snapshot is already available");
            return Ok(SetupOutcome::AlreadyAvailable);
        }
        let loaded = self.build()?;
        Ok(SetupOutcome::Built {
            version: loaded.version,
        })
    }

    /// Compare the locally recorded version with the remote manifest.
    pub fn version_status(&self) -> Result<VersionReport> {
        let local = self.local_version();
        let remote = self.latest_release()?.version;
        let status = match compare_versions(&remote, local.as_deref().unwrap_or(FALLBACK_VERSION))
        {
            Ordering::Greater => VersionStatus::UpdateAvailable,
            Ordering::Equal if local.is_some() => VersionStatus::UpToDate,
            Ordering::Equal => VersionStatus::UpdateAvailable,
            Ordering::Less => VersionStatus::AheadOfRemote,
        };
        Ok(VersionReport {
            local,
            remote,
            status,
        })
    }

    pub fn latest_release(&self) -> Result<Release> {
        let manifest = self.remote.fetch(&self.config.remote.manifest_url)?;
        Release::from_manifest(&manifest, &self.config.remote.base_url)
    }

    // ========================================================================
    // Files
    // ========================================================================

    fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.data_dir).map_err(io_error(&self.config.data_dir))
    }

    fn read_state(&self) -> Option<OntologyState> {
        let path = self.config.state_path();
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable state file");
                None
            }
        }
    }

    fn write_state(&self, version: &str, source_url: &str) -> Result<()> {
        let state = OntologyState {
            version: version.to_string(),
            source_url: source_url.to_string(),
            fetched_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&state)
            .map_err(|e| StorageError::Build(format!("failed to encode state: {e}")))?;
        write_atomic(&self.config.state_path(), &json)
    }

    fn persist_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.ensure_data_dir()?;
        let path = self.config.snapshot_path();
        let bytes = snapshot.to_bytes()?;
        write_atomic(&path, &bytes)?;
        tracing::info!(
            path = %path.display(),
            version = %snapshot.header.ontology_version,
            bytes = bytes.len(),
            "wrote ontology snapshot"
        );
        Ok(())
    }
}

/// Parse, build and tag a graph from raw relation bytes.
fn build_snapshot(bytes: &[u8], version: &str, format: &TripleFormat) -> Result<Snapshot> {
    let started = Instant::now();
    let relations = parse_relations_from_bytes(bytes, format)?;
    let graph = TopicGraph::build(&relations);
    tracing::info!(
        version,
        records = relations.stats.records,
        ignored = relations.stats.ignored,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "built ontology"
    );
    Ok(Snapshot::new(version, source_digest(bytes), graph))
}

/// Hex SHA-256 of the relation source.
pub fn source_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = std::fs::File::create(&tmp).map_err(io_error(&tmp))?;
    file.write_all(bytes).map_err(io_error(&tmp))?;
    file.sync_all().map_err(io_error(&tmp))?;
    drop(file);
    std::fs::rename(&tmp, path).map_err(io_error(path))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(path)(err)),
    }
}
