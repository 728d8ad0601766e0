//! Storage configuration, loadable from TOML.

use crate::{Result, StorageError};
use ontograph_ingest::{BroaderSubject, TripleFormat};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Where the ontology lives on disk, where it comes from, and how to read it.
///
/// File names are resolved against `data_dir` unless they are absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Raw relation source (delimited triples).
    pub source_file: PathBuf,
    /// Binary snapshot of the built graph.
    pub snapshot_file: PathBuf,
    /// Locally recorded ontology version.
    pub state_file: PathBuf,
    pub remote: RemoteConfig,
    /// Defaults to the CSO dump layout; a partial `[format]` table only
    /// overrides the keys it names.
    #[serde(deserialize_with = "deserialize_format")]
    pub format: TripleFormat,
    pub query: QueryDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// JSON document announcing the latest release.
    pub manifest_url: String,
    /// Used to derive the download URL when the manifest omits one.
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    pub min_support: usize,
    pub top_n: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ontology"),
            source_file: PathBuf::from("ontology.csv"),
            snapshot_file: PathBuf::from("ontology.ontg"),
            state_file: PathBuf::from("ontology_state.json"),
            remote: RemoteConfig::default(),
            format: TripleFormat::cso(),
            query: QueryDefaults::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            manifest_url: "https://cso.kmi.open.ac.uk/version.json".to_string(),
            base_url: "https://cso.kmi.open.ac.uk/download".to_string(),
            timeout_secs: 60,
            user_agent: concat!("ontograph/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            min_support: 1,
            top_n: 5,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FormatOverrides {
    delimiter: Option<char>,
    vocabulary: VocabularyOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VocabularyOverrides {
    broader_generic: Option<String>,
    related_equivalent: Option<String>,
    label: Option<String>,
    primary_label: Option<String>,
    broader_subject: Option<BroaderSubject>,
}

fn deserialize_format<'de, D>(deserializer: D) -> std::result::Result<TripleFormat, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = FormatOverrides::deserialize(deserializer)?;
    let mut format = TripleFormat::cso();
    let vocabulary = &mut format.vocabulary;

    if let Some(delimiter) = overrides.delimiter {
        format.delimiter = delimiter;
    }
    let v = overrides.vocabulary;
    if let Some(token) = v.broader_generic {
        vocabulary.broader_generic = token;
    }
    if let Some(token) = v.related_equivalent {
        vocabulary.related_equivalent = token;
    }
    if let Some(token) = v.label {
        vocabulary.label = token;
    }
    if let Some(token) = v.primary_label {
        vocabulary.primary_label = token;
    }
    if let Some(subject) = v.broader_subject {
        vocabulary.broader_subject = subject;
    }
    Ok(format)
}

impl StorageConfig {
    /// Read a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
            .map_err(|e| StorageError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StorageError::Config(e.to_string()))
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.query.min_support == 0 {
            return Err(StorageError::Config(
                "query.min_support must be at least 1".to_string(),
            ));
        }
        for (key, file) in [
            ("source_file", &self.source_file),
            ("snapshot_file", &self.snapshot_file),
            ("state_file", &self.state_file),
        ] {
            if file.as_os_str().is_empty() {
                return Err(StorageError::Config(format!("{key} must not be empty")));
            }
        }
        if self.format.delimiter == '"' {
            return Err(StorageError::Config(
                "format.delimiter cannot be the quote character".to_string(),
            ));
        }
        Ok(())
    }

    pub fn source_path(&self) -> PathBuf {
        self.data_dir.join(&self.source_file)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_file)
    }
}
