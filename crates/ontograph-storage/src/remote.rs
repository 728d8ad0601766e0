//! Remote release discovery and download.

use crate::{Result, StorageError};
use serde::Deserialize;
use std::cmp::Ordering;

/// Version assumed when the manifest does not name one.
pub const FALLBACK_VERSION: &str = "0.0";

/// Fetches raw bytes from a URL. The HTTP client is one implementation;
/// tests inject an in-memory one.
pub trait RemoteSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

// ============================================================================
// Version Manifest
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ManifestDocument {
    #[serde(default)]
    last_version: Option<ManifestEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestEntry {
    #[serde(default)]
    version: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
}

/// The latest published release, as announced by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: String,
    pub url: String,
}

impl Release {
    /// Parse `{"last_version": {"version": "...", "url": "..."}}`.
    ///
    /// A missing version falls back to [`FALLBACK_VERSION`]; a missing url is
    /// derived from `base_url` and the version.
    pub fn from_manifest(bytes: &[u8], base_url: &str) -> Result<Self> {
        let doc: ManifestDocument = serde_json::from_slice(bytes)
            .map_err(|e| StorageError::Manifest(e.to_string()))?;
        let entry = doc.last_version.unwrap_or_default();

        let version = match entry.version {
            None => FALLBACK_VERSION.to_string(),
            Some(serde_json::Value::String(v)) => v,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(StorageError::Manifest(format!(
                    "version must be a string, found {other}"
                )))
            }
        };
        if version.trim().is_empty() {
            return Err(StorageError::Manifest("empty version".to_string()));
        }

        let url = entry
            .url
            .unwrap_or_else(|| default_release_url(base_url, &version));
        Ok(Self { version, url })
    }
}

fn default_release_url(base_url: &str, version: &str) -> String {
    format!(
        "{}/version-{version}/cso_v{version}.csv",
        base_url.trim_end_matches('/')
    )
}

/// Compare dotted versions segment by segment.
///
/// Numeric segments compare as numbers ("3.10" > "3.9"), anything else as
/// text. A missing segment counts as "0".
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.trim().split('.').collect();
    let right: Vec<&str> = b.trim().split('.').collect();

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).copied().unwrap_or("0");
        let r = right.get(i).copied().unwrap_or("0");
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

// ============================================================================
// HTTP
// ============================================================================

#[cfg(feature = "http")]
pub use http::HttpSource;

#[cfg(feature = "http")]
mod http {
    use super::RemoteSource;
    use crate::config::RemoteConfig;
    use crate::{Result, StorageError};
    use reqwest::blocking::Client;
    use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
    use std::time::Duration;

    /// Blocking HTTP client with the configured timeout and user agent.
    pub struct HttpSource {
        client: Client,
    }

    impl HttpSource {
        pub fn new(config: &RemoteConfig) -> Result<Self> {
            let mut headers = HeaderMap::new();
            let agent = HeaderValue::from_str(&config.user_agent)
                .map_err(|e| StorageError::Config(format!("invalid user agent: {e}")))?;
            headers.insert(USER_AGENT, agent);

            let client = Client::builder()
                .default_headers(headers)
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| StorageError::Network(format!("failed to build http client: {e}")))?;
            Ok(Self { client })
        }
    }

    impl RemoteSource for HttpSource {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            tracing::debug!(url, "fetching");
            let resp = self
                .client
                .get(url)
                .send()
                .map_err(|e| StorageError::Network(format!("failed to fetch {url}: {e}")))?;
            if !resp.status().is_success() {
                return Err(StorageError::Network(format!(
                    "http status {} for {url}",
                    resp.status()
                )));
            }
            let bytes = resp
                .bytes()
                .map_err(|e| StorageError::Network(format!("failed to read body of {url}: {e}")))?;
            Ok(bytes.to_vec())
        }
    }
}
