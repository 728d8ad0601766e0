//! Versioned binary snapshot of a built [`TopicGraph`].
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! "ONTG" | format version: u32 | header len: u64 | header | graph len: u64 | graph
//! ```
//!
//! The header (bincode) carries the ontology version, so a stale snapshot can
//! be detected without decoding the graph section.

use crate::{OntologyError, Result, TopicGraph, TopicId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_MAGIC: &[u8; 4] = b"ONTG";
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub ontology_version: String,
    /// SHA-256 (hex) of the relation source the graph was built from.
    pub source_digest: String,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub header: SnapshotHeader,
    pub graph: TopicGraph,
}

impl Snapshot {
    pub fn new(
        ontology_version: impl Into<String>,
        source_digest: impl Into<String>,
        graph: TopicGraph,
    ) -> Self {
        Self {
            header: SnapshotHeader {
                ontology_version: ontology_version.into(),
                source_digest: source_digest.into(),
                built_at: Utc::now(),
            },
            graph,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header_bytes = bincode::serialize(&self.header)?;
        let graph_bytes = bincode::serialize(&self.graph)?;

        let mut out = Vec::with_capacity(24 + header_bytes.len() + graph_bytes.len());
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(header_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&(graph_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&graph_bytes);
        Ok(out)
    }

    /// Decode only the header section.
    pub fn read_header(bytes: &[u8]) -> Result<SnapshotHeader> {
        let mut reader = SectionReader::open(bytes)?;
        let header = reader.section("header")?;
        Ok(bincode::deserialize(header)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = SectionReader::open(bytes)?;
        let header: SnapshotHeader = bincode::deserialize(reader.section("header")?)?;
        let graph: TopicGraph = bincode::deserialize(reader.section("graph")?)?;
        if !reader.is_exhausted() {
            return Err(OntologyError::Snapshot(
                "trailing bytes after graph section".to_string(),
            ));
        }
        graph.validate()?;
        Ok(Self { header, graph })
    }
}

struct SectionReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> SectionReader<'a> {
    fn open(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < 8 || &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(OntologyError::Snapshot("not an ontology snapshot".to_string()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);
        if version != SNAPSHOT_FORMAT_VERSION {
            return Err(OntologyError::Snapshot(format!(
                "unsupported snapshot format version {version} (expected {SNAPSHOT_FORMAT_VERSION})"
            )));
        }
        Ok(Self { bytes, offset: 8 })
    }

    fn section(&mut self, name: &str) -> Result<&'a [u8]> {
        let truncated = || OntologyError::Snapshot(format!("truncated {name} section"));

        let len_end = self.offset.checked_add(8).ok_or_else(truncated)?;
        let len_bytes = self.bytes.get(self.offset..len_end).ok_or_else(truncated)?;
        let mut len = [0u8; 8];
        len.copy_from_slice(len_bytes);
        let len = usize::try_from(u64::from_le_bytes(len)).map_err(|_| truncated())?;

        let end = len_end.checked_add(len).ok_or_else(truncated)?;
        let section = self.bytes.get(len_end..end).ok_or_else(truncated)?;
        self.offset = end;
        Ok(section)
    }

    fn is_exhausted(&self) -> bool {
        self.offset == self.bytes.len()
    }
}

impl TopicGraph {
    /// Reject decoded graphs whose ids point outside the label table.
    fn validate(&self) -> Result<()> {
        let known = |id: &TopicId| self.interner.contains_id(*id);
        let bitmap_ok = |set: &roaring::RoaringBitmap| {
            set.max()
                .map_or(true, |max| (max as usize) < self.interner.len())
        };

        let ok = bitmap_ok(&self.topics)
            && self.topic_order.iter().all(known)
            && self.topic_order.len() as u64 == self.topics.len()
            && [&self.broaders, &self.narrowers, &self.same_as]
                .iter()
                .all(|adj| adj.iter().all(|(k, vs)| known(k) && vs.iter().all(known)))
            && self
                .primary_labels
                .iter()
                .all(|(k, v)| known(k) && known(v))
            && self.topics_wu.values().all(known)
            && self.topic_stems.values().all(|ids| ids.iter().all(known))
            && self
                .all_broaders
                .iter()
                .all(|(k, set)| known(k) && bitmap_ok(set))
            && self.levels.keys().all(known);

        if ok {
            Ok(())
        } else {
            Err(OntologyError::Snapshot(
                "graph references topics outside its label table".to_string(),
            ))
        }
    }
}
