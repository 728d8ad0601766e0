//! Topic graph engine for academic-concept ontologies.
//!
//! A [`TopicGraph`] is built once from the typed relations produced by
//! `ontograph-ingest` and is immutable afterwards. It holds:
//!
//! 1. **Topic interning**: every label stored once, referenced by [`TopicId`]
//! 2. **Adjacency**: `broaders` and `narrowers`, kept in sync
//! 3. **Clusters**: same-as aliases and primary (canonical) labels, in both
//!    spaced and underscore-joined form
//! 4. **Closures**: all ancestors and the depth level of every known topic,
//!    computed at build time
//! 5. **Stems**: a four-character prefix index for approximate lookup
//!
//! Queries live in their own modules:
//!
//! - `descendants`: breadth-first walk over narrower topics
//! - `climb`: ancestor aggregation with support counting and folding
//! - `labels`: primary label / underscore variant resolution
//! - `matcher`: stem lookup and whole-vocabulary string similarity
//! - `snapshot`: the versioned binary format used to persist a built graph

mod closure;
mod error;

pub mod climb;
pub mod descendants;
pub mod labels;
pub mod matcher;
pub mod snapshot;

pub use climb::{ClimbMode, ClimbOptions, InferredTopic};
pub use descendants::TopicQuery;
pub use error::{OntologyError, Result};
pub use matcher::similarity_ratio;
pub use snapshot::{Snapshot, SnapshotHeader, SNAPSHOT_FORMAT_VERSION, SNAPSHOT_MAGIC};

use ahash::AHashMap;
use ontograph_ingest::{Relation, RelationSet};
use roaring::RoaringBitmap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

// ============================================================================
// Topic Interning
// ============================================================================

/// Interned topic handle (index into the label table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TopicId(u32);

impl TopicId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Label table. Only the labels are serialized; the reverse index is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct TopicInterner {
    labels: Vec<String>,
    index: AHashMap<String, TopicId>,
}

impl TopicInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, label: &str) -> TopicId {
        if let Some(&id) = self.index.get(label) {
            return id;
        }
        let id = TopicId(self.labels.len() as u32);
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), id);
        id
    }

    pub fn id_of(&self, label: &str) -> Option<TopicId> {
        self.index.get(label).copied()
    }

    /// Label of an id handed out by this interner.
    pub fn label(&self, id: TopicId) -> &str {
        &self.labels[id.index()]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn contains_id(&self, id: TopicId) -> bool {
        id.index() < self.labels.len()
    }
}

impl From<Vec<String>> for TopicInterner {
    fn from(labels: Vec<String>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), TopicId(i as u32)))
            .collect();
        Self { labels, index }
    }
}

impl PartialEq for TopicInterner {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Serialize for TopicInterner {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.labels.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TopicInterner {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<String>::deserialize(deserializer).map(Self::from)
    }
}

/// The syntactic underscore-joined form of a topic label.
pub fn underscored(topic: &str) -> String {
    topic.replace(' ', "_")
}

fn push_unique(list: &mut Vec<TopicId>, id: TopicId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

// ============================================================================
// TopicGraph: The Complete Store
// ============================================================================

/// Summary counts, mostly for logging and the CLI `stats` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub topics: usize,
    pub interned: usize,
    pub broader_edges: usize,
    pub same_as_links: usize,
    pub primary_labels: usize,
    pub stems: usize,
    pub max_level: u32,
}

/// Immutable topic graph with precomputed closures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicGraph {
    interner: TopicInterner,
    /// Known topics (declared by a label record).
    topics: RoaringBitmap,
    /// Known topics in declaration order.
    topic_order: Vec<TopicId>,
    broaders: HashMap<TopicId, Vec<TopicId>>,
    narrowers: HashMap<TopicId, Vec<TopicId>>,
    same_as: HashMap<TopicId, Vec<TopicId>>,
    primary_labels: HashMap<TopicId, TopicId>,
    primary_labels_wu: HashMap<String, String>,
    topics_wu: HashMap<String, TopicId>,
    topic_stems: HashMap<String, Vec<TopicId>>,
    all_broaders: HashMap<TopicId, RoaringBitmap>,
    levels: HashMap<TopicId, u32>,
}

impl TopicGraph {
    fn empty() -> Self {
        Self {
            interner: TopicInterner::new(),
            topics: RoaringBitmap::new(),
            topic_order: Vec::new(),
            broaders: HashMap::new(),
            narrowers: HashMap::new(),
            same_as: HashMap::new(),
            primary_labels: HashMap::new(),
            primary_labels_wu: HashMap::new(),
            topics_wu: HashMap::new(),
            topic_stems: HashMap::new(),
            all_broaders: HashMap::new(),
            levels: HashMap::new(),
        }
    }

    /// Build a graph from a parsed relation source.
    pub fn build(set: &RelationSet) -> Self {
        Self::from_relations(&set.relations)
    }

    /// Single linear pass over `relations`, then stems and closures.
    pub fn from_relations(relations: &[Relation]) -> Self {
        let started = Instant::now();
        let mut graph = Self::empty();

        for relation in relations {
            match relation {
                Relation::Label { topic, .. } => graph.declare_topic(topic),
                Relation::Broader { narrower, broader } => {
                    let child = graph.interner.intern(narrower);
                    let parent = graph.interner.intern(broader);
                    push_unique(graph.broaders.entry(child).or_default(), parent);
                    push_unique(graph.narrowers.entry(parent).or_default(), child);
                }
                Relation::SameAs { primary, alias } => {
                    let primary = graph.interner.intern(primary);
                    let alias = graph.interner.intern(alias);
                    push_unique(graph.same_as.entry(primary).or_default(), alias);
                }
                Relation::PrimaryLabel { topic, primary } => {
                    let topic_id = graph.interner.intern(topic);
                    let primary_id = graph.interner.intern(primary);
                    // A later declaration replaces an earlier one.
                    graph.primary_labels.insert(topic_id, primary_id);
                    graph
                        .primary_labels_wu
                        .insert(underscored(topic), underscored(primary));
                }
            }
        }

        graph.generate_topic_stems();
        let (all_broaders, levels) = closure::compute(&graph.broaders, &graph.topic_order);
        graph.all_broaders = all_broaders;
        graph.levels = levels;

        let stats = graph.stats();
        tracing::info!(
            topics = stats.topics,
            broader_edges = stats.broader_edges,
            same_as_links = stats.same_as_links,
            primary_labels = stats.primary_labels,
            max_level = stats.max_level,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built topic graph"
        );
        graph
    }

    fn declare_topic(&mut self, topic: &str) {
        let id = self.interner.intern(topic);
        if self.topics.insert(id.raw()) {
            self.topic_order.push(id);
            self.topics_wu.entry(underscored(topic)).or_insert(id);
        }
    }

    fn generate_topic_stems(&mut self) {
        for &id in &self.topic_order {
            let stem = matcher::stem_of(self.interner.label(id));
            self.topic_stems.entry(stem).or_default().push(id);
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn label(&self, id: TopicId) -> &str {
        self.interner.label(id)
    }

    pub fn id_of(&self, topic: &str) -> Option<TopicId> {
        self.interner.id_of(topic)
    }

    /// Known topic id (declared by a label record), if any.
    fn known_id(&self, topic: &str) -> Option<TopicId> {
        self.interner
            .id_of(topic)
            .filter(|id| self.topics.contains(id.raw()))
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.known_id(topic).is_some()
    }

    pub fn topic_count(&self) -> usize {
        self.topic_order.len()
    }

    /// Known topics in declaration order.
    pub fn topics(&self) -> impl Iterator<Item = &str> + '_ {
        self.topic_order.iter().map(|&id| self.interner.label(id))
    }

    fn labels_of(&self, ids: Option<&Vec<TopicId>>) -> Vec<&str> {
        ids.map(|ids| ids.iter().map(|&id| self.interner.label(id)).collect())
            .unwrap_or_default()
    }

    /// Direct broader topics, in insertion order.
    pub fn broaders_of(&self, topic: &str) -> Vec<&str> {
        self.labels_of(self.id_of(topic).and_then(|id| self.broaders.get(&id)))
    }

    /// Direct narrower topics, in insertion order.
    pub fn narrowers_of(&self, topic: &str) -> Vec<&str> {
        self.labels_of(self.id_of(topic).and_then(|id| self.narrowers.get(&id)))
    }

    /// All ancestors reachable through broader edges (precomputed).
    ///
    /// Empty for topics outside the known set.
    pub fn all_broaders_of(&self, topic: &str) -> BTreeSet<&str> {
        self.known_id(topic)
            .and_then(|id| self.all_broaders.get(&id))
            .map(|set| self.labels_of_bitmap(set))
            .unwrap_or_default()
    }

    /// Longest chain of broader edges to a root, plus one.
    pub fn level_of(&self, topic: &str) -> Option<u32> {
        self.known_id(topic)
            .and_then(|id| self.levels.get(&id))
            .copied()
    }

    fn labels_of_bitmap(&self, set: &RoaringBitmap) -> BTreeSet<&str> {
        set.iter()
            .map(|raw| self.interner.label(TopicId(raw)))
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            topics: self.topic_order.len(),
            interned: self.interner.len(),
            broader_edges: self.broaders.values().map(Vec::len).sum(),
            same_as_links: self.same_as.values().map(Vec::len).sum(),
            primary_labels: self.primary_labels.len(),
            stems: self.topic_stems.len(),
            max_level: self.levels.values().copied().max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel_broader(n: &str, b: &str) -> Relation {
        Relation::Broader {
            narrower: n.to_string(),
            broader: b.to_string(),
        }
    }

    fn rel_label(t: &str) -> Relation {
        Relation::Label {
            topic: t.to_string(),
            text: t.to_string(),
        }
    }

    #[test]
    fn interner_round_trips_through_labels() {
        let mut interner = TopicInterner::new();
        let a = interner.intern("semantic web");
        let b = interner.intern("ontology");
        assert_eq!(interner.intern("semantic web"), a);
        assert_ne!(a, b);

        let bytes = bincode::serialize(&interner).expect("serialize");
        let restored: TopicInterner = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, interner);
        assert_eq!(restored.id_of("ontology"), Some(b));
        assert_eq!(restored.label(a), "semantic web");
    }

    #[test]
    fn adjacency_indices_mirror_each_other_and_deduplicate() {
        let graph = TopicGraph::from_relations(&[
            rel_label("a"),
            rel_label("b"),
            rel_broader("a", "b"),
            rel_broader("a", "b"),
        ]);
        assert_eq!(graph.broaders_of("a"), vec!["b"]);
        assert_eq!(graph.narrowers_of("b"), vec!["a"]);
        assert_eq!(graph.stats().broader_edges, 1);
    }

    #[test]
    fn first_label_declaration_wins() {
        let graph = TopicGraph::from_relations(&[
            rel_label("x y"),
            rel_label("z"),
            rel_label("x y"),
        ]);
        assert_eq!(graph.topics().collect::<Vec<_>>(), vec!["x y", "z"]);
        assert_eq!(graph.topic_count(), 2);
    }

    #[test]
    fn last_primary_label_declaration_wins() {
        let primary = |t: &str, p: &str| Relation::PrimaryLabel {
            topic: t.to_string(),
            primary: p.to_string(),
        };
        let graph = TopicGraph::from_relations(&[
            rel_label("ai"),
            primary("ai", "artificial intelligence"),
            primary("ai", "machine intelligence"),
        ]);
        assert_eq!(graph.primary_label("ai"), "machine intelligence");
        assert_eq!(graph.primary_label_wu("ai"), "machine_intelligence");
        assert_eq!(graph.stats().primary_labels, 1);
    }

    #[test]
    fn edge_endpoints_are_not_known_topics() {
        let graph = TopicGraph::from_relations(&[rel_label("a"), rel_broader("a", "b")]);
        assert!(graph.contains("a"));
        assert!(!graph.contains("b"));
        assert_eq!(graph.broaders_of("a"), vec!["b"]);
        assert!(graph.level_of("b").is_none());
        assert_eq!(graph.level_of("a"), Some(2));
    }
}
