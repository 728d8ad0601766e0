//! Primary-label and underscore-variant resolution.
//!
//! Every lookup here is total: a topic missing from the map resolves to itself.

use crate::{underscored, TopicGraph};

impl TopicGraph {
    /// Canonical label of the topic's same-as cluster.
    pub fn primary_label<'a>(&'a self, topic: &'a str) -> &'a str {
        self.interner
            .id_of(topic)
            .and_then(|id| self.primary_labels.get(&id))
            .map(|&primary| self.interner.label(primary))
            .unwrap_or(topic)
    }

    /// Same as [`TopicGraph::primary_label`], over underscore-joined forms.
    pub fn primary_label_wu<'a>(&'a self, topic_wu: &'a str) -> &'a str {
        self.primary_labels_wu
            .get(topic_wu)
            .map(String::as_str)
            .unwrap_or(topic_wu)
    }

    /// Spaced topic for an underscore-joined form.
    pub fn topic_from_underscored<'a>(&'a self, topic_wu: &'a str) -> &'a str {
        self.topics_wu
            .get(topic_wu)
            .map(|&id| self.interner.label(id))
            .unwrap_or(topic_wu)
    }

    /// Primary label for a topic given in either spaced or underscore form.
    pub fn resolve_label<'a>(&'a self, topic: &'a str) -> &'a str {
        let spaced = if self.interner.id_of(topic).is_some() {
            topic
        } else {
            self.topic_from_underscored(topic)
        };
        self.primary_label(spaced)
    }

    /// Underscore form of a topic, as used by token-level consumers.
    pub fn underscored(&self, topic: &str) -> String {
        underscored(topic)
    }

    /// Direct aliases recorded for `topic`.
    pub fn same_as_of(&self, topic: &str) -> Vec<&str> {
        self.labels_of(self.id_of(topic).and_then(|id| self.same_as.get(&id)))
    }

    /// The primary label of `topic` followed by that label's aliases.
    pub fn cluster_of<'a>(&'a self, topic: &'a str) -> Vec<&'a str> {
        let primary = self.primary_label(topic);
        let mut cluster = vec![primary];
        for alias in self.same_as_of(primary) {
            if !cluster.contains(&alias) {
                cluster.push(alias);
            }
        }
        cluster
    }
}

#[cfg(test)]
mod tests {
    use crate::TopicGraph;
    use ontograph_ingest::Relation;

    fn graph() -> TopicGraph {
        TopicGraph::from_relations(&[
            Relation::Label {
                topic: "semantic web".to_string(),
                text: "semantic web".to_string(),
            },
            Relation::Label {
                topic: "web of data".to_string(),
                text: "web of data".to_string(),
            },
            Relation::SameAs {
                primary: "semantic web".to_string(),
                alias: "web of data".to_string(),
            },
            Relation::PrimaryLabel {
                topic: "web of data".to_string(),
                primary: "semantic web".to_string(),
            },
        ])
    }

    #[test]
    fn spaced_and_underscore_maps_agree() {
        let g = graph();
        assert_eq!(g.primary_label("web of data"), "semantic web");
        assert_eq!(g.primary_label_wu("web_of_data"), "semantic_web");
        assert_eq!(g.topic_from_underscored("web_of_data"), "web of data");
        assert_eq!(g.resolve_label("web_of_data"), "semantic web");
        assert_eq!(g.underscored("web of data"), "web_of_data");
    }

    #[test]
    fn unmapped_lookups_return_input() {
        let g = graph();
        assert_eq!(g.primary_label("quantum computing"), "quantum computing");
        assert_eq!(g.primary_label_wu("quantum_computing"), "quantum_computing");
        assert_eq!(g.topic_from_underscored("unknown_topic"), "unknown_topic");
        assert_eq!(g.resolve_label("semantic web"), "semantic web");
    }

    #[test]
    fn cluster_lists_primary_then_aliases() {
        let g = graph();
        assert_eq!(g.cluster_of("web of data"), vec!["semantic web", "web of data"]);
        assert_eq!(g.same_as_of("semantic web"), vec!["web of data"]);
    }
}
