//! Live descendant queries over the narrower index.

use crate::{OntologyError, Result, TopicGraph, TopicId};
use roaring::RoaringBitmap;
use std::collections::{BTreeSet, VecDeque};

/// One topic or a collection of topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicQuery {
    One(String),
    Many(Vec<String>),
}

impl TopicQuery {
    /// Accepts a JSON string or an array of strings; any other shape is rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(topic) => Ok(TopicQuery::One(topic.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        OntologyError::InvalidArgument(format!(
                            "topic collections may only contain strings, got {item}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(TopicQuery::Many),
            other => Err(OntologyError::InvalidArgument(format!(
                "expected a topic or a list of topics, got {other}"
            ))),
        }
    }

    fn topics(&self) -> &[String] {
        match self {
            TopicQuery::One(topic) => std::slice::from_ref(topic),
            TopicQuery::Many(topics) => topics,
        }
    }
}

impl From<&str> for TopicQuery {
    fn from(topic: &str) -> Self {
        TopicQuery::One(topic.to_string())
    }
}

impl From<String> for TopicQuery {
    fn from(topic: String) -> Self {
        TopicQuery::One(topic)
    }
}

impl From<Vec<String>> for TopicQuery {
    fn from(topics: Vec<String>) -> Self {
        TopicQuery::Many(topics)
    }
}

impl From<Vec<&str>> for TopicQuery {
    fn from(topics: Vec<&str>) -> Self {
        TopicQuery::Many(topics.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for TopicQuery {
    fn from(topics: &[&str]) -> Self {
        TopicQuery::Many(topics.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TopicQuery {
    fn from(topics: [&str; N]) -> Self {
        TopicQuery::Many(topics.iter().map(|t| t.to_string()).collect())
    }
}

impl TopicGraph {
    /// Every topic reachable through narrower edges, the query topics included.
    ///
    /// Fails with `NotFound` if any query topic is not a known topic.
    pub fn all_descendants_of(&self, query: impl Into<TopicQuery>) -> Result<BTreeSet<&str>> {
        let query = query.into();
        let mut union = RoaringBitmap::new();
        for topic in query.topics() {
            let start = self
                .known_id(topic)
                .ok_or_else(|| OntologyError::NotFound(topic.clone()))?;
            union |= self.descendant_ids(start);
        }
        Ok(self.labels_of_bitmap(&union))
    }

    fn descendant_ids(&self, start: TopicId) -> RoaringBitmap {
        let mut visited = RoaringBitmap::new();
        visited.insert(start.raw());
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            let Some(children) = self.narrowers.get(&current) else {
                continue;
            };
            for &child in children {
                if visited.insert(child.raw()) {
                    queue.push_back(child);
                }
            }
        }

        visited
    }
}
