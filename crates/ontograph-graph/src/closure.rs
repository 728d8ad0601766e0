//! Build-time ancestor closure and depth levels.
//!
//! Both are breadth-first walks over `broaders` with an explicit queue. Every
//! topic is independent, so the per-topic work is spread over `rayon`.

use crate::TopicId;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use std::collections::{HashMap, VecDeque};

type Adjacency = HashMap<TopicId, Vec<TopicId>>;

pub(crate) fn compute(
    broaders: &Adjacency,
    topics: &[TopicId],
) -> (HashMap<TopicId, RoaringBitmap>, HashMap<TopicId, u32>) {
    let per_topic: Vec<(TopicId, RoaringBitmap, u32)> = topics
        .par_iter()
        .map(|&topic| {
            let ancestors = ancestors_of(broaders, topic);
            let level = level_of(broaders, topic, ancestors.len());
            (topic, ancestors, level)
        })
        .collect();

    let mut all_broaders = HashMap::with_capacity(per_topic.len());
    let mut levels = HashMap::with_capacity(per_topic.len());
    for (topic, ancestors, level) in per_topic {
        all_broaders.insert(topic, ancestors);
        levels.insert(topic, level);
    }
    (all_broaders, levels)
}

/// Every topic reachable from `topic` through broader edges.
///
/// The accumulator doubles as the visited set, so cycles terminate; `topic`
/// itself is included only when a cycle leads back to it.
pub(crate) fn ancestors_of(broaders: &Adjacency, topic: TopicId) -> RoaringBitmap {
    let mut result = RoaringBitmap::new();
    let mut queue = VecDeque::from([topic]);

    while let Some(current) = queue.pop_front() {
        let Some(parents) = broaders.get(&current) else {
            continue;
        };
        for &parent in parents {
            if result.insert(parent.raw()) {
                queue.push_back(parent);
            }
        }
    }

    result
}

/// Longest broader chain from `topic` to a root, counted in nodes.
///
/// A node is re-enqueued only when reached at a strictly greater depth, and
/// depth never exceeds `ancestor_count + 1` (the longest simple chain), which
/// bounds the walk when the broader relation has a cycle.
pub(crate) fn level_of(broaders: &Adjacency, topic: TopicId, ancestor_count: u64) -> u32 {
    let cap = u32::try_from(ancestor_count.saturating_add(1)).unwrap_or(u32::MAX);
    let mut best: HashMap<TopicId, u32> = HashMap::from([(topic, 1)]);
    let mut queue = VecDeque::from([(topic, 1u32)]);
    let mut max_depth = 1;

    while let Some((current, depth)) = queue.pop_front() {
        let Some(parents) = broaders.get(&current) else {
            continue;
        };
        let next = depth + 1;
        if parents.is_empty() || next > cap {
            continue;
        }
        max_depth = max_depth.max(next);
        for &parent in parents {
            let seen = best.entry(parent).or_insert(0);
            if next > *seen {
                *seen = next;
                queue.push_back((parent, next));
            }
        }
    }

    max_depth
}
