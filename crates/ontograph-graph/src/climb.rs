//! Ancestor aggregation ("climbing") for a set of seed topics.
//!
//! Each broader topic reached from the seeds carries a *support set*: the
//! topics it was reached from. In full-closure mode the expansion is repeated
//! over the seeds plus every broader found so far until the whole
//! `broader -> support` mapping stops changing. Support sets only grow and are
//! bounded by the number of topics, so this terminates on cyclic graphs too.
//!
//! After expansion, broaders are resolved to their primary label and entries
//! that land on the same primary label are folded together.

use crate::{OntologyError, Result, TopicGraph, TopicId};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClimbMode {
    None,
    OneLevel,
    FullClosure,
}

impl FromStr for ClimbMode {
    type Err = OntologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "none" | "no" => Ok(ClimbMode::None),
            "one-level" | "first" => Ok(ClimbMode::OneLevel),
            "full-closure" | "all" => Ok(ClimbMode::FullClosure),
            other => Err(OntologyError::InvalidArgument(format!(
                "climb mode must be 'none', 'one-level' or 'full-closure', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ClimbMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClimbMode::None => "none",
            ClimbMode::OneLevel => "one-level",
            ClimbMode::FullClosure => "full-closure",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimbOptions {
    /// Minimum support-set size for a broader to be reported.
    pub min_support: usize,
}

impl Default for ClimbOptions {
    fn default() -> Self {
        Self { min_support: 1 }
    }
}

/// One inferred broader topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredTopic {
    pub matched: usize,
    #[serde(rename = "broader of")]
    pub broader_of: Vec<String>,
}

type SupportMap = BTreeMap<TopicId, RoaringBitmap>;

impl TopicGraph {
    pub fn climb<I>(&self, seeds: I, mode: ClimbMode) -> BTreeMap<String, InferredTopic>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.climb_with(seeds, mode, &ClimbOptions::default())
    }

    pub fn climb_with<I>(
        &self,
        seeds: I,
        mode: ClimbMode,
        options: &ClimbOptions,
    ) -> BTreeMap<String, InferredTopic>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let seeds: RoaringBitmap = seeds
            .into_iter()
            .filter_map(|topic| self.interner.id_of(topic.as_ref()))
            .map(TopicId::raw)
            .collect();

        let support = match mode {
            ClimbMode::None => return BTreeMap::new(),
            ClimbMode::OneLevel => self.expand(&seeds, &SupportMap::new()),
            ClimbMode::FullClosure => self.expand_to_fixed_point(&seeds),
        };

        self.fold_by_primary_label(support, options.min_support)
    }

    /// One expansion round over `seeds ∪ keys(previous)`.
    fn expand(&self, seeds: &RoaringBitmap, previous: &SupportMap) -> SupportMap {
        let mut frontier = seeds.clone();
        frontier.extend(previous.keys().map(|id| id.raw()));

        let mut next = previous.clone();
        for raw in frontier.iter() {
            let topic = TopicId::new(raw);
            let Some(parents) = self.broaders.get(&topic) else {
                continue;
            };
            for &parent in parents {
                let support = next.entry(parent).or_default();
                support.insert(raw);
                if let Some(inherited) = previous.get(&topic) {
                    *support |= inherited;
                }
            }
        }
        next
    }

    fn expand_to_fixed_point(&self, seeds: &RoaringBitmap) -> SupportMap {
        let max_rounds = self.interner.len() + 2;
        let mut support = SupportMap::new();

        for round in 1..=max_rounds {
            let next = self.expand(seeds, &support);
            if next == support {
                tracing::debug!(rounds = round, broaders = support.len(), "climb converged");
                return support;
            }
            support = next;
        }

        tracing::warn!(
            rounds = max_rounds,
            broaders = support.len(),
            "climb stopped at round limit before converging"
        );
        support
    }

    fn fold_by_primary_label(
        &self,
        support: SupportMap,
        min_support: usize,
    ) -> BTreeMap<String, InferredTopic> {
        let mut folded: BTreeMap<TopicId, RoaringBitmap> = BTreeMap::new();
        for (broader, narrowers) in support {
            if (narrowers.len() as usize) < min_support {
                continue;
            }
            let primary = self
                .primary_labels
                .get(&broader)
                .copied()
                .unwrap_or(broader);
            *folded.entry(primary).or_default() |= narrowers;
        }

        folded
            .into_iter()
            .map(|(primary, narrowers)| {
                let mut broader_of: Vec<String> = narrowers
                    .iter()
                    .map(|raw| self.interner.label(TopicId::new(raw)).to_string())
                    .collect();
                broader_of.sort();
                (
                    self.interner.label(primary).to_string(),
                    InferredTopic {
                        matched: broader_of.len(),
                        broader_of,
                    },
                )
            })
            .collect()
    }
}
