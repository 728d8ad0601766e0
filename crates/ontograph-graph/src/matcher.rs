//! Approximate topic lookup: prefix stems and string similarity.

use crate::{TopicGraph, TopicId};
use rayon::prelude::*;

/// Characters (not bytes) that make up a stem.
pub const STEM_LEN: usize = 4;

pub(crate) fn stem_of(word: &str) -> String {
    word.chars().take(STEM_LEN).collect()
}

impl TopicGraph {
    /// Topics sharing the first four characters of `word`.
    ///
    /// An unseen stem yields an empty list; there is no fallback scan.
    pub fn closest_by_stem(&self, word: &str) -> Vec<&str> {
        self.topic_stems
            .get(&stem_of(word))
            .map(|ids| ids.iter().map(|&id| self.interner.label(id)).collect())
            .unwrap_or_default()
    }

    /// The `n` known topics most similar to `term` (lowercased), best first.
    ///
    /// Ties keep topic declaration order.
    pub fn top_n_similar(&self, term: &str, n: usize) -> Vec<(&str, f64)> {
        if n == 0 {
            return Vec::new();
        }
        let needle = term.to_lowercase();

        let mut scored: Vec<(usize, TopicId, f64)> = self
            .topic_order
            .par_iter()
            .enumerate()
            .map(|(rank, &id)| (rank, id, similarity_ratio(&needle, self.interner.label(id))))
            .collect();
        scored.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));
        scored.truncate(n);

        scored
            .into_iter()
            .map(|(_, id, score)| (self.interner.label(id), score))
            .collect()
    }
}

/// Ratcliff/Obershelp similarity: `2 * M / (|a| + |b|)`, where `M` counts
/// characters in the recursively found longest common blocks.
///
/// Two empty strings are identical (1.0).
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Among equally long blocks the one starting earliest in `a`, then in `b`,
/// wins. Returns `(start_a, start_b, len)`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];
    let mut curr = vec![0usize; width];
    let mut best = (alo, blo, 0);

    for i in alo..ahi {
        for j in blo..bhi {
            let k = j - blo + 1;
            if a[i] == b[j] {
                curr[k] = prev[k - 1] + 1;
                if curr[k] > best.2 {
                    best = (i + 1 - curr[k], j + 1 - curr[k], curr[k]);
                }
            } else {
                curr[k] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ratio_matches_known_values() {
        assert!(close(similarity_ratio("abcd", "bcde"), 0.75));
        assert!(close(similarity_ratio("machine learning", "machine learning"), 1.0));
        assert!(close(similarity_ratio("", ""), 1.0));
        assert!(close(similarity_ratio("abc", ""), 0.0));
        assert!(close(similarity_ratio("abc", "xyz"), 0.0));
        // "ab" from the left block plus "d" from the right one.
        assert!(close(similarity_ratio("abxd", "abyd"), 0.75));
    }

    #[test]
    fn stems_count_characters_not_bytes() {
        assert_eq!(stem_of("über computing"), "über");
        assert_eq!(stem_of("ai"), "ai");
    }
}
