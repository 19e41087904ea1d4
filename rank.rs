use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::index::CountIndex;

/// One key and how many rows carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: u64,
}

impl From<(&str, u64)> for RankedEntry {
    fn from((key, count): (&str, u64)) -> Self {
        Self {
            key: key.to_string(),
            count,
        }
    }
}

impl fmt::Display for RankedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.count)
    }
}

/// Entries sorted by count descending, ties broken by key ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ranking {
    entries: Vec<RankedEntry>,
}

impl Ranking {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    /// The first `min(n, len)` entries.
    pub fn top_n(&self, n: usize) -> &[RankedEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn into_entries(self) -> Vec<RankedEntry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Ranking {
    type Item = &'a RankedEntry;
    type IntoIter = std::slice::Iter<'a, RankedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn by_rank(a: &(&str, u64), b: &(&str, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Ranks every entry of `index`. Same output for either discipline.
pub fn rank(index: &CountIndex) -> Ranking {
    let entries = index
        .iter()
        .sorted_unstable_by(by_rank)
        .map(RankedEntry::from)
        .collect();
    Ranking { entries }
}

/// The first `n` entries of [`rank`] without sorting the whole index.
pub fn rank_top(index: &CountIndex, n: usize) -> Ranking {
    let entries = index
        .iter()
        .k_smallest_by(n, by_rank)
        .map(RankedEntry::from)
        .collect();
    Ranking { entries }
}

/// Every entry in the index's own order (lexicographic when ordered).
pub fn enumerate_all(index: &CountIndex) -> Vec<RankedEntry> {
    index.iter().map(RankedEntry::from).collect()
}
