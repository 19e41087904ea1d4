use std::collections::{BTreeMap, HashMap, btree_map, hash_map};
use std::fmt;

use serde::Serialize;

/// How a [`CountIndex`] stores its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    /// Hash-keyed; iteration order is unspecified.
    Unordered,
    /// Keys iterate in increasing lexicographic order.
    Ordered,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Unordered => f.write_str("unordered"),
            Discipline::Ordered => f.write_str("ordered"),
        }
    }
}

/// Occurrence counts keyed by exact field value.
///
/// Every stored key has a count of at least one; an absent key reads as zero.
/// Only the aggregator mutates an index, and only while building it. Outside
/// this crate an index is read-only:
///
/// ```compile_fail
/// use listen_rank::{BuildOptions, Discipline, TextSource, build};
///
/// let (mut index, _) = build(TextSource::from_text("t", "k\nA\n"), "k", Discipline::Ordered, &BuildOptions::default()).unwrap();
/// let (again, _) = build(TextSource::from_text("t", "k\nA\n"), "k", Discipline::Ordered, &BuildOptions::default()).unwrap();
/// index.merge(again);
/// ```
///
/// ```compile_fail
/// use std::collections::BTreeMap;
/// use listen_rank::CountIndex;
///
/// let index = CountIndex::Ordered(BTreeMap::from([("ghost".to_string(), 0u64)]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountIndex(Repr);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr {
    Unordered(HashMap<String, u64>),
    Ordered(BTreeMap<String, u64>),
}

impl CountIndex {
    pub fn new(discipline: Discipline) -> Self {
        match discipline {
            Discipline::Unordered => CountIndex(Repr::Unordered(HashMap::new())),
            Discipline::Ordered => CountIndex(Repr::Ordered(BTreeMap::new())),
        }
    }

    pub fn discipline(&self) -> Discipline {
        match &self.0 {
            Repr::Unordered(_) => Discipline::Unordered,
            Repr::Ordered(_) => Discipline::Ordered,
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        match &self.0 {
            Repr::Unordered(map) => map.len(),
            Repr::Ordered(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all counts, i.e. the number of rows that were counted.
    pub fn total(&self) -> u64 {
        self.iter().map(|(_, count)| count).sum()
    }

    /// Count for `key`, or 0 if it was never seen. Never inserts.
    pub fn get(&self, key: &str) -> u64 {
        let found = match &self.0 {
            Repr::Unordered(map) => map.get(key),
            Repr::Ordered(map) => map.get(key),
        };
        found.copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key) > 0
    }

    /// Entries in the discipline's natural order.
    pub fn iter(&self) -> Entries<'_> {
        match &self.0 {
            Repr::Unordered(map) => Entries(EntriesRepr::Unordered(map.iter())),
            Repr::Ordered(map) => Entries(EntriesRepr::Ordered(map.iter())),
        }
    }

    pub(crate) fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// `by` must be non-zero so no key is ever stored with a zero count.
    fn add(&mut self, key: &str, by: u64) {
        debug_assert!(by > 0);
        // Probe with the borrowed key first so repeat keys never allocate.
        match &mut self.0 {
            Repr::Unordered(map) => {
                if let Some(count) = map.get_mut(key) {
                    *count += by;
                } else {
                    map.insert(key.to_string(), by);
                }
            }
            Repr::Ordered(map) => {
                if let Some(count) = map.get_mut(key) {
                    *count += by;
                } else {
                    map.insert(key.to_string(), by);
                }
            }
        }
    }

    /// Folds a shard's partial index into `self`, summing counts per key.
    /// Only used while a sharded build is still private to the builder.
    pub(crate) fn merge(&mut self, other: CountIndex) {
        if self.is_empty() && self.discipline() == other.discipline() {
            *self = other;
            return;
        }
        for (key, count) in other.iter() {
            self.add(key, count);
        }
    }
}

/// Iterator returned by [`CountIndex::iter`].
pub struct Entries<'a>(EntriesRepr<'a>);

enum EntriesRepr<'a> {
    Unordered(hash_map::Iter<'a, String, u64>),
    Ordered(btree_map::Iter<'a, String, u64>),
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a str, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, count) = match &mut self.0 {
            EntriesRepr::Unordered(it) => it.next()?,
            EntriesRepr::Ordered(it) => it.next()?,
        };
        Some((key.as_str(), *count))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.0 {
            EntriesRepr::Unordered(it) => it.size_hint(),
            EntriesRepr::Ordered(it) => it.size_hint(),
        }
    }
}

impl<'a> IntoIterator for &'a CountIndex {
    type Item = (&'a str, u64);
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
