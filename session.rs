use std::collections::BTreeMap;

use crate::aggregate::{BuildOptions, BuildStats, build, build_sharded};
use crate::errors::CountError;
use crate::index::{CountIndex, Discipline};
use crate::rank::{Ranking, rank};
use crate::source::RecordSource;

/// Caller-owned set of indexes, at most one per (field, discipline).
#[derive(Debug, Default)]
pub struct Session {
    indexes: BTreeMap<(String, Discipline), CountIndex>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and stores the index for `field` under `discipline`.
    ///
    /// Fails with `AlreadyBuilt`, without touching `source`, if that slot
    /// already holds a populated index.
    pub fn build<S: RecordSource>(
        &mut self,
        field: &str,
        discipline: Discipline,
        source: S,
        options: &BuildOptions,
    ) -> Result<BuildStats, CountError> {
        self.guard(field, discipline)?;
        let (index, stats) = build(source, field, discipline, options)?;
        self.indexes.insert((field.to_string(), discipline), index);
        Ok(stats)
    }

    /// Like [`Session::build`], ingesting several sources in parallel.
    pub fn build_sharded<S: RecordSource + Send>(
        &mut self,
        field: &str,
        discipline: Discipline,
        sources: Vec<S>,
        options: &BuildOptions,
    ) -> Result<BuildStats, CountError> {
        self.guard(field, discipline)?;
        let (index, stats) = build_sharded(sources, field, discipline, options)?;
        self.indexes.insert((field.to_string(), discipline), index);
        Ok(stats)
    }

    fn guard(&self, field: &str, discipline: Discipline) -> Result<(), CountError> {
        match self.index(field, discipline) {
            Some(index) if !index.is_empty() => Err(CountError::AlreadyBuilt {
                field: field.to_string(),
                discipline,
            }),
            _ => Ok(()),
        }
    }

    pub fn index(&self, field: &str, discipline: Discipline) -> Option<&CountIndex> {
        self.indexes.get(&(field.to_string(), discipline))
    }

    /// The index for the slot, or `NotBuilt`.
    pub fn require(&self, field: &str, discipline: Discipline) -> Result<&CountIndex, CountError> {
        self.index(field, discipline).ok_or_else(|| CountError::NotBuilt {
            field: field.to_string(),
            discipline,
        })
    }

    pub fn lookup(&self, field: &str, discipline: Discipline, key: &str) -> Result<u64, CountError> {
        Ok(self.require(field, discipline)?.get(key))
    }

    pub fn rank(&self, field: &str, discipline: Discipline) -> Result<Ranking, CountError> {
        Ok(rank(self.require(field, discipline)?))
    }
}
