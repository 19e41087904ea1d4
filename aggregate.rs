use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::DEFAULT_DELIMITER;
use crate::errors::CountError;
use crate::header::resolve_field;
use crate::index::{CountIndex, Discipline};
use crate::source::RecordSource;

/// What to do with a data row that is too short to hold the key field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedRowPolicy {
    /// Log a warning and leave the row out of the index.
    #[default]
    Skip,
    /// Fail the whole build.
    Abort,
}

/// Ingestion settings.
///
/// A completely blank line is never a record, so it is never counted as an
/// empty key, even in a single-column source. An empty key is only counted
/// when the row has the key column and that column is empty (e.g. `"1\t"`).
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub delimiter: char,
    pub on_malformed: MalformedRowPolicy,
    /// Treat rows whose key field is empty as skipped instead of counting "".
    pub skip_empty_keys: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            on_malformed: MalformedRowPolicy::default(),
            skip_empty_keys: false,
        }
    }
}

/// Row accounting for one build. `counted` always equals the index total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Non-blank data rows read after the header.
    pub rows: usize,
    pub counted: usize,
    pub skipped: usize,
}

impl BuildStats {
    fn absorb(&mut self, other: BuildStats) {
        self.rows += other.rows;
        self.counted += other.counted;
        self.skipped += other.skipped;
    }
}

/// Counts occurrences of `key_field` across every data row of `source`.
///
/// The first row is the header. Blank lines are ignored rather than read as
/// empty keys; see [`BuildOptions`]. Short rows follow `options.on_malformed`.
pub fn build<S: RecordSource>(
    mut source: S,
    key_field: &str,
    discipline: Discipline,
    options: &BuildOptions,
) -> Result<(CountIndex, BuildStats), CountError> {
    let origin = source.describe().to_string();
    let header = match source.next() {
        Some(line) => line?,
        None => return Err(CountError::MissingHeader { origin }),
    };
    let position = resolve_field(&header, options.delimiter, key_field)?;

    let mut index = CountIndex::new(discipline);
    let mut stats = BuildStats::default();
    for (offset, row) in source.enumerate() {
        let row = row?;
        if row.is_empty() {
            continue;
        }
        stats.rows += 1;
        match row.split(options.delimiter).nth(position) {
            Some("") if options.skip_empty_keys => stats.skipped += 1,
            Some(key) => {
                index.increment(key);
                stats.counted += 1;
            }
            None => {
                // header is line 1
                let line = offset + 2;
                let found = row.split(options.delimiter).count();
                match options.on_malformed {
                    MalformedRowPolicy::Abort => {
                        return Err(CountError::MalformedRow {
                            line,
                            found,
                            position,
                            field: key_field.to_string(),
                        });
                    }
                    MalformedRowPolicy::Skip => {
                        warn!(origin = %origin, line, found, position, "skipping malformed row");
                        stats.skipped += 1;
                    }
                }
            }
        }
    }

    debug!(
        origin = %origin,
        field = key_field,
        %discipline,
        keys = index.len(),
        rows = stats.rows,
        skipped = stats.skipped,
        "built count index"
    );
    Ok((index, stats))
}

/// Builds into `index`, refusing if it already holds entries.
///
/// The index is replaced only when the whole build succeeds.
pub fn build_into<S: RecordSource>(
    index: &mut CountIndex,
    source: S,
    key_field: &str,
    options: &BuildOptions,
) -> Result<BuildStats, CountError> {
    if !index.is_empty() {
        return Err(CountError::AlreadyBuilt {
            field: key_field.to_string(),
            discipline: index.discipline(),
        });
    }
    let (built, stats) = build(source, key_field, index.discipline(), options)?;
    *index = built;
    Ok(stats)
}

/// Builds one partial index per source on the rayon pool and sums them.
///
/// Each source carries its own header. The first failing shard fails the
/// whole build; nothing is merged until every shard has finished.
pub fn build_sharded<S: RecordSource + Send>(
    sources: Vec<S>,
    key_field: &str,
    discipline: Discipline,
    options: &BuildOptions,
) -> Result<(CountIndex, BuildStats), CountError> {
    let shards = sources.len();
    let (index, stats) = sources
        .into_par_iter()
        .map(|source| build(source, key_field, discipline, options))
        .try_reduce(
            || (CountIndex::new(discipline), BuildStats::default()),
            |(mut index, mut stats), (partial, partial_stats)| {
                index.merge(partial);
                stats.absorb(partial_stats);
                Ok((index, stats))
            },
        )?;
    debug!(shards, keys = index.len(), field = key_field, "merged sharded build");
    Ok((index, stats))
}
