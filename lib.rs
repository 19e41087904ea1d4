//! Frequency counts over one column of a delimited listening-history export.

pub mod aggregate;
mod errors;
pub mod header;
pub mod index;
pub mod rank;
pub mod session;
pub mod source;

pub use aggregate::{BuildOptions, BuildStats, MalformedRowPolicy, build, build_into, build_sharded};
pub use errors::CountError;
pub use header::{Header, resolve_field};
pub use index::{CountIndex, Discipline, Entries};
pub use rank::{RankedEntry, Ranking, enumerate_all, rank, rank_top};
pub use session::Session;
pub use source::{ReaderSource, RecordSource, TextSource};

pub const DEFAULT_DELIMITER: char = '\t'; // exports are tab separated
pub const TRACK_COLUMN: &str = "master_metadata_track_name";
pub const ARTIST_COLUMN: &str = "master_metadata_album_artist_name";

/// Columns the streaming-history export is usually counted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Track,
    Artist,
}

impl Field {
    pub fn column(self) -> &'static str {
        match self {
            Field::Track => TRACK_COLUMN,
            Field::Artist => ARTIST_COLUMN,
        }
    }

    /// Human label used in not-found messages.
    pub fn label(self) -> &'static str {
        match self {
            Field::Track => "Song Title",
            Field::Artist => "Artist Name",
        }
    }
}
