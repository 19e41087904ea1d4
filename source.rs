use std::fs;
use std::io::{BufRead, Lines};
use std::path::Path;

use encoding_rs::UTF_8;
use tracing::{debug, warn};

use crate::errors::CountError;

const BOM: char = '\u{FEFF}';

/// An ordered stream of delimited text rows, the first of which is the header.
pub trait RecordSource: Iterator<Item = Result<String, CountError>> {
    /// Label used in logs and error messages (usually a path).
    fn describe(&self) -> &str;
}

/// A fully decoded text buffer, split into rows lazily.
///
/// Files are decoded with BOM sniffing: UTF-8, UTF-16LE and UTF-16BE
/// exports all read the same way. Invalid sequences become U+FFFD.
#[derive(Debug, Clone)]
pub struct TextSource {
    origin: String,
    text: String,
    pos: usize,
}

impl TextSource {
    /// Reads and decodes a whole file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CountError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let bytes = fs::read(path).map_err(|e| CountError::unavailable(&origin, e))?;
        Ok(Self::from_bytes(origin, &bytes))
    }

    pub fn from_bytes(origin: impl Into<String>, bytes: &[u8]) -> Self {
        let origin = origin.into();
        let (text, encoding, had_errors) = UTF_8.decode(bytes);
        if had_errors {
            warn!(origin = %origin, encoding = encoding.name(), "replaced malformed byte sequences");
        }
        debug!(origin = %origin, encoding = encoding.name(), bytes = bytes.len(), "decoded record source");
        Self {
            origin,
            text: text.into_owned(),
            pos: 0,
        }
    }

    pub fn from_text(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
            pos: 0,
        }
    }
}

impl Iterator for TextSource {
    type Item = Result<String, CountError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.pos..];
        let (line, advance) = match rest.find('\n') {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        let line = line.strip_suffix('\r').unwrap_or(line).to_string();
        self.pos += advance;
        Some(Ok(line))
    }
}

impl RecordSource for TextSource {
    fn describe(&self) -> &str {
        &self.origin
    }
}

/// Streams UTF-8 rows from any buffered reader, e.g. stdin.
///
/// A leading UTF-8 BOM is dropped from the first row.
pub struct ReaderSource<R> {
    origin: String,
    lines: Lines<R>,
    at_start: bool,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(origin: impl Into<String>, reader: R) -> Self {
        Self {
            origin: origin.into(),
            lines: reader.lines(),
            at_start: true,
        }
    }
}

impl<R: BufRead> Iterator for ReaderSource<R> {
    type Item = Result<String, CountError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        let mut line = line.map_err(|e| CountError::unavailable(&self.origin, e));
        if std::mem::take(&mut self.at_start)
            && let Ok(first) = &mut line
            && first.starts_with(BOM)
        {
            first.drain(..BOM.len_utf8());
        }
        Some(line)
    }
}

impl<R: BufRead> RecordSource for ReaderSource<R> {
    fn describe(&self) -> &str {
        &self.origin
    }
}
