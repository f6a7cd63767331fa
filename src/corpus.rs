//! Tabular view over a tab-separated corpus file.
//!
//! The first line of the underlying [`LineCache`] is the header; every other
//! line is a row with one cell per header column. A [`Corpus`] can hide
//! columns from its projection with [`Corpus::strip`] without touching the
//! stored data: the stripped view shares the same line cache.
//!
//! ```
//! use tsvtm::Corpus;
//! use tsvtm::io::LineCache;
//! use std::io::Cursor;
//! # fn main() -> tsvtm::error::Result<()> {
//!
//! let cache = LineCache::from_reader("-", Cursor::new("id\tcluster\na\t1\nb\t2\n"));
//! let corpus = Corpus::from_cache(cache);
//! corpus.ensure_loaded()?;
//!
//! let ids: Vec<String> = corpus.column("id").iterate()?.collect::<Result<_, _>>()?;
//! assert_eq!(ids, vec!["a", "b"]);
//!
//! let lines: Vec<String> = corpus.strip("cluster").iterate()?.collect::<Result<_, _>>()?;
//! assert_eq!(lines, vec!["id", "a", "b"]);
//! # Ok(())
//! # }
//! ```

use crate::column::{Column, Decoder, decode};
use crate::error::{CorpusError, Result};
use crate::io::lines::{LineCache, Lines};
use crate::io::resource::Resource;
use std::rc::Rc;

/// Tab-separated header + rows, with an optional set of hidden columns.
#[derive(Clone)]
pub struct Corpus {
    cache: LineCache,
    excluded: Rc<[String]>,
}

impl Corpus {
    pub fn open(resource: Resource) -> Result<Self> {
        Ok(Self::from_cache(LineCache::open(resource)?))
    }

    pub fn from_cache(cache: LineCache) -> Self {
        Self {
            cache,
            excluded: Rc::from([]),
        }
    }

    pub fn cache(&self) -> &LineCache {
        &self.cache
    }

    pub fn name(&self) -> &str {
        self.cache.name()
    }

    /// Columns hidden from this view, most recently stripped first.
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// A view over the same data with `column` hidden as well.
    ///
    /// Stripping a column that does not exist is not an error.
    pub fn strip(&self, column: &str) -> Corpus {
        let excluded: Vec<String> = std::iter::once(column.to_string())
            .chain(self.excluded.iter().cloned())
            .collect();
        Corpus {
            cache: self.cache.clone(),
            excluded: Rc::from(excluded),
        }
    }

    /// Iterate the header followed by every row, hidden columns removed.
    ///
    /// # Errors
    /// [`CorpusError::EmptyInput`] when there is no header line, plus
    /// whatever starting a pass over the line cache can fail with.
    pub fn iterate(&self) -> Result<Rows> {
        let mut lines = self.cache.iterate()?;
        let header = match lines.next() {
            Some(header) => header?,
            None => {
                return Err(CorpusError::EmptyInput {
                    source_name: self.name().to_string(),
                });
            }
        };
        let keep: Vec<bool> = header
            .split('\t')
            .map(|name| !self.excluded.iter().any(|x| x == name))
            .collect();
        let keep = if keep.iter().all(|k| *k) { None } else { Some(keep) };
        let header = match &keep {
            Some(keep) => project(&header, keep),
            None => header,
        };
        Ok(Rows {
            lines,
            keep,
            header: Some(header),
        })
    }

    /// A lazy accessor for `column`, yielding raw cell text.
    pub fn column(&self, column: &str) -> Column<String> {
        Column::new(self.clone(), column, decode::raw())
    }

    /// A lazy accessor for `column`, decoding each cell with `decode`.
    pub fn column_with<T>(&self, column: &str, decode: Decoder<T>) -> Column<T> {
        Column::new(self.clone(), column, decode)
    }

    /// Number of raw lines in the underlying resource, header included.
    pub fn len(&self) -> Result<usize> {
        self.cache.len()
    }

    pub fn ensure_loaded(&self) -> Result<()> {
        self.cache.ensure_loaded()
    }
}

/// One pass over a [`Corpus`]: the projected header, then projected rows.
pub struct Rows {
    lines: Lines,
    keep: Option<Vec<bool>>,
    header: Option<String>,
}

impl Iterator for Rows {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(header) = self.header.take() {
            return Some(Ok(header));
        }
        let line = self.lines.next()?;
        Some(line.map(|line| match &self.keep {
            Some(keep) => project(&line, keep),
            None => line,
        }))
    }
}

/// Drop the cells whose header position is marked as hidden.
/// Cells beyond the header width are kept.
fn project(line: &str, keep: &[bool]) -> String {
    line.split('\t')
        .enumerate()
        .filter(|(i, _)| keep.get(*i).copied().unwrap_or(true))
        .map(|(_, cell)| cell)
        .collect::<Vec<_>>()
        .join("\t")
}
