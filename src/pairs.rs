//! Headerless page-adjacency files: `a<TAB>b` means page `b` directly
//! follows page `a` in the same source document.

use crate::error::{CorpusError, Result};
use crate::io::lines::{LineCache, Lines};
use crate::io::resource::Resource;

/// Restartable sequence of `(page, next page)` id pairs.
#[derive(Clone)]
pub struct PagePairs {
    cache: LineCache,
}

impl PagePairs {
    pub fn open(resource: Resource) -> Result<Self> {
        Ok(Self::from_cache(LineCache::open(resource)?))
    }

    pub fn from_cache(cache: LineCache) -> Self {
        Self { cache }
    }

    pub fn name(&self) -> &str {
        self.cache.name()
    }

    /// Finish recording an unseekable source so that it can be read again.
    pub fn ensure_loaded(&self) -> Result<()> {
        self.cache.ensure_loaded()
    }

    pub fn iterate(&self) -> Result<Pairs> {
        Ok(Pairs {
            lines: self.cache.iterate()?,
            line: 0,
        })
    }
}

pub struct Pairs {
    lines: Lines,
    line: usize,
}

impl Iterator for Pairs {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(err) => return Some(Err(err)),
        };
        self.line += 1;
        let mut cells = line.split('\t');
        Some(match (cells.next(), cells.next(), cells.next()) {
            (Some(a), Some(b), None) => Ok((a.to_string(), b.to_string())),
            _ => Err(CorpusError::MalformedPair { line: self.line }),
        })
    }
}
