//! Lazy, restartable projection of one corpus column.
//!
//! A [`Column`] holds no data. Each [`Column::iterate`] starts a fresh pass
//! over its [`Corpus`], looks the target column (and every filter column)
//! up in the header once, and then yields the decoded target cell of every
//! row whose filter cells satisfy all predicates.
//!
//! Filters are keyed on *raw* cell text of other columns, so a row can be
//! selected by a column that is never yielded:
//!
//! ```
//! use tsvtm::Corpus;
//! use tsvtm::column::decode;
//! use tsvtm::io::LineCache;
//! use std::io::Cursor;
//! # fn main() -> tsvtm::error::Result<()> {
//!
//! let tsv = "id\tlowdim\tcluster\na\t[1,0]\t0\nb\t[0,1]\t1\nc\t[1,1]\t0\n";
//! let corpus = Corpus::from_cache(LineCache::from_reader("-", Cursor::new(tsv)));
//! corpus.ensure_loaded()?;
//!
//! let lowdim = corpus.column_with("lowdim", decode::json::<Vec<f64>>());
//! let in_zero = lowdim.filter("cluster", |c| c == "0");
//! let vectors: Vec<Vec<f64>> = in_zero.iterate()?.collect::<Result<_, _>>()?;
//! assert_eq!(vectors, vec![vec![1.0, 0.0], vec![1.0, 1.0]]);
//! # Ok(())
//! # }
//! ```

use crate::corpus::{Corpus, Rows};
use crate::error::{BoxError, CorpusError, Result};
use crate::matrix::{CooMatrix, Matrix};
use ndarray::Array2;
use num_traits::Float;
use std::rc::Rc;

/// Function applied to every raw target cell.
pub type Decoder<T> = Rc<dyn Fn(&str) -> std::result::Result<T, BoxError>>;

/// Side-effect-free test on a raw filter cell.
pub type Predicate = Rc<dyn Fn(&str) -> bool>;

/// Number of leading rows inspected to choose a matrix encoding.
pub const DENSITY_SAMPLE_ROWS: usize = 10;

/// Ready-made decoders.
pub mod decode {
    use super::Decoder;
    use crate::error::BoxError;
    use serde::de::DeserializeOwned;
    use std::rc::Rc;
    use std::str::FromStr;

    /// The cell text itself.
    pub fn raw() -> Decoder<String> {
        Rc::new(|cell: &str| -> Result<String, BoxError> { Ok(cell.to_string()) })
    }

    /// Inline JSON, e.g. `[0.5,1.25]` for embedding vectors.
    pub fn json<T: DeserializeOwned + 'static>() -> Decoder<T> {
        Rc::new(|cell: &str| -> Result<T, BoxError> { Ok(serde_json::from_str(cell)?) })
    }

    /// Any `FromStr` type, e.g. token counts.
    pub fn parse<T>() -> Decoder<T>
    where
        T: FromStr + 'static,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        Rc::new(|cell: &str| -> Result<T, BoxError> { Ok(cell.parse::<T>()?) })
    }
}

/// Accessor for one named column of a [`Corpus`].
pub struct Column<T> {
    corpus: Corpus,
    name: String,
    decode: Decoder<T>,
    filters: Vec<(String, Predicate)>,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            corpus: self.corpus.clone(),
            name: self.name.clone(),
            decode: Rc::clone(&self.decode),
            filters: self.filters.clone(),
        }
    }
}

impl<T> Column<T> {
    pub(crate) fn new(corpus: Corpus, name: &str, decode: Decoder<T>) -> Self {
        Self {
            corpus,
            name: name.to_string(),
            decode,
            filters: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Only yield rows whose raw `column` cell satisfies `predicate`, in
    /// addition to every filter already present.
    pub fn filter(&self, column: &str, predicate: impl Fn(&str) -> bool + 'static) -> Column<T> {
        let predicate: Predicate = Rc::new(predicate);
        let mut filtered = self.clone();
        filtered.filters.insert(0, (column.to_string(), predicate));
        filtered
    }

    /// Start a pass yielding decoded values.
    ///
    /// # Errors
    /// [`CorpusError::MissingColumn`] if the target or any filter column is
    /// not in the header, [`CorpusError::EmptyInput`] without a header.
    pub fn iterate(&self) -> Result<Values<T>> {
        Ok(Values {
            cells: self.cells()?,
            decode: Rc::clone(&self.decode),
        })
    }

    /// Start a pass yielding raw, filtered target cells with their line
    /// numbers. Nothing is decoded.
    pub fn cells(&self) -> Result<Cells> {
        let mut rows = self.corpus.iterate()?;
        let header = rows.next().transpose()?.unwrap_or_default();
        let header: Vec<&str> = header.split('\t').collect();
        let position = |column: &str| {
            header
                .iter()
                .position(|name| *name == column)
                .ok_or_else(|| CorpusError::MissingColumn {
                    column: column.to_string(),
                })
        };
        let target = position(&self.name)?;
        let filters = self
            .filters
            .iter()
            .map(|(column, predicate)| {
                Ok(Filter {
                    column: column.clone(),
                    index: position(column)?,
                    predicate: Rc::clone(predicate),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Cells {
            rows,
            column: self.name.clone(),
            target,
            filters,
            line: 1,
        })
    }

    /// Number of rows passing all filters. Counted by a full pass every call.
    pub fn len(&self) -> Result<usize> {
        let mut n = 0;
        for cell in self.cells()? {
            cell?;
            n += 1;
        }
        Ok(n)
    }

    /// The first value, after making sure the input is fully loaded so that
    /// the partial pass cannot block later ones.
    ///
    /// # Errors
    /// [`CorpusError::EmptyColumn`] if no row passes the filters.
    pub fn peek(&self) -> Result<T> {
        self.corpus.ensure_loaded()?;
        match self.iterate()?.next() {
            Some(value) => value,
            None => Err(CorpusError::EmptyColumn {
                column: self.name.clone(),
            }),
        }
    }
}

impl Column<Vec<f64>> {
    /// Materialize all vectors as a two-dimensional matrix of `A`.
    ///
    /// The first [`DENSITY_SAMPLE_ROWS`] rows decide the encoding: if more
    /// than half of their scalar entries are exactly zero, a sparse
    /// coordinate matrix is built, otherwise a dense one. Exactly half zero
    /// stays dense.
    ///
    /// # Errors
    /// [`CorpusError::EmptyColumn`] for zero rows and
    /// [`CorpusError::RaggedMatrix`] when vector lengths differ.
    pub fn matrix<A: Float + 'static>(&self) -> Result<Matrix<A>> {
        self.corpus.ensure_loaded()?;
        let sample = self
            .iterate()?
            .take(DENSITY_SAMPLE_ROWS)
            .collect::<Result<Vec<_>>>()?;
        let Some(first) = sample.first() else {
            return Err(CorpusError::EmptyColumn {
                column: self.name.clone(),
            });
        };
        let ncols = first.len();
        let total: usize = sample.iter().map(Vec::len).sum();
        let zeros = sample.iter().flatten().filter(|x| **x == 0.0).count();
        let sparse = 2 * zeros > total;

        let mut dense = Vec::new();
        let mut coo = CooMatrix::new(ncols);
        let mut nrows = 0;
        let mut values = self.iterate()?;
        while let Some(vector) = values.next() {
            let vector = vector?;
            if vector.len() != ncols {
                return Err(CorpusError::RaggedMatrix {
                    column: self.name.clone(),
                    line: values.line(),
                    expected: ncols,
                    found: vector.len(),
                });
            }
            if sparse {
                for (j, x) in vector.into_iter().enumerate() {
                    if x != 0.0 {
                        coo.push(nrows, j, cast(x));
                    }
                }
            } else {
                dense.extend(vector.into_iter().map(cast::<A>));
            }
            nrows += 1;
        }

        if sparse {
            coo.set_nrows(nrows);
            Ok(Matrix::Sparse(coo))
        } else {
            Ok(Matrix::Dense(Array2::from_shape_vec((nrows, ncols), dense)?))
        }
    }
}

fn cast<A: Float>(x: f64) -> A {
    A::from(x).unwrap_or_else(A::nan)
}

struct Filter {
    column: String,
    index: usize,
    predicate: Predicate,
}

/// Raw target cells of one pass, as `(line number, cell)`.
pub struct Cells {
    rows: Rows,
    column: String,
    target: usize,
    filters: Vec<Filter>,
    line: usize,
}

impl Cells {
    /// Line number (header = 1) of the most recently yielded cell.
    pub fn line(&self) -> usize {
        self.line
    }

    fn select(&self, row: &str) -> Result<Option<String>> {
        let cells: Vec<&str> = row.split('\t').collect();
        for filter in &self.filters {
            let Some(cell) = cells.get(filter.index) else {
                return Err(CorpusError::ShortRow {
                    column: filter.column.clone(),
                    line: self.line,
                });
            };
            if !(filter.predicate)(cell) {
                return Ok(None);
            }
        }
        match cells.get(self.target) {
            Some(cell) => Ok(Some(cell.to_string())),
            None => Err(CorpusError::ShortRow {
                column: self.column.clone(),
                line: self.line,
            }),
        }
    }
}

impl Iterator for Cells {
    type Item = Result<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(err) => return Some(Err(err)),
            };
            self.line += 1;
            match self.select(&row) {
                Ok(Some(cell)) => return Some(Ok((self.line, cell))),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Decoded target values of one pass.
pub struct Values<T> {
    cells: Cells,
    decode: Decoder<T>,
}

impl<T> Values<T> {
    /// Line number (header = 1) of the most recently yielded value.
    pub fn line(&self) -> usize {
        self.cells.line()
    }
}

impl<T> Iterator for Values<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let (line, cell) = match self.cells.next()? {
            Ok(next) => next,
            Err(err) => return Some(Err(err)),
        };
        Some((self.decode)(&cell).map_err(|source| CorpusError::Decode {
            column: self.cells.column.clone(),
            line,
            source,
        }))
    }
}
