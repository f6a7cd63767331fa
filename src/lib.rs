//! # tsvtm
//!
//! Topic modelling over **tab-separated corpus files** that stream through a
//! pipeline of small commands: build a corpus of pages, embed them, reduce
//! the vectors, cluster, describe and evaluate the clusters.
//!
//! ## Core concepts
//!
//! ### Resources and line caches
//!
//! A [`Resource`] names standard input/output or a file; `.gz`, `.bz2` and
//! `.xz` suffixes select a compression codec. A [`LineCache`] gives
//! restartable line iteration over a resource: files are simply reopened for
//! every pass, while unseekable streams are recorded during the first pass
//! and replayed from memory afterwards.
//!
//! ### Corpus and columns
//!
//! A [`Corpus`] is the tabular view over a line cache: a header line of
//! column names followed by rows. Views can hide columns
//! ([`Corpus::strip`]) and hand out lazy [`Column`] accessors that decode
//! one column and filter rows by the raw text of other columns. Vector
//! columns materialize as a dense or sparse [`Matrix`].
//!
//! ```
//! use tsvtm::Corpus;
//! use tsvtm::column::decode;
//! use tsvtm::io::LineCache;
//! use std::io::Cursor;
//! # fn main() -> tsvtm::error::Result<()> {
//!
//! let tsv = "id\thighdim\na:1\t[1,0,0,0]\na:2\t[0,0,2,0]\n";
//! let corpus = Corpus::from_cache(LineCache::from_reader("-", Cursor::new(tsv)));
//! corpus.ensure_loaded()?;
//!
//! let highdim = corpus.column_with("highdim", decode::json::<Vec<f64>>());
//! let matrix = highdim.matrix::<f32>()?;
//! assert!(matrix.is_sparse());
//! assert_eq!(matrix.shape(), (2, 4));
//! # Ok(())
//! # }
//! ```
//!
//! ### Stages
//!
//! The [`stages`] module holds one module per command. Each stage reads a
//! corpus through the views above and writes a new corpus (or a report) to
//! an [`OutputFile`]. The [`cli`] module wires them to the `tsvtm` binary.
//!
//! ## Feature flags
//!
//! - `compression-gzip`, `compression-bzip2`, `compression-xz` (all on by
//!   default): transparent (de)compression by file suffix. With a codec
//!   disabled, its suffix is still recognized and opening fails with an
//!   `Unsupported` I/O error.

pub mod cli;
pub mod column;
pub mod corpus;
pub mod error;
pub mod io;
pub mod matrix;
pub mod pairs;
pub mod stages;

pub use column::Column;
pub use corpus::Corpus;
pub use error::CorpusError;
pub use io::{Compression, LineCache, OutputFile, Resource};
pub use matrix::{CooMatrix, Matrix};
pub use pairs::PagePairs;
