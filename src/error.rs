//! Error types for corpus access.
//!
//! Every failure in the streaming layer (line cache, tabular view, column
//! accessor, matrix materialization) is reported as a [`CorpusError`]. The
//! layer never prints or logs; the pipeline stages decide whether a given
//! error becomes a user-facing diagnostic or is recovered from.

use thiserror::Error;

/// Boxed error returned by column decoders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while reading a corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// A second fresh pass was started over an unseekable stream before the
    /// recording pass finished. This is a defect in the calling code.
    #[error(
        "second iteration over {source_name} started before the cache was fully populated during the first one"
    )]
    Sequencing { source_name: String },

    /// A requested target or filter column is absent from the header.
    #[error("column '{column}' not found")]
    MissingColumn { column: String },

    /// The input has no header line.
    #[error("input {source_name} is empty")]
    EmptyInput { source_name: String },

    /// The column exists but has no eligible rows.
    #[error("column '{column}' contains no rows")]
    EmptyColumn { column: String },

    /// A data row is too short to contain a looked-up column.
    #[error("line {line} has no cell for column '{column}'")]
    ShortRow { column: String, line: usize },

    /// Decoded vectors differ in length.
    #[error("line {line} of column '{column}' has {found} entries, expected {expected}")]
    RaggedMatrix {
        column: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    /// The decode function rejected a cell.
    #[error("unable to decode line {line} of column '{column}': {source}")]
    Decode {
        column: String,
        line: usize,
        #[source]
        source: BoxError,
    },

    /// A page-adjacency line did not contain exactly two cells.
    #[error("line {line} of the page pair file does not contain exactly two ids")]
    MalformedPair { line: usize },

    #[error("unable to shape matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for corpus operations.
pub type Result<T> = std::result::Result<T, CorpusError>;
