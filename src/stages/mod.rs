//! Pipeline stages built on the corpus views.
//!
//! Corpus-rewriting stages (`embed`, `redim`, `cluster`, `desc`) strip their
//! output column from the input view and append the new values as the last
//! column. Reporting stages (`eval`, `comp`, `show`) write plain text.
//!
//! Stages that need more than one pass over their input call
//! [`Corpus::ensure_loaded`] first so that standard input is recorded once
//! before the passes interleave.

pub mod cat;
pub mod cluster;
pub mod comp;
pub mod desc;
pub mod embed;
pub mod eval;
pub mod metrics;
pub mod redim;
pub mod show;
pub mod text;

use crate::corpus::Corpus;
use crate::io::output::OutputFile;
use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Copy `corpus` to `out` with `column` replaced by `values`, appended last.
///
/// `values` must yield exactly one value per data row. Returns the number of
/// rows written.
pub fn write_with_column<I>(corpus: &Corpus, column: &str, values: I, out: &mut OutputFile) -> Result<usize>
where
    I: IntoIterator<Item = Result<String>>,
{
    let mut rows = corpus.strip(column).iterate()?;
    let header = rows.next().transpose()?.unwrap_or_default();
    out.write_row([header.as_str(), column])?;

    let mut values = values.into_iter();
    let mut n = 0;
    for row in rows {
        let row = row?;
        let value = values
            .next()
            .with_context(|| format!("no '{column}' value for row {}", n + 1))??;
        out.write_row([row.as_str(), value.as_str()])?;
        n += 1;
    }
    if values.next().is_some() {
        bail!("more '{column}' values than the {n} rows of {}", corpus.name());
    }
    Ok(n)
}

/// A generator seeded with `seed`, or from OS entropy without one.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    StdRng::seed_from_u64(seed.unwrap_or_else(rand::random))
}
