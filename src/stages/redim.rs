//! Dimensionality reduction: the `highdim` column becomes a `lowdim` column.

use super::write_with_column;
use crate::column::{Column, decode};
use crate::corpus::Corpus;
use crate::io::output::OutputFile;
use crate::matrix::Matrix;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

pub const INPUT_COLUMN: &str = "highdim";
pub const OUTPUT_COLUMN: &str = "lowdim";
pub const DEFAULT_COMPONENTS: usize = 5;

const MAX_ITER: usize = 500;
const TOLERANCE: f64 = 1e-10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reducer {
    /// Copy vectors unchanged.
    Identity,
    /// Project onto the top right singular vectors.
    Svd { components: usize },
}

impl Reducer {
    pub fn name(&self) -> &'static str {
        match self {
            Reducer::Identity => "identity",
            Reducer::Svd { .. } => "truncated SVD",
        }
    }
}

/// The `highdim` matrix reduced to `components` dimensions, one vector per row.
fn reduce_svd(highdim: &Column<Vec<f64>>, components: usize) -> Result<Vec<Vec<f64>>> {
    let matrix = highdim.matrix::<f64>()?;
    debug!(
        rows = matrix.nrows(),
        cols = matrix.ncols(),
        sparse = matrix.is_sparse(),
        "decomposing"
    );
    Ok(truncated_svd(&matrix, components))
}

/// Rows of `m` projected onto its top `components` right singular vectors,
/// i.e. the leading columns of `U·Σ`.
///
/// Singular vectors are found one at a time by power iteration on `MᵀM`,
/// deflating against the ones already found. Each vector's sign is chosen
/// so that its largest-magnitude entry is positive. When `components`
/// exceeds the rank of `m`, the extra output coordinates are zero.
pub fn truncated_svd(m: &Matrix<f64>, components: usize) -> Vec<Vec<f64>> {
    let (nrows, ncols) = m.shape();
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(components);
    for c in 0..components {
        let mut rng = StdRng::seed_from_u64(c as u64);
        let mut v: Vec<f64> = (0..ncols).map(|_| rng.random::<f64>() - 0.5).collect();
        orthogonalize(&mut v, &basis);
        let mut norm = normalize(&mut v);
        for _ in 0..MAX_ITER {
            if norm == 0.0 {
                break;
            }
            let mut w = m.t_mul_vec(&m.mul_vec(&v));
            orthogonalize(&mut w, &basis);
            norm = normalize(&mut w);
            let change = 1.0 - dot(&v, &w).abs();
            v = w;
            if change < TOLERANCE {
                break;
            }
        }
        if norm == 0.0 {
            v = vec![0.0; ncols];
        }
        flip_sign(&mut v);
        basis.push(v);
    }

    let projections: Vec<Vec<f64>> = basis.iter().map(|v| m.mul_vec(v)).collect();
    (0..nrows)
        .map(|i| projections.iter().map(|p| p[i]).collect())
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let d = dot(v, b);
        for (x, y) in v.iter_mut().zip(b) {
            *x -= d * y;
        }
    }
}

/// Scale `v` to unit length, returning its former norm. Vectors that are
/// numerically zero are left alone and report a norm of zero.
fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm <= f64::EPSILON {
        return 0.0;
    }
    v.iter_mut().for_each(|x| *x /= norm);
    norm
}

fn flip_sign(v: &mut [f64]) {
    let largest = v
        .iter()
        .copied()
        .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if largest < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
}

/// Append a `lowdim` column reducing every row's `highdim` vector.
///
/// The identity reducer copies each `highdim` cell verbatim.
pub fn run(reducer: &Reducer, input: &Corpus, out: &mut OutputFile) -> Result<()> {
    input.ensure_loaded()?;
    info!("Reducing dimensionality with {}", reducer.name());
    let rows = match reducer {
        Reducer::Identity => {
            let cells = input
                .column(INPUT_COLUMN)
                .iterate()?
                .map(|cell| -> Result<String> { Ok(cell?) });
            write_with_column(input, OUTPUT_COLUMN, cells, out)?
        }
        Reducer::Svd { components } => {
            let highdim = input.column_with(INPUT_COLUMN, decode::json::<Vec<f64>>());
            let dimensions = highdim.peek()?.len();
            if *components >= dimensions {
                warn!("Reducing {dimensions} dimensions to {components} components pads with zeros");
            }
            let values = reduce_svd(&highdim, *components)?
                .into_iter()
                .map(|v| -> Result<String> { Ok(serde_json::to_string(&v)?) });
            write_with_column(input, OUTPUT_COLUMN, values, out)?
        }
    };
    info!("Reduced {rows} vectors");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::lines::LineCache;
    use crate::io::resource::Resource;
    use ndarray::array;
    use std::io::Cursor;

    #[test]
    fn identity_copies_cells_verbatim() -> anyhow::Result<()> {
        let tsv = "id\thighdim\na:1\t[2,0,1]\na:2\t[0.5, 1e3]\n";
        let input = Corpus::from_cache(LineCache::from_reader("-", Cursor::new(tsv)));
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("low.tsv");
        let mut out = OutputFile::create(Resource::from_path(&path))?;
        run(&Reducer::Identity, &input, &mut out)?;
        out.finish()?;
        assert_eq!(
            std::fs::read_to_string(&path)?,
            "id\thighdim\tlowdim\na:1\t[2,0,1]\t[2,0,1]\na:2\t[0.5, 1e3]\t[0.5, 1e3]\n"
        );
        Ok(())
    }

    #[test]
    fn svd_recovers_rank_one_structure() {
        let m = Matrix::Dense(array![[2.0, 0.0], [4.0, 0.0], [0.0, 0.0]]);
        let reduced = truncated_svd(&m, 1);
        assert_eq!(reduced.len(), 3);
        assert!((reduced[0][0] - 2.0).abs() < 1e-9);
        assert!((reduced[1][0] - 4.0).abs() < 1e-9);
        assert!(reduced[2][0].abs() < 1e-9);
    }

    #[test]
    fn svd_preserves_distances_at_full_rank() {
        let m = Matrix::Dense(array![[1.0, 2.0], [3.0, -1.0], [0.5, 0.5]]);
        let reduced = truncated_svd(&m, 2);
        let dist = |a: &[f64], b: &[f64]| -> f64 {
            a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
        };
        let original = [[1.0, 2.0], [3.0, -1.0], [0.5, 0.5]];
        for i in 0..3 {
            for j in 0..3 {
                let expected = dist(&original[i], &original[j]);
                assert!((dist(&reduced[i], &reduced[j]) - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn extra_components_are_zero() {
        let m = Matrix::Dense(array![[1.0, 0.0], [0.0, 0.0]]);
        let reduced = truncated_svd(&m, 3);
        assert_eq!(reduced[0].len(), 3);
        assert!((reduced[0][0] - 1.0).abs() < 1e-9);
        assert_eq!(&reduced[0][1..], &[0.0, 0.0]);
    }
}
