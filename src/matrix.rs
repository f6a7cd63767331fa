//! Dense and sparse numeric matrices built from vector columns.
//!
//! [`Column::matrix`](crate::column::Column::matrix) picks the encoding; the
//! numeric stages only rely on the operations shared by both variants
//! (row access and matrix-vector products).

use ndarray::Array2;
use num_traits::Float;

/// A row-major numeric matrix, either dense or coordinate-list sparse.
#[derive(Clone, Debug, PartialEq)]
pub enum Matrix<A> {
    Dense(Array2<A>),
    Sparse(CooMatrix<A>),
}

impl<A: Float> Matrix<A> {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Matrix::Dense(array) => array.dim(),
            Matrix::Sparse(coo) => coo.shape(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.shape().0
    }

    pub fn ncols(&self) -> usize {
        self.shape().1
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Matrix::Sparse(_))
    }

    /// Row `i` as a dense vector.
    ///
    /// # Panics
    /// If `i` is out of bounds.
    pub fn row(&self, i: usize) -> Vec<A> {
        match self {
            Matrix::Dense(array) => array.row(i).to_vec(),
            Matrix::Sparse(coo) => coo.row(i),
        }
    }

    /// `self · v`, one entry per row.
    pub fn mul_vec(&self, v: &[A]) -> Vec<A> {
        match self {
            Matrix::Dense(array) => array
                .rows()
                .into_iter()
                .map(|row| dot(row.iter().copied(), v.iter().copied()))
                .collect(),
            Matrix::Sparse(coo) => {
                let mut out = vec![A::zero(); coo.nrows];
                for (i, j, x) in coo.triplets() {
                    out[i] = out[i] + x * v[j];
                }
                out
            }
        }
    }

    /// `selfᵀ · v`, one entry per column.
    pub fn t_mul_vec(&self, v: &[A]) -> Vec<A> {
        let mut out = vec![A::zero(); self.ncols()];
        match self {
            Matrix::Dense(array) => {
                for (row, vi) in array.rows().into_iter().zip(v) {
                    for (o, x) in out.iter_mut().zip(row.iter()) {
                        *o = *o + *x * *vi;
                    }
                }
            }
            Matrix::Sparse(coo) => {
                for (i, j, x) in coo.triplets() {
                    out[j] = out[j] + x * v[i];
                }
            }
        }
        out
    }

    pub fn to_dense(&self) -> Array2<A> {
        match self {
            Matrix::Dense(array) => array.clone(),
            Matrix::Sparse(coo) => {
                let mut array = Array2::zeros(coo.shape());
                for (i, j, x) in coo.triplets() {
                    array[[i, j]] = x;
                }
                array
            }
        }
    }
}

fn dot<A: Float>(a: impl Iterator<Item = A>, b: impl Iterator<Item = A>) -> A {
    a.zip(b).fold(A::zero(), |acc, (x, y)| acc + x * y)
}

/// Sparse matrix storing only nonzero entries as (row, column, value).
///
/// Entries are kept in the order they were pushed, which for matrices built
/// from a column is row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct CooMatrix<A> {
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<A>,
}

impl<A: Float> CooMatrix<A> {
    /// An empty matrix with `ncols` columns and no rows yet.
    pub fn new(ncols: usize) -> Self {
        Self {
            nrows: 0,
            ncols,
            rows: Vec::new(),
            cols: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Record entry `(i, j)`. Rows must be pushed in non-decreasing order.
    pub fn push(&mut self, i: usize, j: usize, value: A) {
        debug_assert!(j < self.ncols);
        debug_assert!(self.rows.last().is_none_or(|last| *last <= i));
        self.rows.push(i);
        self.cols.push(j);
        self.values.push(value);
        self.nrows = self.nrows.max(i + 1);
    }

    /// Fix the row count, which may exceed the last row holding a nonzero.
    pub fn set_nrows(&mut self, nrows: usize) {
        self.nrows = self.nrows.max(nrows);
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored (nonzero) entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, A)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.values)
            .map(|((i, j), x)| (*i, *j, *x))
    }

    fn row(&self, i: usize) -> Vec<A> {
        assert!(i < self.nrows, "row {i} out of bounds for {} rows", self.nrows);
        let start = self.rows.partition_point(|r| *r < i);
        let end = self.rows.partition_point(|r| *r <= i);
        let mut out = vec![A::zero(); self.ncols];
        for k in start..end {
            out[self.cols[k]] = self.values[k];
        }
        out
    }
}
