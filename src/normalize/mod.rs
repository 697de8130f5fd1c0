use log::{debug, warn};
use nalgebra_sparse::CooMatrix;
use ndarray::ArrayView2;

use crate::collapse::EdgeCollapser;
use crate::dispatch::BackendInput;
use crate::distance::{DistanceMatrix, SparseInput};
use crate::error::{Result, RipsError};

/// Sparse `(row, col, value)` entries of a distance matrix in parallel arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateTriples {
    pub rows: Vec<i32>,
    pub cols: Vec<i32>,
    pub values: Vec<f32>,
}

fn to_index(i: usize) -> Result<i32> {
    i32::try_from(i).map_err(|_| {
        RipsError::invalid(format!("Index {} does not fit into a 32-bit coordinate", i))
    })
}

fn check_birth(i: usize, j: usize, v: f64) -> Result<()> {
    if i == j && v.is_infinite() {
        return Err(RipsError::invalid(format!(
            "Diagonal entry {} is infinite; a vertex birth time must be finite",
            i
        )));
    }
    Ok(())
}

impl CoordinateTriples {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            cols: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, row: i32, col: i32, value: f32) {
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, i32, f32)> + '_ {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .zip(self.values.iter())
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// True if `(row, col)` pairs are strictly increasing, which also rules out
    /// duplicates.
    pub fn is_lexsorted(&self) -> bool {
        self.rows
            .windows(2)
            .zip(self.cols.windows(2))
            .all(|(r, c)| (r[0], c[0]) < (r[1], c[1]))
    }

    /// Stable sort by `(row, col)`; repeated coordinates are merged into one
    /// entry holding the smallest value, the time the edge first appears.
    pub fn lexsort(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&k| (self.rows[k], self.cols[k]));

        let mut sorted = CoordinateTriples::with_capacity(self.len());
        let mut merged = 0usize;
        for k in order {
            let (r, c, v) = (self.rows[k], self.cols[k], self.values[k]);
            let repeated = sorted.rows.last() == Some(&r) && sorted.cols.last() == Some(&c);
            match sorted.values.last_mut() {
                Some(last) if repeated => {
                    *last = last.min(v);
                    merged += 1;
                }
                _ => sorted.push(r, c, v),
            }
        }
        if merged > 0 {
            warn!("Merged {} duplicate coordinates, keeping the smallest value of each", merged);
        }
        *self = sorted;
    }

    /// Diagonal and strict upper triangle of a dense matrix, row-major.
    ///
    /// Zero diagonal entries and infinite off-diagonal entries (no edge) are
    /// skipped; an infinite diagonal entry is rejected. The result is sorted by
    /// construction.
    pub fn from_dense_upper(dm: ArrayView2<f64>) -> Result<Self> {
        let n = dm.nrows();
        let mut triples = CoordinateTriples::with_capacity(n * (n + 1) / 2);
        for i in 0..n {
            let row = to_index(i)?;
            for j in i..n {
                let v = dm[[i, j]];
                check_birth(i, j, v)?;
                if v.is_infinite() || (i == j && v == 0.0) {
                    continue;
                }
                triples.push(row, to_index(j)?, v as f32);
            }
        }
        Ok(triples)
    }

    /// Extracts every stored entry; an infinite diagonal entry is rejected. The
    /// flag reports whether the matrix layout already guarantees lexicographic
    /// order with unique coordinates.
    pub fn from_sparse(dm: &SparseInput) -> Result<(Self, bool)> {
        let mut triples = CoordinateTriples::with_capacity(dm.nnz());
        let sorted = match dm {
            SparseInput::Csr(m) => {
                for (i, j, &v) in m.triplet_iter() {
                    check_birth(i, j, v)?;
                    triples.push(to_index(i)?, to_index(j)?, v as f32);
                }
                true
            }
            SparseInput::Csc(m) => {
                for (i, j, &v) in m.triplet_iter() {
                    check_birth(i, j, v)?;
                    triples.push(to_index(i)?, to_index(j)?, v as f32);
                }
                false
            }
            SparseInput::Coo(m) => {
                for (i, j, &v) in m.triplet_iter() {
                    check_birth(i, j, v)?;
                    triples.push(to_index(i)?, to_index(j)?, v as f32);
                }
                false
            }
        };
        Ok((triples, sorted))
    }

    pub fn to_coo(&self, n_points: usize) -> anyhow::Result<CooMatrix<f64>> {
        CooMatrix::try_from_triplets(
            n_points,
            n_points,
            self.rows.iter().map(|&r| r as usize).collect(),
            self.cols.iter().map(|&c| c as usize).collect(),
            self.values.iter().map(|&v| v as f64).collect(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to create COO matrix: {}", e))
    }
}

/// Row-major strict upper triangle, `n (n - 1) / 2` values.
pub fn flatten_upper(dm: ArrayView2<f64>) -> Vec<f32> {
    let n = dm.nrows();
    let mut upper = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        upper.extend(dm.row(i).iter().skip(i + 1).map(|&v| v as f32));
    }
    upper
}

pub struct CollapseRequest<'c> {
    pub collapser: &'c dyn EdgeCollapser,
    pub threshold: f64,
}

/// Brings a distance matrix into the form one of the persistence backends
/// accepts.
///
/// A dense matrix with a zero diagonal goes to the dense backend unchanged
/// unless a collapse is requested. A non-zero diagonal can only be expressed
/// in coordinate form, and disables the collapse. Every coordinate set leaving
/// this function is lexicographically sorted without duplicates.
///
/// The matrix is consumed: an owned dense matrix is released here, before any
/// engine allocates its own working memory.
pub fn normalize(matrix: DistanceMatrix<'_>, collapse: Option<CollapseRequest<'_>>) -> Result<BackendInput> {
    let n_points = matrix.n_points();
    let births = matrix.has_nonzero_diagonal();

    let collapse = match collapse {
        Some(_) if births => {
            warn!(
                "Edge collapses are not supported when any of the diagonal entries are non-zero. \
                 Computing persistent homology without using edge collapse."
            );
            None
        }
        other => other,
    };

    let (mut triples, sorted) = match (matrix, collapse) {
        (DistanceMatrix::Dense(dm), None) if !births => {
            let upper = flatten_upper(dm.view());
            drop(dm);
            debug!("Dense backend input: {} points, {} distances", n_points, upper.len());
            return Ok(BackendInput::Dense { upper, n_points });
        }
        (DistanceMatrix::Dense(dm), None) => {
            let triples = CoordinateTriples::from_dense_upper(dm.view())?;
            drop(dm);
            (triples, true)
        }
        (DistanceMatrix::Dense(dm), Some(request)) => {
            let triples = request.collapser.collapse_dense(dm.view(), request.threshold)?;
            drop(dm);
            (triples, false)
        }
        (DistanceMatrix::Sparse(dm), None) => CoordinateTriples::from_sparse(dm)?,
        (DistanceMatrix::Sparse(dm), Some(request)) => {
            let (triples, _) = CoordinateTriples::from_sparse(dm)?;
            let collapsed = request.collapser.collapse_sparse(&triples, request.threshold)?;
            (collapsed, false)
        }
    };

    if !sorted {
        triples.lexsort();
    }
    debug!(
        "Sparse backend input: {} points, {} entries (sorted on input: {})",
        n_points,
        triples.len(),
        sorted
    );
    Ok(BackendInput::Sparse { triples, n_points })
}
