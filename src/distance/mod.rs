use log::debug;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use ndarray::{Array2, ArrayView1, ArrayView2, CowArray, Ix2};

use crate::error::{Result, RipsError};
use crate::metric::Metric;

/// A precomputed sparse distance matrix. Absent entries mean "no edge".
#[derive(Debug, Clone)]
pub enum SparseInput {
    Coo(CooMatrix<f64>),
    Csr(CsrMatrix<f64>),
    Csc(CscMatrix<f64>),
}

impl SparseInput {
    pub fn nrows(&self) -> usize {
        match self {
            SparseInput::Coo(m) => m.nrows(),
            SparseInput::Csr(m) => m.nrows(),
            SparseInput::Csc(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            SparseInput::Coo(m) => m.ncols(),
            SparseInput::Csr(m) => m.ncols(),
            SparseInput::Csc(m) => m.ncols(),
        }
    }

    pub fn nnz(&self) -> usize {
        match self {
            SparseInput::Coo(m) => m.nnz(),
            SparseInput::Csr(m) => m.nnz(),
            SparseInput::Csc(m) => m.nnz(),
        }
    }

    /// Returns true if any explicitly stored diagonal entry is non-zero.
    pub fn has_nonzero_diagonal(&self) -> bool {
        match self {
            SparseInput::Coo(m) => m.triplet_iter().any(|(i, j, &v)| i == j && v != 0.0),
            SparseInput::Csr(m) => m.triplet_iter().any(|(i, j, &v)| i == j && v != 0.0),
            SparseInput::Csc(m) => m.triplet_iter().any(|(i, j, &v)| i == j && v != 0.0),
        }
    }
}

impl From<CooMatrix<f64>> for SparseInput {
    fn from(m: CooMatrix<f64>) -> Self {
        SparseInput::Coo(m)
    }
}

impl From<CsrMatrix<f64>> for SparseInput {
    fn from(m: CsrMatrix<f64>) -> Self {
        SparseInput::Csr(m)
    }
}

impl From<CscMatrix<f64>> for SparseInput {
    fn from(m: CscMatrix<f64>) -> Self {
        SparseInput::Csc(m)
    }
}

/// Input to a persistence computation.
///
/// `Dense` holds either `n` feature vectors (one per row) or, with
/// [`Metric::Precomputed`], an `n x n` distance matrix. `Sparse` is always a
/// precomputed distance matrix.
#[derive(Debug, Clone)]
pub enum PointSet {
    Dense(Array2<f64>),
    Sparse(SparseInput),
}

impl PointSet {
    pub fn n_points(&self) -> usize {
        match self {
            PointSet::Dense(x) => x.nrows(),
            PointSet::Sparse(x) => x.nrows(),
        }
    }
}

impl From<Array2<f64>> for PointSet {
    fn from(x: Array2<f64>) -> Self {
        PointSet::Dense(x)
    }
}

impl From<SparseInput> for PointSet {
    fn from(x: SparseInput) -> Self {
        PointSet::Sparse(x)
    }
}

impl From<CooMatrix<f64>> for PointSet {
    fn from(x: CooMatrix<f64>) -> Self {
        PointSet::Sparse(x.into())
    }
}

impl From<CsrMatrix<f64>> for PointSet {
    fn from(x: CsrMatrix<f64>) -> Self {
        PointSet::Sparse(x.into())
    }
}

impl From<CscMatrix<f64>> for PointSet {
    fn from(x: CscMatrix<f64>) -> Self {
        PointSet::Sparse(x.into())
    }
}

/// Canonical distance representation handed to the normalizer.
///
/// Precomputed input is borrowed, never copied; computed matrices are owned and
/// released as soon as the normalizer has consumed them.
#[derive(Debug)]
pub enum DistanceMatrix<'a> {
    Dense(CowArray<'a, f64, Ix2>),
    Sparse(&'a SparseInput),
}

impl<'a> DistanceMatrix<'a> {
    pub fn n_points(&self) -> usize {
        match self {
            DistanceMatrix::Dense(dm) => dm.nrows().max(dm.ncols()),
            DistanceMatrix::Sparse(dm) => dm.nrows().max(dm.ncols()),
        }
    }

    pub fn has_nonzero_diagonal(&self) -> bool {
        match self {
            DistanceMatrix::Dense(dm) => dm.diag().iter().any(|&v| v != 0.0),
            DistanceMatrix::Sparse(dm) => dm.has_nonzero_diagonal(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, DistanceMatrix::Sparse(_))
    }
}

pub(crate) fn check_square_dense(dm: ArrayView2<f64>) -> Result<()> {
    if dm.nrows() != dm.ncols() {
        return Err(RipsError::invalid(format!(
            "Precomputed distance matrix must be square, got {}x{}",
            dm.nrows(),
            dm.ncols()
        )));
    }
    if dm.nrows() == 0 {
        return Err(RipsError::invalid("Distance matrix is empty"));
    }
    if dm.iter().any(|v| v.is_nan()) {
        return Err(RipsError::invalid("Distance matrix contains NaN entries"));
    }
    Ok(())
}

pub(crate) fn check_square_sparse(dm: &SparseInput) -> Result<()> {
    if dm.nrows() != dm.ncols() {
        return Err(RipsError::invalid(format!(
            "Precomputed sparse distance matrix must be square, got {}x{}",
            dm.nrows(),
            dm.ncols()
        )));
    }
    if dm.nrows() == 0 {
        return Err(RipsError::invalid("Distance matrix is empty"));
    }
    Ok(())
}

/// Turns a [`PointSet`] into the distance matrix used for persistence.
///
/// Precomputed input passes through unchanged. Feature vectors are always
/// expanded to a dense pairwise matrix, even if later stages sparsify it.
pub fn build_distance_matrix<'a>(points: &'a PointSet, metric: &Metric) -> Result<DistanceMatrix<'a>> {
    match (points, metric.is_precomputed()) {
        (PointSet::Dense(x), true) => {
            check_square_dense(x.view())?;
            Ok(DistanceMatrix::Dense(CowArray::from(x.view())))
        }
        (PointSet::Sparse(x), true) => {
            check_square_sparse(x)?;
            Ok(DistanceMatrix::Sparse(x))
        }
        (PointSet::Dense(x), false) => {
            debug!(
                "Computing {}x{} pairwise distances with {:?}",
                x.nrows(),
                x.nrows(),
                metric
            );
            let dm = metric.pairwise(x.view())?;
            Ok(DistanceMatrix::Dense(CowArray::from(dm)))
        }
        (PointSet::Sparse(_), false) => Err(RipsError::invalid(
            "Sparse input must be a precomputed distance matrix; use Metric::Precomputed",
        )),
    }
}

/// Row `i` of a distance matrix or the one-vs-all distances of point `i`.
pub(crate) trait DistanceOracle {
    fn n_points(&self) -> usize;

    fn distances_from(&self, i: usize) -> Result<DistanceRow<'_>>;
}

pub(crate) enum DistanceRow<'a> {
    Borrowed(ArrayView1<'a, f64>),
    Owned(ndarray::Array1<f64>),
}

impl DistanceRow<'_> {
    pub(crate) fn view(&self) -> ArrayView1<'_, f64> {
        match self {
            DistanceRow::Borrowed(v) => v.view(),
            DistanceRow::Owned(v) => v.view(),
        }
    }
}

pub(crate) struct PrecomputedRows<'a> {
    pub(crate) matrix: ArrayView2<'a, f64>,
}

impl DistanceOracle for PrecomputedRows<'_> {
    fn n_points(&self) -> usize {
        self.matrix.nrows()
    }

    /// Row `i` with the self distance read as 0. A non-zero diagonal entry is a
    /// birth time, not a distance, so that row is copied and patched.
    fn distances_from(&self, i: usize) -> Result<DistanceRow<'_>> {
        let row = self.matrix.row(i);
        if row[i] == 0.0 {
            return Ok(DistanceRow::Borrowed(row));
        }
        let mut owned = row.to_owned();
        owned[i] = 0.0;
        Ok(DistanceRow::Owned(owned))
    }
}

pub(crate) struct FeatureRows<'a> {
    pub(crate) points: ArrayView2<'a, f64>,
    pub(crate) metric: &'a Metric,
}

impl DistanceOracle for FeatureRows<'_> {
    fn n_points(&self) -> usize {
        self.points.nrows()
    }

    fn distances_from(&self, i: usize) -> Result<DistanceRow<'_>> {
        Ok(DistanceRow::Owned(self.metric.one_to_all(self.points, i)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_precomputed_dense_is_borrowed() {
        let points = PointSet::Dense(array![[0.0, 1.0], [1.0, 0.0]]);
        let dm = build_distance_matrix(&points, &Metric::Precomputed).unwrap();
        match dm {
            DistanceMatrix::Dense(m) => {
                assert!(m.is_view());
                assert_eq!(m[[0, 1]], 1.0);
            }
            DistanceMatrix::Sparse(_) => panic!("expected dense"),
        }
    }

    #[test]
    fn test_features_produce_owned_dense() {
        let points = PointSet::Dense(array![[0.0, 0.0], [3.0, 4.0], [6.0, 8.0]]);
        let dm = build_distance_matrix(&points, &Metric::Euclidean).unwrap();
        assert_eq!(dm.n_points(), 3);
        assert!(!dm.has_nonzero_diagonal());
        match dm {
            DistanceMatrix::Dense(m) => {
                assert!(m.is_owned());
                assert_relative_eq!(m[[0, 2]], 10.0);
            }
            DistanceMatrix::Sparse(_) => panic!("expected dense"),
        }
    }

    #[test]
    fn test_non_square_precomputed_rejected() {
        let points = PointSet::Dense(array![[0.0, 1.0, 2.0], [1.0, 0.0, 3.0]]);
        let err = build_distance_matrix(&points, &Metric::Precomputed).unwrap_err();
        assert!(matches!(err, RipsError::InvalidInput(_)));

        let coo = CooMatrix::<f64>::new(2, 3);
        let sparse = PointSet::from(coo);
        let err = build_distance_matrix(&sparse, &Metric::Precomputed).unwrap_err();
        assert!(matches!(err, RipsError::InvalidInput(_)));
    }

    #[test]
    fn test_sparse_with_feature_metric_rejected() {
        let coo = CooMatrix::<f64>::new(3, 3);
        let points = PointSet::from(coo);
        let err = build_distance_matrix(&points, &Metric::Euclidean).unwrap_err();
        assert!(matches!(err, RipsError::InvalidInput(_)));
    }

    #[test]
    fn test_precomputed_rows_zero_the_self_distance() {
        let dm = array![[5.0, 1.0, 2.0], [1.0, 0.0, 1.0], [2.0, 1.0, 0.0]];
        let rows = PrecomputedRows { matrix: dm.view() };

        let first = rows.distances_from(0).unwrap();
        assert!(matches!(first, DistanceRow::Owned(_)));
        assert_eq!(first.view().to_vec(), vec![0.0, 1.0, 2.0]);

        let second = rows.distances_from(1).unwrap();
        assert!(matches!(second, DistanceRow::Borrowed(_)));
        assert_eq!(second.view().to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sparse_diagonal_detection() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 1, 1.0);
        coo.push(1, 1, 0.0);
        let zero_diag = SparseInput::from(coo.clone());
        assert!(!zero_diag.has_nonzero_diagonal());

        coo.push(2, 2, 0.5);
        let births = SparseInput::from(CscMatrix::from(&coo));
        assert!(births.has_nonzero_diagonal());
    }
}
