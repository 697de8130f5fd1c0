use log::debug;
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};

use crate::distance::{
    check_square_dense, DistanceOracle, FeatureRows, PointSet, PrecomputedRows,
};
use crate::error::{Result, RipsError};
use crate::metric::{check_features, Metric};

/// Furthest-point sample of a point set.
///
/// `covering_radii[i]` is the largest distance from any original point to the
/// nearest of the first `i + 1` samples. `dperm2all` has one row per sample and
/// one column per original point.
#[derive(Debug, Clone)]
pub struct GreedyPermutation {
    pub permutation: Vec<usize>,
    pub covering_radii: Array1<f64>,
    pub dperm2all: Array2<f64>,
}

impl GreedyPermutation {
    /// Covering radius of the full sample.
    pub fn r_cover(&self) -> f64 {
        self.covering_radii.last().copied().unwrap_or(0.0)
    }

    /// Sample-to-sample distances, `n_perm x n_perm`.
    pub fn sample_distance_matrix(&self) -> Array2<f64> {
        self.dperm2all.select(Axis(1), &self.permutation)
    }
}

/// Greedy furthest-point sampling of `n_perm` points.
///
/// The first sample is always point 0. Each later sample is the point farthest
/// from all previous ones; ties go to the lowest index. Indices are unique
/// only while some point is still at a positive distance from the sample:
/// once every remaining distance is 0 (coincident points), index 0 is
/// selected again.
///
/// For a precomputed matrix the diagonal is read as 0, so vertex birth times
/// do not count as distances.
pub fn greedy_permutation(points: &PointSet, n_perm: usize, metric: &Metric) -> Result<GreedyPermutation> {
    match points {
        PointSet::Sparse(_) => Err(RipsError::unsupported(
            "Greedy permutation is not supported for sparse distance matrices",
        )),
        PointSet::Dense(x) if metric.is_precomputed() => {
            check_square_dense(x.view())?;
            sample(&PrecomputedRows { matrix: x.view() }, n_perm)
        }
        PointSet::Dense(x) => {
            check_features(x.view())?;
            sample(&FeatureRows { points: x.view(), metric }, n_perm)
        }
    }
}

pub(crate) fn check_n_perm(n_perm: usize, n_points: usize) -> Result<()> {
    if n_perm == 0 {
        return Err(RipsError::unsupported(
            "Should be a strictly positive number of points in the greedy permutation",
        ));
    }
    if n_perm > n_points {
        return Err(RipsError::unsupported(format!(
            "Number of points in greedy permutation ({}) is greater than number of points in the point cloud ({})",
            n_perm, n_points
        )));
    }
    Ok(())
}

fn argmax_first(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (j, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = j;
        }
    }
    best
}

fn sample<O: DistanceOracle>(oracle: &O, n_perm: usize) -> Result<GreedyPermutation> {
    let n = oracle.n_points();
    check_n_perm(n_perm, n)?;

    let mut permutation = vec![0usize; n_perm];
    let mut covering_radii = Array1::<f64>::zeros(n_perm);
    let mut dperm2all = Array2::<f64>::zeros((n_perm, n));

    dperm2all.row_mut(0).assign(&oracle.distances_from(0)?.view());
    let mut ds = dperm2all.row(0).to_owned();

    for i in 1..n_perm {
        let idx = argmax_first(ds.view());
        permutation[i] = idx;
        covering_radii[i - 1] = ds[idx];

        dperm2all.row_mut(i).assign(&oracle.distances_from(idx)?.view());
        Zip::from(&mut ds)
            .and(dperm2all.row(i))
            .for_each(|d, &new| *d = d.min(new));
    }

    covering_radii[n_perm - 1] = ds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    debug!(
        "Greedy permutation selected {} of {} points, covering radius {}",
        n_perm,
        n,
        covering_radii[n_perm - 1]
    );

    Ok(GreedyPermutation {
        permutation,
        covering_radii,
        dperm2all,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra_sparse::CooMatrix;
    use ndarray::array;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn square() -> PointSet {
        PointSet::Dense(array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]])
    }

    fn random_cloud(n: usize, seed: u64) -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Array2::from_shape_fn((n, 3), |_| rng.random_range(-1.0..1.0))
    }

    #[test]
    fn test_square_first_two_samples() {
        let perm = greedy_permutation(&square(), 2, &Metric::Euclidean).unwrap();

        assert_eq!(perm.permutation, vec![0, 3]);
        assert_relative_eq!(perm.covering_radii[0], 2.0_f64.sqrt());
        assert_relative_eq!(perm.r_cover(), 1.0);
        assert_eq!(perm.dperm2all.dim(), (2, 4));
        assert_eq!(perm.sample_distance_matrix().dim(), (2, 2));
    }

    #[test]
    fn test_ties_break_to_lowest_index() {
        // Points 1 and 2 are both at distance 1 from point 0.
        let points = PointSet::Dense(array![[0.0], [1.0], [-1.0]]);
        let perm = greedy_permutation(&points, 3, &Metric::Euclidean).unwrap();
        assert_eq!(perm.permutation, vec![0, 1, 2]);
        assert_relative_eq!(perm.r_cover(), 0.0);
    }

    #[test]
    fn test_covering_radii_non_increasing() {
        let points = PointSet::Dense(random_cloud(60, 7));
        let perm = greedy_permutation(&points, 25, &Metric::Euclidean).unwrap();

        for w in perm.covering_radii.windows(2) {
            assert!(w[1] <= w[0]);
        }

        let unique: HashSet<usize> = perm.permutation.iter().copied().collect();
        assert_eq!(unique.len(), 25);
        assert_eq!(perm.permutation[0], 0);

        let nearest = perm
            .dperm2all
            .columns()
            .into_iter()
            .map(|col| col.iter().copied().fold(f64::INFINITY, f64::min))
            .fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(perm.r_cover(), nearest);
    }

    #[test]
    fn test_precomputed_diagonal_is_not_a_distance() {
        let dm = array![[5.0, 1.0, 2.0], [1.0, 0.0, 1.0], [2.0, 1.0, 0.0]];
        let perm = greedy_permutation(&PointSet::Dense(dm), 2, &Metric::Precomputed).unwrap();

        assert_eq!(perm.permutation, vec![0, 2]);
        assert_eq!(perm.covering_radii.to_vec(), vec![2.0, 1.0]);
        assert_eq!(perm.sample_distance_matrix(), array![[0.0, 2.0], [2.0, 0.0]]);
    }

    #[test]
    fn test_coincident_points_repeat_index_zero() {
        let points = PointSet::Dense(array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]);
        let perm = greedy_permutation(&points, 2, &Metric::Euclidean).unwrap();

        assert_eq!(perm.permutation, vec![0, 0]);
        assert_eq!(perm.r_cover(), 0.0);
    }

    #[test]
    fn test_r_cover_of_empty_sample() {
        let perm = GreedyPermutation {
            permutation: Vec::new(),
            covering_radii: Array1::zeros(0),
            dperm2all: Array2::zeros((0, 3)),
        };
        assert_eq!(perm.r_cover(), 0.0);
    }

    #[test]
    fn test_full_permutation_has_zero_cover() {
        let points = PointSet::Dense(random_cloud(12, 3));
        let perm = greedy_permutation(&points, 12, &Metric::Manhattan).unwrap();
        assert_relative_eq!(perm.r_cover(), 0.0);
    }

    #[test]
    fn test_precomputed_matches_features() {
        let cloud = random_cloud(20, 11);
        let dm = Metric::Euclidean.pairwise(cloud.view()).unwrap();

        let from_features = greedy_permutation(&PointSet::Dense(cloud), 8, &Metric::Euclidean).unwrap();
        let from_matrix = greedy_permutation(&PointSet::Dense(dm), 8, &Metric::Precomputed).unwrap();

        assert_eq!(from_features.permutation, from_matrix.permutation);
        for (a, b) in from_features
            .covering_radii
            .iter()
            .zip(from_matrix.covering_radii.iter())
        {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sample_matrix_indexes_columns_by_permutation() {
        let perm = greedy_permutation(&square(), 3, &Metric::Euclidean).unwrap();
        let sub = perm.sample_distance_matrix();
        for a in 0..perm.permutation.len() {
            for (b, &pb) in perm.permutation.iter().enumerate() {
                assert_eq!(sub[[a, b]], perm.dperm2all[[a, pb]]);
            }
            assert_eq!(sub[[a, a]], 0.0);
        }
    }

    #[test]
    fn test_rejections() {
        let coo = CooMatrix::<f64>::new(4, 4);
        let err = greedy_permutation(&PointSet::from(coo), 2, &Metric::Precomputed).unwrap_err();
        assert!(matches!(err, RipsError::UnsupportedCombination(_)));

        let err = greedy_permutation(&square(), 5, &Metric::Euclidean).unwrap_err();
        assert!(matches!(err, RipsError::UnsupportedCombination(_)));

        let err = greedy_permutation(&square(), 0, &Metric::Euclidean).unwrap_err();
        assert!(matches!(err, RipsError::UnsupportedCombination(_)));
    }
}
