use ndarray::ArrayView2;

use crate::normalize::CoordinateTriples;

/// Reduces the edge set of a flag filtration while preserving its persistent
/// homology up to `threshold`.
///
/// Implementations may return entries in any order; the caller re-sorts them.
pub trait EdgeCollapser: Send + Sync {
    fn collapse_dense(&self, matrix: ArrayView2<f64>, threshold: f64) -> anyhow::Result<CoordinateTriples>;

    fn collapse_sparse(&self, triples: &CoordinateTriples, threshold: f64) -> anyhow::Result<CoordinateTriples>;
}

/// Keeps only the edges that can enter the filtration: strict upper triangle,
/// finite, at most `threshold`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdPruning;

impl EdgeCollapser for ThresholdPruning {
    fn collapse_dense(&self, matrix: ArrayView2<f64>, threshold: f64) -> anyhow::Result<CoordinateTriples> {
        if matrix.nrows() != matrix.ncols() {
            anyhow::bail!(
                "Collapse expects a square matrix, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            );
        }
        let n = matrix.nrows();
        let mut kept = CoordinateTriples::default();
        for i in 0..n {
            for j in (i + 1)..n {
                let v = matrix[[i, j]];
                if v.is_finite() && v <= threshold {
                    kept.push(i32::try_from(i)?, i32::try_from(j)?, v as f32);
                }
            }
        }
        Ok(kept)
    }

    fn collapse_sparse(&self, triples: &CoordinateTriples, threshold: f64) -> anyhow::Result<CoordinateTriples> {
        let mut kept = CoordinateTriples::with_capacity(triples.len());
        for (r, c, v) in triples.iter() {
            if r < c && v.is_finite() && f64::from(v) <= threshold {
                kept.push(r, c, v);
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dense_pruning() {
        let dm = array![[0.0, 1.0, 3.0], [1.0, 0.0, f64::INFINITY], [3.0, f64::INFINITY, 0.0]];
        let kept = ThresholdPruning.collapse_dense(dm.view(), f64::INFINITY).unwrap();
        assert_eq!(kept.rows, vec![0, 0]);
        assert_eq!(kept.cols, vec![1, 2]);

        let kept = ThresholdPruning.collapse_dense(dm.view(), 2.0).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_sparse_pruning_drops_lower_triangle() {
        let mut triples = CoordinateTriples::default();
        triples.push(1, 0, 1.0);
        triples.push(0, 1, 1.0);
        triples.push(1, 2, 5.0);
        let kept = ThresholdPruning.collapse_sparse(&triples, 2.0).unwrap();
        assert_eq!(kept.iter().collect::<Vec<_>>(), vec![(0, 1, 1.0)]);
    }

    #[test]
    fn test_non_square_rejected() {
        let dm = array![[0.0, 1.0, 2.0]];
        assert!(ThresholdPruning.collapse_dense(dm.view(), 1.0).is_err());
    }
}
