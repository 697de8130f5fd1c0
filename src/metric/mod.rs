use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use num_traits::{Float, ToPrimitive};

use crate::error::{Result, RipsError};

pub trait DistanceMeasure {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive;
}

fn as_f64<T: ToPrimitive>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

pub struct Euclidean;

impl DistanceMeasure for Euclidean {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        SquaredEuclidean.distance(a, b).sqrt()
    }
}

pub struct SquaredEuclidean;

impl DistanceMeasure for SquaredEuclidean {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        let mut squared_dist = T::zero();
        for i in 0..a.len() {
            let diff = a[i] - b[i];
            squared_dist = squared_dist + diff * diff;
        }
        as_f64(squared_dist)
    }
}

pub struct Manhattan;

impl DistanceMeasure for Manhattan {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        let mut dist = T::zero();
        for i in 0..a.len() {
            dist = dist + (a[i] - b[i]).abs();
        }
        as_f64(dist)
    }
}

pub struct Chebyshev;

impl DistanceMeasure for Chebyshev {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        let mut dist = T::zero();
        for i in 0..a.len() {
            dist = dist.max((a[i] - b[i]).abs());
        }
        as_f64(dist)
    }
}

/// One minus the cosine similarity, clipped to `[0, 2]`. A zero vector is at
/// distance 1 from everything.
pub struct Cosine;

impl DistanceMeasure for Cosine {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        let mut dot_product = T::zero();
        let mut norm_a = T::zero();
        let mut norm_b = T::zero();

        for i in 0..a.len() {
            dot_product = dot_product + a[i] * b[i];
            norm_a = norm_a + a[i] * a[i];
            norm_b = norm_b + b[i] * b[i];
        }

        let norm_product = (norm_a * norm_b).sqrt();
        let similarity = if norm_product > T::epsilon() {
            as_f64(dot_product / norm_product)
        } else {
            0.0
        };
        (1.0 - similarity).clamp(0.0, 2.0)
    }
}

type DistanceFn = dyn Fn(ArrayView1<f64>, ArrayView1<f64>) -> anyhow::Result<f64> + Send + Sync;

/// How the rows of a dense [`PointSet`](crate::PointSet) are turned into distances.
///
/// `Precomputed` marks the input as already being a distance matrix (dense or
/// sparse). Every other variant treats rows as feature vectors.
#[derive(Clone, Default)]
pub enum Metric {
    #[default]
    Euclidean,
    SquaredEuclidean,
    Manhattan,
    Chebyshev,
    Cosine,
    Precomputed,
    Custom(Arc<DistanceFn>),
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Euclidean => f.write_str("Euclidean"),
            Metric::SquaredEuclidean => f.write_str("SquaredEuclidean"),
            Metric::Manhattan => f.write_str("Manhattan"),
            Metric::Chebyshev => f.write_str("Chebyshev"),
            Metric::Cosine => f.write_str("Cosine"),
            Metric::Precomputed => f.write_str("Precomputed"),
            Metric::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl FromStr for Metric {
    type Err = RipsError;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "sqeuclidean" => Ok(Metric::SquaredEuclidean),
            "manhattan" | "cityblock" | "l1" => Ok(Metric::Manhattan),
            "chebyshev" => Ok(Metric::Chebyshev),
            "cosine" => Ok(Metric::Cosine),
            "precomputed" => Ok(Metric::Precomputed),
            other => Err(RipsError::invalid(format!("Unrecognized metric '{}'", other))),
        }
    }
}

impl Metric {
    /// Wraps a user-supplied pairwise distance. An `Err` from `f` aborts the
    /// computation with [`RipsError::InvalidInput`].
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        Metric::Custom(Arc::new(f))
    }

    pub fn is_precomputed(&self) -> bool {
        matches!(self, Metric::Precomputed)
    }

    pub fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
        let d = match self {
            Metric::Euclidean => Euclidean.distance(a, b),
            Metric::SquaredEuclidean => SquaredEuclidean.distance(a, b),
            Metric::Manhattan => Manhattan.distance(a, b),
            Metric::Chebyshev => Chebyshev.distance(a, b),
            Metric::Cosine => Cosine.distance(a, b),
            Metric::Custom(f) => f(a, b).map_err(|e| {
                RipsError::invalid(format!("User-supplied metric failed: {}", e))
            })?,
            Metric::Precomputed => {
                return Err(RipsError::invalid(
                    "A precomputed metric has no pairwise distance function",
                ))
            }
        };
        Ok(d)
    }

    /// Full `n x n` distance matrix between the rows of `points`.
    ///
    /// Only the upper triangle is evaluated and mirrored. Built-in metrics get a
    /// zero diagonal; a custom metric is evaluated on the diagonal as well, so it
    /// may encode non-zero birth times.
    pub fn pairwise(&self, points: ArrayView2<f64>) -> Result<Array2<f64>> {
        check_features(points)?;
        let n = points.nrows();
        let mut dm = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            let row_i = points.row(i);
            if let Metric::Custom(_) = self {
                dm[[i, i]] = self.distance(row_i, row_i)?;
            }
            for j in (i + 1)..n {
                let d = self.distance(row_i, points.row(j))?;
                dm[[i, j]] = d;
                dm[[j, i]] = d;
            }
        }
        Ok(dm)
    }

    /// Distances from row `i` to every row of `points`; entry `i` is always 0.
    pub fn one_to_all(&self, points: ArrayView2<f64>, i: usize) -> Result<Array1<f64>> {
        let reference = points.row(i);
        let mut ds = Array1::<f64>::zeros(points.nrows());
        for (j, row) in points.rows().into_iter().enumerate() {
            if j != i {
                ds[j] = self.distance(reference, row)?;
            }
        }
        Ok(ds)
    }
}

pub(crate) fn check_features(points: ArrayView2<f64>) -> Result<()> {
    if points.nrows() == 0 {
        return Err(RipsError::invalid("Point set is empty"));
    }
    if points.iter().any(|v| !v.is_finite()) {
        return Err(RipsError::invalid(
            "Feature vectors contain NaN or infinite values",
        ));
    }
    Ok(())
}
