use std::sync::Arc;

use log::debug;
use ndarray::CowArray;

use crate::collapse::{EdgeCollapser, ThresholdPruning};
use crate::diagram::RipsResult;
use crate::dispatch::{dispatch, Backends};
use crate::distance::{build_distance_matrix, DistanceMatrix, PointSet};
use crate::engine::{CoefficientField, EngineRequest, PersistenceEngine};
use crate::error::{Result, RipsError};
use crate::metric::Metric;
use crate::normalize::{normalize, CollapseRequest};
use crate::sampling::greedy_permutation;

/// Parameters of one Vietoris-Rips computation.
#[derive(Debug, Clone)]
pub struct RipsParams {
    /// Highest homology dimension; all of `0..=maxdim` are computed.
    pub maxdim: usize,
    /// Largest filtration value built. `f64::INFINITY` builds the whole filtration.
    pub threshold: f64,
    /// Prime coefficient field.
    pub coeff: u32,
    pub metric: Metric,
    /// Number of points kept by furthest-point sampling. `None` keeps all.
    pub n_perm: Option<usize>,
    pub collapse_edges: bool,
}

impl Default for RipsParams {
    fn default() -> Self {
        Self {
            maxdim: 1,
            threshold: f64::INFINITY,
            coeff: 2,
            metric: Metric::Euclidean,
            n_perm: None,
            collapse_edges: false,
        }
    }
}

impl RipsParams {
    pub fn validate(&self) -> Result<()> {
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(RipsError::invalid(format!(
                "Threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }
        CoefficientField::from_coeff(self.coeff)?;
        Ok(())
    }

    fn engine_request(&self) -> EngineRequest {
        EngineRequest {
            maxdim: self.maxdim,
            threshold: self.threshold as f32,
            coeff: self.coeff,
            want_cocycles: false,
        }
    }
}

pub struct RipsBuilder {
    params: RipsParams,
    backends: Backends,
    collapser: Arc<dyn EdgeCollapser>,
}

impl Default for RipsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RipsBuilder {
    pub fn new() -> Self {
        RipsBuilder {
            params: RipsParams::default(),
            backends: Backends::default(),
            collapser: Arc::new(ThresholdPruning),
        }
    }

    pub fn maxdim(mut self, maxdim: usize) -> Self {
        self.params.maxdim = maxdim;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.params.threshold = threshold;
        self
    }

    pub fn coeff(mut self, coeff: u32) -> Self {
        self.params.coeff = coeff;
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.params.metric = metric;
        self
    }

    pub fn n_perm(mut self, n_perm: usize) -> Self {
        self.params.n_perm = Some(n_perm);
        self
    }

    pub fn collapse_edges(mut self, collapse_edges: bool) -> Self {
        self.params.collapse_edges = collapse_edges;
        self
    }

    pub fn params(mut self, params: RipsParams) -> Self {
        self.params = params;
        self
    }

    /// Engines for the Z/2 and general Z/p variants.
    pub fn engines(mut self, binary: Arc<dyn PersistenceEngine>, prime: Arc<dyn PersistenceEngine>) -> Self {
        self.backends = Backends { binary, prime };
        self
    }

    pub fn collapser(mut self, collapser: Arc<dyn EdgeCollapser>) -> Self {
        self.collapser = collapser;
        self
    }

    pub fn build(self) -> Rips {
        Rips {
            params: self.params,
            backends: self.backends,
            collapser: self.collapser,
        }
    }
}

/// A configured Vietoris-Rips computation. Holds no per-call state, so one
/// instance can serve many inputs, including from several threads.
#[derive(Clone)]
pub struct Rips {
    params: RipsParams,
    backends: Backends,
    collapser: Arc<dyn EdgeCollapser>,
}

impl Rips {
    pub fn params(&self) -> &RipsParams {
        &self.params
    }

    /// Persistence diagrams of `points`.
    ///
    /// Peak memory is at most two O(n^2) buffers: the distance matrix and its
    /// single-precision flattening exist together only while the latter is
    /// built. The matrix is released before the engine runs.
    pub fn compute(&self, points: &PointSet) -> Result<RipsResult> {
        let params = &self.params;
        params.validate()?;

        let n_points = points.n_points();
        let sampling = match params.n_perm {
            Some(n_perm) => Some(greedy_permutation(points, n_perm, &params.metric)?),
            None => None,
        };

        let matrix = match &sampling {
            Some(sample) => DistanceMatrix::Dense(CowArray::from(sample.sample_distance_matrix())),
            None => build_distance_matrix(points, &params.metric)?,
        };
        debug!(
            "Distance matrix over {} of {} points (sparse: {})",
            matrix.n_points(),
            n_points,
            matrix.is_sparse()
        );

        let collapse = params.collapse_edges.then(|| CollapseRequest {
            collapser: self.collapser.as_ref(),
            threshold: params.threshold,
        });
        let input = normalize(matrix, collapse)?;
        let output = dispatch(input, &params.engine_request(), &self.backends)?;

        RipsResult::new(output, sampling, n_points)
    }
}

/// Computes Vietoris-Rips persistence of `points` with the built-in engines.
pub fn compute_persistence(points: &PointSet, params: &RipsParams) -> Result<RipsResult> {
    RipsBuilder::new().params(params.clone()).build().compute(points)
}
