use rayon::prelude::*;

use crate::diagram::RipsResult;
use crate::distance::PointSet;
use crate::error::Result;
use crate::pipeline::{Rips, RipsBuilder, RipsParams};

impl Rips {
    /// Runs [`Rips::compute`] on every input across the current rayon pool.
    /// Each computation is independent and single-threaded; results keep the
    /// input order.
    pub fn compute_batch(&self, inputs: &[PointSet]) -> Vec<Result<RipsResult>> {
        inputs.par_iter().map(|points| self.compute(points)).collect()
    }
}

pub fn compute_persistence_batch(inputs: &[PointSet], params: &RipsParams) -> Vec<Result<RipsResult>> {
    RipsBuilder::new().params(params.clone()).build().compute_batch(inputs)
}
