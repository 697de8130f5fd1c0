use std::sync::Arc;

use log::debug;

use crate::engine::{
    Binary, CoefficientField, EngineOutput, EngineRequest, PersistenceEngine, PrimeField, ReductionEngine,
};
use crate::error::Result;
use crate::normalize::CoordinateTriples;

/// What the normalizer hands to an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendInput {
    /// Row-major strict upper triangle of a zero-diagonal square matrix.
    Dense { upper: Vec<f32>, n_points: usize },
    /// Lexicographically sorted coordinate triples.
    Sparse { triples: CoordinateTriples, n_points: usize },
}

impl BackendInput {
    pub fn n_points(&self) -> usize {
        match self {
            BackendInput::Dense { n_points, .. } | BackendInput::Sparse { n_points, .. } => *n_points,
        }
    }
}

/// One engine per coefficient-field variant.
#[derive(Clone)]
pub struct Backends {
    pub binary: Arc<dyn PersistenceEngine>,
    pub prime: Arc<dyn PersistenceEngine>,
}

impl Default for Backends {
    fn default() -> Self {
        Backends {
            binary: Arc::new(ReductionEngine::<Binary>::new()),
            prime: Arc::new(ReductionEngine::<PrimeField>::new()),
        }
    }
}

impl Backends {
    pub fn for_field(&self, field: CoefficientField) -> &dyn PersistenceEngine {
        match field {
            CoefficientField::Binary => self.binary.as_ref(),
            CoefficientField::Prime(_) => self.prime.as_ref(),
        }
    }
}

/// Runs `input` on the engine matching `request.coeff`.
///
/// The field picks the engine, the input shape picks the entry point. The
/// input is consumed so that its buffer is released as soon as the engine
/// returns.
pub fn dispatch(input: BackendInput, request: &EngineRequest, backends: &Backends) -> Result<EngineOutput> {
    let field = CoefficientField::from_coeff(request.coeff)?;
    let engine = backends.for_field(field);

    let output = match input {
        BackendInput::Dense { upper, n_points } => {
            debug!("Dispatching {} points to the dense {:?} backend", n_points, field);
            engine.compute_dense(&upper, n_points, request)?
        }
        BackendInput::Sparse { triples, n_points } => {
            debug!(
                "Dispatching {} points, {} entries to the sparse {:?} backend",
                n_points,
                triples.len(),
                field
            );
            engine.compute_sparse(&triples, n_points, request)?
        }
    };
    debug!("Engine processed {} edges", output.num_edges);
    Ok(output)
}
