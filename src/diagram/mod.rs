use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::engine::EngineOutput;
use crate::error::{Result, RipsError};
use crate::sampling::GreedyPermutation;

/// `(birth, death)` pairs of one homology dimension, shape `(N, 2)`.
/// Essential classes have `death == f64::INFINITY`.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceDiagram {
    pairs: Array2<f64>,
}

impl PersistenceDiagram {
    pub fn from_flat(flat: &[f32]) -> Result<Self> {
        if flat.len() % 2 != 0 {
            return Err(RipsError::EngineFailure(anyhow::anyhow!(
                "Engine returned an odd number ({}) of birth/death values",
                flat.len()
            )));
        }
        let values: Vec<f64> = flat.iter().map(|&v| f64::from(v)).collect();
        let pairs = Array2::from_shape_vec((flat.len() / 2, 2), values)
            .map_err(|e| RipsError::EngineFailure(anyhow::anyhow!("Failed to reshape diagram: {}", e)))?;
        Ok(PersistenceDiagram { pairs })
    }

    pub fn pairs(&self) -> ArrayView2<'_, f64> {
        self.pairs.view()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.pairs
    }

    pub fn births(&self) -> ArrayView1<'_, f64> {
        self.pairs.column(0)
    }

    pub fn deaths(&self) -> ArrayView1<'_, f64> {
        self.pairs.column(1)
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.nrows() == 0
    }

    pub fn num_essential(&self) -> usize {
        self.deaths().iter().filter(|d| d.is_infinite()).count()
    }
}

pub fn assemble_diagrams(output: &EngineOutput) -> Result<Vec<PersistenceDiagram>> {
    output
        .births_and_deaths_by_dim
        .iter()
        .map(|flat| PersistenceDiagram::from_flat(flat))
        .collect()
}

/// Everything one persistence computation produces.
#[derive(Debug, Clone)]
pub struct RipsResult {
    /// One diagram per dimension `0..=maxdim`.
    pub diagrams: Vec<PersistenceDiagram>,
    /// Edges the engine actually processed.
    pub num_edges: usize,
    /// Indices of the points used, identity when no subsampling happened.
    pub permutation: Vec<usize>,
    /// Covering radius of the subsample, 0 without subsampling.
    pub r_cover: f64,
    /// Distances from each sampled point to every original point; only set
    /// when subsampling happened.
    pub dperm2all: Option<Array2<f64>>,
}

impl RipsResult {
    pub fn new(output: EngineOutput, sampling: Option<GreedyPermutation>, n_points: usize) -> Result<Self> {
        let diagrams = assemble_diagrams(&output)?;
        let (permutation, r_cover, dperm2all) = match sampling {
            Some(sample) => {
                let r_cover = sample.r_cover();
                (sample.permutation, r_cover, Some(sample.dperm2all))
            }
            None => ((0..n_points).collect(), 0.0, None),
        };
        Ok(RipsResult {
            diagrams,
            num_edges: output.num_edges,
            permutation,
            r_cover,
            dperm2all,
        })
    }

    pub fn diagram(&self, dim: usize) -> Option<&PersistenceDiagram> {
        self.diagrams.get(dim)
    }
}
