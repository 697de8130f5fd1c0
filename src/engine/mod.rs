use crate::error::{Result, RipsError};
use crate::normalize::CoordinateTriples;

pub mod reduction;

pub use reduction::{Binary, FieldOps, PrimeField, ReductionEngine};

/// Parameters forwarded unchanged to a persistence engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineRequest {
    pub maxdim: usize,
    /// Simplices above this value are not built. `f32::INFINITY` means no threshold.
    pub threshold: f32,
    pub coeff: u32,
    pub want_cocycles: bool,
}

/// Raw engine result. Each dimension holds interleaved `birth, death` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutput {
    pub births_and_deaths_by_dim: Vec<Vec<f32>>,
    pub num_edges: usize,
}

/// A Vietoris-Rips persistence engine.
///
/// `compute_dense` receives the row-major strict upper triangle of an
/// `n_points x n_points` matrix. `compute_sparse` receives coordinate triples
/// sorted by `(row, col)`; diagonal entries are vertex birth times and absent
/// entries mean "no edge".
pub trait PersistenceEngine: Send + Sync {
    fn compute_dense(&self, upper: &[f32], n_points: usize, request: &EngineRequest) -> anyhow::Result<EngineOutput>;

    fn compute_sparse(
        &self,
        triples: &CoordinateTriples,
        n_points: usize,
        request: &EngineRequest,
    ) -> anyhow::Result<EngineOutput>;
}

/// Coefficient field of the homology computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefficientField {
    Binary,
    Prime(u32),
}

impl CoefficientField {
    pub fn from_coeff(coeff: u32) -> Result<Self> {
        match coeff {
            2 => Ok(CoefficientField::Binary),
            p if is_prime(p) => Ok(CoefficientField::Prime(p)),
            p => Err(RipsError::invalid(format!(
                "Coefficient {} is not a prime number",
                p
            ))),
        }
    }

    pub fn modulus(&self) -> u32 {
        match self {
            CoefficientField::Binary => 2,
            CoefficientField::Prime(p) => *p,
        }
    }
}

pub fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2u64;
    while d * d <= u64::from(n) {
        if u64::from(n) % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prime() {
        let primes: Vec<u32> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert!(is_prime(65521));
        assert!(!is_prime(65535));
    }

    #[test]
    fn test_field_from_coeff() {
        assert_eq!(CoefficientField::from_coeff(2).unwrap(), CoefficientField::Binary);
        assert_eq!(CoefficientField::from_coeff(3).unwrap(), CoefficientField::Prime(3));
        assert_eq!(CoefficientField::Prime(7).modulus(), 7);
        assert!(matches!(
            CoefficientField::from_coeff(4),
            Err(RipsError::InvalidInput(_))
        ));
        assert!(CoefficientField::from_coeff(1).is_err());
    }
}
