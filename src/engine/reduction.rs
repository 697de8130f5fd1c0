//! Boundary-matrix reduction over a prime field.
//!
//! Enumerates the whole clique filtration up to one dimension above the
//! highest requested homology, so its cost grows like `n^(maxdim + 2)`. It is
//! meant for small inputs and for checking other engines against.

use std::collections::HashMap;
use std::marker::PhantomData;

use anyhow::bail;
use log::debug;

use super::{is_prime, EngineOutput, EngineRequest, PersistenceEngine};
use crate::normalize::CoordinateTriples;

pub trait FieldOps: Sized + Send + Sync {
    fn with_modulus(modulus: u32) -> anyhow::Result<Self>;

    fn add(&self, a: u32, b: u32) -> u32;

    fn mul(&self, a: u32, b: u32) -> u32;

    fn neg(&self, a: u32) -> u32;

    fn inv(&self, a: u32) -> u32;
}

/// Z/2. Addition is XOR and every non-zero element is its own inverse.
#[derive(Debug, Clone, Copy)]
pub struct Binary;

impl FieldOps for Binary {
    fn with_modulus(modulus: u32) -> anyhow::Result<Self> {
        if modulus != 2 {
            bail!("The binary engine only supports coefficient 2, got {}", modulus);
        }
        Ok(Binary)
    }

    fn add(&self, a: u32, b: u32) -> u32 {
        (a ^ b) & 1
    }

    fn mul(&self, a: u32, b: u32) -> u32 {
        a & b & 1
    }

    fn neg(&self, a: u32) -> u32 {
        a
    }

    fn inv(&self, a: u32) -> u32 {
        a
    }
}

/// Z/p for any prime `p`.
#[derive(Debug, Clone, Copy)]
pub struct PrimeField {
    p: u32,
}

impl FieldOps for PrimeField {
    fn with_modulus(modulus: u32) -> anyhow::Result<Self> {
        if !is_prime(modulus) {
            bail!("Coefficient {} is not a prime number", modulus);
        }
        Ok(PrimeField { p: modulus })
    }

    fn add(&self, a: u32, b: u32) -> u32 {
        ((u64::from(a) + u64::from(b)) % u64::from(self.p)) as u32
    }

    fn mul(&self, a: u32, b: u32) -> u32 {
        ((u64::from(a) * u64::from(b)) % u64::from(self.p)) as u32
    }

    fn neg(&self, a: u32) -> u32 {
        if a == 0 {
            0
        } else {
            self.p - a
        }
    }

    fn inv(&self, a: u32) -> u32 {
        // Fermat: a^(p-2) mod p
        let mut result = 1u32;
        let mut base = a % self.p;
        let mut exp = self.p - 2;
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            exp >>= 1;
        }
        result
    }
}

#[derive(Debug, Clone)]
struct Simplex {
    vertices: Vec<usize>,
    value: f32,
}

impl Simplex {
    fn dim(&self) -> usize {
        self.vertices.len() - 1
    }
}

/// Vertex births plus, for every vertex, its higher-indexed neighbours sorted
/// by index.
struct FlagComplex {
    births: Vec<f32>,
    neighbors: Vec<Vec<(usize, f32)>>,
}

impl FlagComplex {
    fn from_dense(upper: &[f32], n_points: usize) -> anyhow::Result<Self> {
        let expected = n_points * n_points.saturating_sub(1) / 2;
        if upper.len() != expected {
            bail!(
                "Upper triangle has {} entries, expected {} for {} points",
                upper.len(),
                expected,
                n_points
            );
        }
        let mut neighbors = vec![Vec::new(); n_points];
        let mut k = 0;
        for (i, row) in neighbors.iter_mut().enumerate() {
            for j in (i + 1)..n_points {
                let v = upper[k];
                k += 1;
                if v.is_nan() {
                    bail!("Distance between {} and {} is NaN", i, j);
                }
                if v.is_finite() {
                    row.push((j, v));
                }
            }
        }
        Ok(FlagComplex {
            births: vec![0.0; n_points],
            neighbors,
        })
    }

    fn from_sparse(triples: &CoordinateTriples, n_points: usize) -> anyhow::Result<Self> {
        if !triples.is_lexsorted() {
            bail!("Coordinate input is not strictly sorted by (row, col)");
        }
        let mut births = vec![0.0; n_points];
        let mut neighbors = vec![Vec::new(); n_points];
        for (r, c, v) in triples.iter() {
            let (i, j) = match (usize::try_from(r), usize::try_from(c)) {
                (Ok(i), Ok(j)) if i < n_points && j < n_points => (i, j),
                _ => bail!("Coordinate ({}, {}) is outside a {}-point matrix", r, c, n_points),
            };
            if v.is_nan() {
                bail!("Entry ({}, {}) is NaN", i, j);
            }
            if i == j {
                births[i] = v;
            } else if i < j && v.is_finite() {
                neighbors[i].push((j, v));
            }
        }
        Ok(FlagComplex { births, neighbors })
    }

    fn edge(&self, i: usize, j: usize) -> Option<f32> {
        let row = &self.neighbors[i];
        row.binary_search_by_key(&j, |&(k, _)| k).ok().map(|k| row[k].1)
    }

    /// All cliques of dimension at most `max_dim` whose value does not exceed
    /// `threshold`, sorted into filtration order.
    fn filtration(&self, max_dim: usize, threshold: f32) -> Vec<Simplex> {
        let mut frontier: Vec<Simplex> = self
            .births
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b <= threshold)
            .map(|(v, &b)| Simplex {
                vertices: vec![v],
                value: b,
            })
            .collect();
        let mut simplices = frontier.clone();

        for _ in 1..=max_dim {
            let mut next = Vec::new();
            for s in &frontier {
                let first = s.vertices[0];
                let last = s.vertices[s.vertices.len() - 1];
                'candidates: for &(v, w) in &self.neighbors[first] {
                    if v <= last {
                        continue;
                    }
                    let mut value = s.value.max(w).max(self.births[v]);
                    for &u in &s.vertices[1..] {
                        match self.edge(u, v) {
                            Some(e) => value = value.max(e),
                            None => continue 'candidates,
                        }
                    }
                    if value <= threshold {
                        let mut vertices = s.vertices.clone();
                        vertices.push(v);
                        next.push(Simplex { vertices, value });
                    }
                }
            }
            simplices.extend(next.iter().cloned());
            frontier = next;
        }

        simplices.sort_by(|a, b| {
            a.value
                .total_cmp(&b.value)
                .then(a.dim().cmp(&b.dim()))
                .then_with(|| a.vertices.cmp(&b.vertices))
        });
        simplices
    }

    fn persistence<F: FieldOps>(&self, field: &F, request: &EngineRequest) -> anyhow::Result<EngineOutput> {
        let maxdim = request.maxdim;
        let simplices = self.filtration(maxdim + 1, request.threshold);
        let num_edges = simplices.iter().filter(|s| s.dim() == 1).count();
        debug!(
            "Reducing {} simplices ({} edges) up to dimension {}",
            simplices.len(),
            num_edges,
            maxdim + 1
        );

        let index: HashMap<&[usize], usize> = simplices
            .iter()
            .enumerate()
            .map(|(k, s)| (s.vertices.as_slice(), k))
            .collect();

        let mut reduced: Vec<Vec<(usize, u32)>> = Vec::with_capacity(simplices.len());
        let mut pivot_owner: HashMap<usize, usize> = HashMap::new();
        let mut paired = vec![false; simplices.len()];
        let mut pairs = Vec::new();

        for (j, s) in simplices.iter().enumerate() {
            let mut column = boundary(s, &index, field)?;
            while let Some(&(low, coeff)) = column.last() {
                let Some(&k) = pivot_owner.get(&low) else {
                    break;
                };
                let pivot = reduced[k].last().map_or(1, |&(_, c)| c);
                let factor = field.neg(field.mul(coeff, field.inv(pivot)));
                column = add_scaled(&column, &reduced[k], factor, field);
            }
            if let Some(&(low, _)) = column.last() {
                pivot_owner.insert(low, j);
                paired[low] = true;
                paired[j] = true;
                pairs.push((low, j));
            }
            reduced.push(column);
        }

        let mut births_and_deaths_by_dim = vec![Vec::new(); maxdim + 1];
        for (low, j) in pairs {
            let (birth, death) = (&simplices[low], &simplices[j]);
            if birth.dim() <= maxdim && death.value > birth.value {
                births_and_deaths_by_dim[birth.dim()].extend([birth.value, death.value]);
            }
        }
        for (k, s) in simplices.iter().enumerate() {
            if !paired[k] && s.dim() <= maxdim {
                births_and_deaths_by_dim[s.dim()].extend([s.value, f32::INFINITY]);
            }
        }

        Ok(EngineOutput {
            births_and_deaths_by_dim,
            num_edges,
        })
    }
}

fn boundary<F: FieldOps>(
    s: &Simplex,
    index: &HashMap<&[usize], usize>,
    field: &F,
) -> anyhow::Result<Vec<(usize, u32)>> {
    if s.dim() == 0 {
        return Ok(Vec::new());
    }
    let mut column = Vec::with_capacity(s.vertices.len());
    let mut face = Vec::with_capacity(s.dim());
    for skip in 0..s.vertices.len() {
        face.clear();
        face.extend(
            s.vertices
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != skip)
                .map(|(_, &v)| v),
        );
        let Some(&row) = index.get(face.as_slice()) else {
            bail!("Face {:?} of {:?} is missing from the filtration", face, s.vertices);
        };
        let sign = if skip % 2 == 0 { 1 } else { field.neg(1) };
        column.push((row, sign));
    }
    column.sort_unstable_by_key(|&(row, _)| row);
    Ok(column)
}

fn add_scaled<F: FieldOps>(a: &[(usize, u32)], b: &[(usize, u32)], factor: u32, field: &F) -> Vec<(usize, u32)> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let next = match (a.get(i), b.get(j)) {
            (Some(&(ra, ca)), Some(&(rb, cb))) if ra == rb => {
                i += 1;
                j += 1;
                (ra, field.add(ca, field.mul(factor, cb)))
            }
            (Some(&(ra, ca)), Some(&(rb, _))) if ra < rb => {
                i += 1;
                (ra, ca)
            }
            (Some(&(ra, ca)), None) => {
                i += 1;
                (ra, ca)
            }
            (_, Some(&(rb, cb))) => {
                j += 1;
                (rb, field.mul(factor, cb))
            }
            (None, None) => break,
        };
        if next.1 != 0 {
            out.push(next);
        }
    }
    out
}

/// Reference engine for the field `F`.
pub struct ReductionEngine<F> {
    _field: PhantomData<fn() -> F>,
}

impl<F: FieldOps> ReductionEngine<F> {
    pub fn new() -> Self {
        ReductionEngine { _field: PhantomData }
    }
}

impl<F: FieldOps> Default for ReductionEngine<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FieldOps> std::fmt::Debug for ReductionEngine<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReductionEngine<{}>", std::any::type_name::<F>())
    }
}

impl<F: FieldOps> ReductionEngine<F> {
    fn run(&self, complex: FlagComplex, request: &EngineRequest) -> anyhow::Result<EngineOutput> {
        let field = F::with_modulus(request.coeff)?;
        if request.want_cocycles {
            debug!("Representative cocycles were requested but are not produced by this engine");
        }
        complex.persistence(&field, request)
    }
}

impl<F: FieldOps> PersistenceEngine for ReductionEngine<F> {
    fn compute_dense(&self, upper: &[f32], n_points: usize, request: &EngineRequest) -> anyhow::Result<EngineOutput> {
        self.run(FlagComplex::from_dense(upper, n_points)?, request)
    }

    fn compute_sparse(
        &self,
        triples: &CoordinateTriples,
        n_points: usize,
        request: &EngineRequest,
    ) -> anyhow::Result<EngineOutput> {
        self.run(FlagComplex::from_sparse(triples, n_points)?, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn request(maxdim: usize, coeff: u32) -> EngineRequest {
        EngineRequest {
            maxdim,
            threshold: f32::INFINITY,
            coeff,
            want_cocycles: false,
        }
    }

    // (0,0) (1,0) (0,1) (1,1), strict upper triangle in row-major order.
    fn square_upper() -> Vec<f32> {
        let d = 2.0_f32.sqrt();
        vec![1.0, 1.0, d, d, 1.0, 1.0]
    }

    fn pairs(flat: &[f32]) -> Vec<(f32, f32)> {
        flat.chunks(2).map(|p| (p[0], p[1])).collect()
    }

    #[test]
    fn test_prime_field_arithmetic() {
        let f = PrimeField::with_modulus(7).unwrap();
        assert_eq!(f.add(5, 4), 2);
        assert_eq!(f.mul(3, 5), 1);
        assert_eq!(f.neg(3), 4);
        for a in 1..7 {
            assert_eq!(f.mul(a, f.inv(a)), 1);
        }
        assert!(PrimeField::with_modulus(9).is_err());
        assert!(Binary::with_modulus(3).is_err());
    }

    #[test]
    fn test_add_scaled_cancels_pivot() {
        let f = PrimeField::with_modulus(5).unwrap();
        let a = vec![(0, 1), (2, 3)];
        let b = vec![(1, 1), (2, 1)];
        // 3 + factor * 1 == 0 mod 5
        let out = add_scaled(&a, &b, 2, &f);
        assert_eq!(out, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_square_diagram() {
        let engine = ReductionEngine::<Binary>::new();
        let out = engine.compute_dense(&square_upper(), 4, &request(1, 2)).unwrap();

        assert_eq!(out.births_and_deaths_by_dim.len(), 2);
        assert_eq!(out.num_edges, 6);

        let h0 = pairs(&out.births_and_deaths_by_dim[0]);
        assert_eq!(h0, vec![(0.0, 1.0), (0.0, 1.0), (0.0, 1.0), (0.0, f32::INFINITY)]);

        let h1 = pairs(&out.births_and_deaths_by_dim[1]);
        assert_eq!(h1.len(), 1);
        assert_relative_eq!(h1[0].0, 1.0);
        assert_relative_eq!(h1[0].1, 2.0_f32.sqrt());
    }

    #[test]
    fn test_prime_coefficients_agree_on_square() {
        let binary = ReductionEngine::<Binary>::new()
            .compute_dense(&square_upper(), 4, &request(1, 2))
            .unwrap();
        let ternary = ReductionEngine::<PrimeField>::new()
            .compute_dense(&square_upper(), 4, &request(1, 3))
            .unwrap();
        assert_eq!(binary, ternary);
    }

    #[test]
    fn test_sparse_births_and_missing_edges() {
        // Two vertices born at 0.5 and 2.0, joined at 3.0; a third isolated vertex.
        let mut triples = CoordinateTriples::default();
        triples.push(0, 0, 0.5);
        triples.push(0, 1, 3.0);
        triples.push(1, 1, 2.0);
        let out = ReductionEngine::<Binary>::new()
            .compute_sparse(&triples, 3, &request(0, 2))
            .unwrap();

        let h0 = pairs(&out.births_and_deaths_by_dim[0]);
        assert_eq!(h0, vec![(2.0, 3.0), (0.0, f32::INFINITY), (0.5, f32::INFINITY)]);
        assert_eq!(out.num_edges, 1);
    }

    #[test]
    fn test_threshold_makes_classes_essential() {
        let mut req = request(1, 2);
        req.threshold = 1.2;
        let out = ReductionEngine::<Binary>::new()
            .compute_dense(&square_upper(), 4, &req)
            .unwrap();
        assert_eq!(out.num_edges, 4);
        let h1 = pairs(&out.births_and_deaths_by_dim[1]);
        assert_eq!(h1, vec![(1.0, f32::INFINITY)]);
    }

    #[test]
    fn test_malformed_input_rejected() {
        let engine = ReductionEngine::<Binary>::new();
        assert!(engine.compute_dense(&[1.0, 2.0], 3, &request(1, 2)).is_err());

        let mut unsorted = CoordinateTriples::default();
        unsorted.push(1, 2, 1.0);
        unsorted.push(0, 1, 1.0);
        assert!(engine.compute_sparse(&unsorted, 3, &request(1, 2)).is_err());

        let mut out_of_range = CoordinateTriples::default();
        out_of_range.push(0, 5, 1.0);
        assert!(engine.compute_sparse(&out_of_range, 3, &request(1, 2)).is_err());

        assert!(engine.compute_dense(&square_upper(), 4, &request(1, 3)).is_err());
    }
}
