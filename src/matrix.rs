//! Vectors and matrices of ring elements.
//!
//! Thin linear algebra over [`Poly`]: everything the tree hash, key
//! generation, and the ciphertext chain need — inner products, Hadamard
//! products, matrix-vector and transpose-vector products — computed in the
//! NTT domain. All elements of a vector or matrix share one representation;
//! mixing is a programming error and asserts.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::{GaussianSampler, ModQ, NttContext, Poly};

/// Ordered sequence of ring elements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vector {
    elements: Vec<Poly>,
}

impl Vector {
    pub fn zero(len: usize, dim: usize, q: u64) -> Self {
        Self {
            elements: (0..len).map(|_| Poly::zero(dim, q)).collect(),
        }
    }

    pub fn from_polys(elements: Vec<Poly>) -> Self {
        Self { elements }
    }

    /// Uniformly random vector in coefficient form.
    pub fn random<R: Rng>(len: usize, dim: usize, q: u64, rng: &mut R) -> Self {
        Self {
            elements: (0..len).map(|_| Poly::random(dim, q, rng)).collect(),
        }
    }

    /// Vector of centered Gaussian noise polynomials in coefficient form.
    pub fn noise(len: usize, dim: usize, q: u64, sampler: &mut GaussianSampler) -> Self {
        Self {
            elements: (0..len)
                .map(|_| Poly::sample_gaussian(dim, q, sampler))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, i: usize) -> &Poly {
        &self.elements[i]
    }

    pub fn elements(&self) -> &[Poly] {
        &self.elements
    }

    pub fn push(&mut self, p: Poly) {
        self.elements.push(p);
    }

    pub fn is_ntt(&self) -> bool {
        self.elements.iter().all(|p| p.is_ntt())
    }

    /// Forward NTT of every element, in place.
    pub fn to_ntt(&mut self, ctx: &NttContext) {
        for p in &mut self.elements {
            p.to_ntt(ctx);
        }
    }

    /// Inverse NTT of every element, in place.
    pub fn from_ntt(&mut self, ctx: &NttContext) {
        for p in &mut self.elements {
            p.from_ntt(ctx);
        }
    }

    pub fn to_ntt_new(&self, ctx: &NttContext) -> Self {
        let mut v = self.clone();
        v.to_ntt(ctx);
        v
    }

    pub fn from_ntt_new(&self, ctx: &NttContext) -> Self {
        let mut v = self.clone();
        v.from_ntt(ctx);
        v
    }

    pub fn add(&self, other: &Vector) -> Vector {
        assert_eq!(self.len(), other.len(), "vector lengths must match");
        Vector {
            elements: self
                .elements
                .iter()
                .zip(&other.elements)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }

    pub fn sub(&self, other: &Vector) -> Vector {
        assert_eq!(self.len(), other.len(), "vector lengths must match");
        Vector {
            elements: self
                .elements
                .iter()
                .zip(&other.elements)
                .map(|(a, b)| a - b)
                .collect(),
        }
    }

    /// Inner product `Σᵢ aᵢ·bᵢ` in the NTT domain. The accumulation runs
    /// fused per coefficient: no intermediate product polynomial is
    /// allocated, which matters in the decryption hot loop.
    pub fn inner(&self, other: &Vector, ctx: &NttContext) -> Poly {
        assert_eq!(self.len(), other.len(), "vector lengths must match");
        let d = ctx.dimension();
        let q = ctx.modulus();
        let mut acc = vec![0u64; d];
        for (a, b) in self.elements.iter().zip(&other.elements) {
            assert!(a.is_ntt() && b.is_ntt(), "inner product needs NTT form");
            let ar = a.raw();
            let br = b.raw();
            for t in 0..d {
                acc[t] = ModQ::add(acc[t], ctx.pointwise_mul_single(ar[t], br[t]), q);
            }
        }
        Poly::from_ntt_coeffs(acc, q)
    }

    /// Hadamard (slot-wise) product in the NTT domain.
    pub fn pointwise(&self, other: &Vector, ctx: &NttContext) -> Vector {
        assert_eq!(self.len(), other.len(), "vector lengths must match");
        Vector {
            elements: self
                .elements
                .iter()
                .zip(&other.elements)
                .map(|(a, b)| a.mul_ntt_domain(b, ctx))
                .collect(),
        }
    }

    /// Sum of all elements.
    pub fn sum_elements(&self, dim: usize, q: u64) -> Poly {
        let mut acc = if self.is_empty() {
            Poly::zero(dim, q)
        } else if self.elements[0].is_ntt() {
            Poly::from_ntt_coeffs(vec![0; dim], q)
        } else {
            Poly::zero(dim, q)
        };
        for p in &self.elements {
            acc += p;
        }
        acc
    }
}

/// Rectangular array of ring elements, row major.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    elements: Vec<Vec<Poly>>,
}

impl Matrix {
    pub fn zero(rows: usize, cols: usize, dim: usize, q: u64) -> Self {
        Self {
            rows,
            cols,
            elements: (0..rows)
                .map(|_| (0..cols).map(|_| Poly::zero(dim, q)).collect())
                .collect(),
        }
    }

    /// Uniformly random matrix in coefficient form.
    pub fn random<R: Rng>(rows: usize, cols: usize, dim: usize, q: u64, rng: &mut R) -> Self {
        Self {
            rows,
            cols,
            elements: (0..rows)
                .map(|_| (0..cols).map(|_| Poly::random(dim, q, rng)).collect())
                .collect(),
        }
    }

    pub fn from_elements(elements: Vec<Vec<Poly>>) -> Self {
        let rows = elements.len();
        let cols = elements.first().map(|r| r.len()).unwrap_or(0);
        for row in &elements {
            assert_eq!(row.len(), cols, "ragged matrix");
        }
        Self {
            rows,
            cols,
            elements,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> &Poly {
        &self.elements[i][j]
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut Poly {
        &mut self.elements[i][j]
    }

    pub fn elements(&self) -> &[Vec<Poly>] {
        &self.elements
    }

    /// Forward NTT of every element, in place.
    pub fn to_ntt(&mut self, ctx: &NttContext) {
        for row in &mut self.elements {
            for p in row {
                p.to_ntt(ctx);
            }
        }
    }

    /// `M · v` for a `rows × cols` matrix and a `cols`-vector, in NTT form.
    pub fn mul_vec(&self, v: &Vector, ctx: &NttContext) -> Vector {
        assert_eq!(v.len(), self.cols, "dimension mismatch");
        let d = ctx.dimension();
        let q = ctx.modulus();
        let mut out = Vec::with_capacity(self.rows);
        for row in &self.elements {
            let mut acc = vec![0u64; d];
            for (m, x) in row.iter().zip(v.elements()) {
                assert!(m.is_ntt() && x.is_ntt(), "mul_vec needs NTT form");
                let mr = m.raw();
                let xr = x.raw();
                for t in 0..d {
                    acc[t] = ModQ::add(acc[t], ctx.pointwise_mul_single(mr[t], xr[t]), q);
                }
            }
            out.push(Poly::from_ntt_coeffs(acc, q));
        }
        Vector::from_polys(out)
    }

    /// `Mᵀ · v` for a `rows × cols` matrix and a `rows`-vector, in NTT form.
    pub fn transpose_mul(&self, v: &Vector, ctx: &NttContext) -> Vector {
        assert_eq!(v.len(), self.rows, "dimension mismatch");
        let d = ctx.dimension();
        let q = ctx.modulus();
        let mut out = Vec::with_capacity(self.cols);
        for j in 0..self.cols {
            let mut acc = vec![0u64; d];
            for i in 0..self.rows {
                let m = &self.elements[i][j];
                let x = v.get(i);
                assert!(m.is_ntt() && x.is_ntt(), "transpose_mul needs NTT form");
                let mr = m.raw();
                let xr = x.raw();
                for t in 0..d {
                    acc[t] = ModQ::add(acc[t], ctx.pointwise_mul_single(mr[t], xr[t]), q);
                }
            }
            out.push(Poly::from_ntt_coeffs(acc, q));
        }
        Vector::from_polys(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DEFAULT_Q;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const D: usize = 256;

    fn ctx() -> NttContext {
        NttContext::new(D, DEFAULT_Q)
    }

    #[test]
    fn test_vector_add_sub() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let a = Vector::random(4, D, DEFAULT_Q, &mut rng);
        let b = Vector::random(4, D, DEFAULT_Q, &mut rng);
        let back = a.add(&b).sub(&b);
        assert_eq!(back, a);
    }

    #[test]
    fn test_inner_product_matches_mul_sum() {
        let c = ctx();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let a = Vector::random(3, D, DEFAULT_Q, &mut rng).to_ntt_new(&c);
        let b = Vector::random(3, D, DEFAULT_Q, &mut rng).to_ntt_new(&c);

        let fused = a.inner(&b, &c);

        let mut expected = Poly::from_ntt_coeffs(vec![0; D], DEFAULT_Q);
        for i in 0..3 {
            expected += &a.get(i).mul_ntt_domain(b.get(i), &c);
        }
        assert_eq!(fused, expected);
    }

    #[test]
    fn test_mul_vec_linearity() {
        let c = ctx();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut m = Matrix::random(2, 5, D, DEFAULT_Q, &mut rng);
        m.to_ntt(&c);
        let x = Vector::random(5, D, DEFAULT_Q, &mut rng).to_ntt_new(&c);
        let y = Vector::random(5, D, DEFAULT_Q, &mut rng).to_ntt_new(&c);

        let lhs = m.mul_vec(&x.add(&y), &c);
        let rhs = m.mul_vec(&x, &c).add(&m.mul_vec(&y, &c));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn test_transpose_mul_agrees_with_explicit_transpose() {
        let c = ctx();
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let mut m = Matrix::random(3, 4, D, DEFAULT_Q, &mut rng);
        m.to_ntt(&c);
        let v = Vector::random(3, D, DEFAULT_Q, &mut rng).to_ntt_new(&c);

        let fast = m.transpose_mul(&v, &c);

        let mut transposed = Vec::with_capacity(4);
        for j in 0..4 {
            transposed.push((0..3).map(|i| m.get(i, j).clone()).collect::<Vec<_>>());
        }
        let mt = Matrix::from_elements(transposed);
        let slow = mt.mul_vec(&v, &c);

        assert_eq!(fast, slow);
    }

    #[test]
    fn test_adjoint_identity() {
        // <M^T u, v> == <u, M v> as ring elements.
        let c = ctx();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let mut m = Matrix::random(3, 4, D, DEFAULT_Q, &mut rng);
        m.to_ntt(&c);
        let u = Vector::random(3, D, DEFAULT_Q, &mut rng).to_ntt_new(&c);
        let v = Vector::random(4, D, DEFAULT_Q, &mut rng).to_ntt_new(&c);

        let lhs = m.transpose_mul(&u, &c).inner(&v, &c);
        let rhs = u.inner(&m.mul_vec(&v, &c), &c);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn test_sum_elements() {
        let c = ctx();
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let v = Vector::random(4, D, DEFAULT_Q, &mut rng).to_ntt_new(&c);
        let sum = v.sum_elements(D, DEFAULT_Q);
        let ones = Vector::from_polys(vec![
            Poly::from_coeffs(
                {
                    let mut one = vec![0u64; D];
                    one[0] = 1;
                    one
                },
                DEFAULT_Q,
            )
            .to_ntt_new(&c);
            4
        ]);
        assert_eq!(sum, v.inner(&ones, &c));
    }
}
