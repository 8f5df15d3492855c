//! Polynomials over R_q = Z_q[X]/(X^d + 1).
//!
//! Every polynomial carries its representation (`coefficient` or `ntt`)
//! explicitly. Mixing representations in arithmetic corrupts decryption
//! silently, so all binary operations assert domain agreement.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use super::mod_q::ModQ;
use super::ntt::NttContext;
use super::sampler::GaussianSampler;

/// Polynomial in R_q, stored as d residues plus a domain flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Poly {
    coeffs: Vec<u64>,
    q: u64,
    is_ntt: bool,
}

impl Poly {
    /// Zero polynomial (coefficient domain; zero is fixed by the NTT, so the
    /// flag only matters for domain-agreement asserts).
    pub fn zero(dim: usize, q: u64) -> Self {
        Self {
            coeffs: vec![0; dim],
            q,
            is_ntt: false,
        }
    }

    /// Builds a polynomial from coefficients, reducing mod q.
    pub fn from_coeffs(coeffs: Vec<u64>, q: u64) -> Self {
        let mut p = Self {
            coeffs,
            q,
            is_ntt: false,
        };
        for c in &mut p.coeffs {
            *c %= q;
        }
        p
    }

    /// Reconstructs a polynomial already in NTT (Montgomery evaluation) form,
    /// e.g. from the wire. The values are trusted to be reduced.
    pub fn from_ntt_coeffs(coeffs: Vec<u64>, q: u64) -> Self {
        Self {
            coeffs,
            q,
            is_ntt: true,
        }
    }

    /// Uniformly random polynomial in coefficient form.
    pub fn random<R: Rng>(dim: usize, q: u64, rng: &mut R) -> Self {
        let coeffs: Vec<u64> = (0..dim).map(|_| rng.gen_range(0..q)).collect();
        Self {
            coeffs,
            q,
            is_ntt: false,
        }
    }

    /// Random polynomial with uniform binary coefficients.
    pub fn random_binary<R: Rng>(dim: usize, q: u64, rng: &mut R) -> Self {
        let coeffs: Vec<u64> = (0..dim).map(|_| rng.gen_range(0..2u64)).collect();
        Self {
            coeffs,
            q,
            is_ntt: false,
        }
    }

    /// Polynomial with centered discrete Gaussian coefficients.
    pub fn sample_gaussian(dim: usize, q: u64, sampler: &mut GaussianSampler) -> Self {
        Self {
            coeffs: sampler.sample_vec_centered(dim, q),
            q,
            is_ntt: false,
        }
    }

    pub fn dimension(&self) -> usize {
        self.coeffs.len()
    }

    pub fn modulus(&self) -> u64 {
        self.q
    }

    pub fn is_ntt(&self) -> bool {
        self.is_ntt
    }

    /// Coefficient access; meaningless in the evaluation domain.
    pub fn coeff(&self, i: usize) -> u64 {
        assert!(!self.is_ntt, "coefficient access in NTT domain");
        self.coeffs[i]
    }

    /// Raw residue slice, whichever domain the polynomial is in.
    pub fn raw(&self) -> &[u64] {
        &self.coeffs
    }

    pub fn raw_mut(&mut self) -> &mut [u64] {
        &mut self.coeffs
    }

    /// Forward NTT in place (no-op when already transformed).
    pub fn to_ntt(&mut self, ctx: &NttContext) {
        if !self.is_ntt {
            ctx.forward(&mut self.coeffs);
            self.is_ntt = true;
        }
    }

    /// Inverse NTT in place (no-op when already in coefficient form).
    pub fn from_ntt(&mut self, ctx: &NttContext) {
        if self.is_ntt {
            ctx.inverse(&mut self.coeffs);
            self.is_ntt = false;
        }
    }

    /// Copy in NTT form.
    pub fn to_ntt_new(&self, ctx: &NttContext) -> Self {
        let mut p = self.clone();
        p.to_ntt(ctx);
        p
    }

    /// Copy in coefficient form.
    pub fn from_ntt_new(&self, ctx: &NttContext) -> Self {
        let mut p = self.clone();
        p.from_ntt(ctx);
        p
    }

    /// Scalar multiplication by a plain residue. Valid in both domains: a
    /// plain factor times a Montgomery value is the Montgomery form of the
    /// product.
    pub fn scalar_mul(&self, scalar: u64) -> Self {
        let scalar = scalar % self.q;
        Self {
            coeffs: self
                .coeffs
                .iter()
                .map(|&c| ModQ::mul(c, scalar, self.q))
                .collect(),
            q: self.q,
            is_ntt: self.is_ntt,
        }
    }

    /// Pointwise product; both operands must be in NTT form.
    pub fn mul_ntt_domain(&self, other: &Self, ctx: &NttContext) -> Self {
        assert!(self.is_ntt && other.is_ntt, "operands must be in NTT form");
        assert_eq!(self.q, other.q, "moduli must match");
        let mut result = vec![0u64; self.coeffs.len()];
        ctx.pointwise_mul(&self.coeffs, &other.coeffs, &mut result);
        Self {
            coeffs: result,
            q: self.q,
            is_ntt: true,
        }
    }

    /// Full multiplication of coefficient-form polynomials through the NTT.
    pub fn mul_ntt(&self, other: &Self, ctx: &NttContext) -> Self {
        let a = self.to_ntt_new(ctx);
        let b = other.to_ntt_new(ctx);
        a.mul_ntt_domain(&b, ctx).from_ntt_new(ctx)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0)
    }

    /// Maximum absolute coefficient under the centered representation.
    pub fn linf_norm(&self) -> u64 {
        assert!(!self.is_ntt, "norms are coefficient-domain quantities");
        self.coeffs
            .iter()
            .map(|&c| if c <= self.q / 2 { c } else { self.q - c })
            .max()
            .unwrap_or(0)
    }
}

impl PartialEq for Poly {
    fn eq(&self, other: &Self) -> bool {
        self.q == other.q && self.is_ntt == other.is_ntt && self.coeffs == other.coeffs
    }
}

impl Eq for Poly {}

impl Add for &Poly {
    type Output = Poly;

    fn add(self, rhs: Self) -> Poly {
        assert_eq!(self.q, rhs.q, "moduli must match");
        assert_eq!(self.is_ntt, rhs.is_ntt, "domains must match");
        Poly {
            coeffs: self
                .coeffs
                .iter()
                .zip(rhs.coeffs.iter())
                .map(|(&a, &b)| ModQ::add(a, b, self.q))
                .collect(),
            q: self.q,
            is_ntt: self.is_ntt,
        }
    }
}

impl Sub for &Poly {
    type Output = Poly;

    fn sub(self, rhs: Self) -> Poly {
        assert_eq!(self.q, rhs.q, "moduli must match");
        assert_eq!(self.is_ntt, rhs.is_ntt, "domains must match");
        Poly {
            coeffs: self
                .coeffs
                .iter()
                .zip(rhs.coeffs.iter())
                .map(|(&a, &b)| ModQ::sub(a, b, self.q))
                .collect(),
            q: self.q,
            is_ntt: self.is_ntt,
        }
    }
}

impl Neg for &Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        Poly {
            coeffs: self.coeffs.iter().map(|&c| ModQ::neg(c, self.q)).collect(),
            q: self.q,
            is_ntt: self.is_ntt,
        }
    }
}

impl Add for Poly {
    type Output = Poly;
    fn add(self, rhs: Self) -> Poly {
        &self + &rhs
    }
}

impl Sub for Poly {
    type Output = Poly;
    fn sub(self, rhs: Self) -> Poly {
        &self - &rhs
    }
}

impl Neg for Poly {
    type Output = Poly;
    fn neg(self) -> Poly {
        -&self
    }
}

impl AddAssign<&Poly> for Poly {
    fn add_assign(&mut self, rhs: &Poly) {
        assert_eq!(self.q, rhs.q, "moduli must match");
        assert_eq!(self.is_ntt, rhs.is_ntt, "domains must match");
        for (a, &b) in self.coeffs.iter_mut().zip(rhs.coeffs.iter()) {
            *a = ModQ::add(*a, b, self.q);
        }
    }
}

impl SubAssign<&Poly> for Poly {
    fn sub_assign(&mut self, rhs: &Poly) {
        assert_eq!(self.q, rhs.q, "moduli must match");
        assert_eq!(self.is_ntt, rhs.is_ntt, "domains must match");
        for (a, &b) in self.coeffs.iter_mut().zip(rhs.coeffs.iter()) {
            *a = ModQ::sub(*a, b, self.q);
        }
    }
}
