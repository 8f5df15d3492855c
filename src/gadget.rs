//! Base-2 gadget decomposition.
//!
//! The gadget matrix G expands a width-n vector into n·qBits binary
//! polynomials: bit k of coefficient j of element i lands in coefficient j
//! of output polynomial `i·qBits + k`, so `G · G⁻¹(v) = v` exactly for any
//! reduced v (q < 2^qBits). The decomposition runs once per witness per
//! layer and dominates allocation, so the bit extraction loop is inlined
//! over whole coefficient rows rather than delegated per coefficient.

use crate::math::{ModQ, NttContext, Poly};
use crate::matrix::{Matrix, Vector};

/// `G⁻¹(v)`: binary decomposition of a coefficient-form vector into
/// `v.len()·q_bits` polynomials with 0/1 coefficients, coefficient form.
pub fn decompose_bits(v: &Vector, q_bits: usize) -> Vec<Poly> {
    let mut out = Vec::with_capacity(v.len() * q_bits);
    for elem in v.elements() {
        assert!(!elem.is_ntt(), "gadget decomposition reads coefficients");
        let d = elem.dimension();
        let q = elem.modulus();
        for k in 0..q_bits {
            let mut bits = vec![0u64; d];
            let raw = elem.raw();
            for j in 0..d {
                bits[j] = (raw[j] >> k) & 1;
            }
            out.push(Poly::from_coeffs(bits, q));
        }
    }
    out
}

/// `G⁻¹(v)` transformed to NTT form, ready for matrix products.
pub fn decompose(v: &Vector, q_bits: usize, ctx: &NttContext) -> Vector {
    let mut polys = decompose_bits(v, q_bits);
    for p in &mut polys {
        p.to_ntt(ctx);
    }
    Vector::from_polys(polys)
}

/// `G · w`: recompose binary polynomials back into a width-`len/q_bits`
/// vector, coefficient form. Inverse of [`decompose_bits`].
pub fn recompose(bits: &[Poly], q_bits: usize, q: u64) -> Vector {
    assert_eq!(bits.len() % q_bits, 0, "bit count must be a q_bits multiple");
    let n = bits.len() / q_bits;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let d = bits[i * q_bits].dimension();
        let mut acc = vec![0u64; d];
        for k in 0..q_bits {
            let p = &bits[i * q_bits + k];
            assert!(!p.is_ntt(), "gadget recomposition reads coefficients");
            let raw = p.raw();
            let pow = (1u64 << k) % q;
            for j in 0..d {
                acc[j] = ModQ::add(acc[j], ModQ::mul(raw[j], pow, q), q);
            }
        }
        out.push(Poly::from_coeffs(acc, q));
    }
    Vector::from_polys(out)
}

/// `Gᵀ · s` for an NTT-form vector s: output polynomial `i·q_bits + k` is
/// `2^k · sᵢ`. Plain scalar multiplication is Montgomery-compatible, so no
/// transform is needed.
pub fn gadget_transpose_mul(s: &Vector, q_bits: usize) -> Vector {
    let mut out = Vec::with_capacity(s.len() * q_bits);
    for elem in s.elements() {
        assert!(elem.is_ntt(), "gadget transpose expects NTT form");
        for k in 0..q_bits {
            out.push(elem.scalar_mul(1u64 << k));
        }
    }
    Vector::from_polys(out)
}

/// The gadget matrix itself: n × n·q_bits with constant polynomials 2^k on
/// the block diagonal. Materialized only for the public-parameter wire; the
/// arithmetic paths use the direct routines above.
pub fn gadget_matrix(n: usize, q_bits: usize, dim: usize, q: u64) -> Matrix {
    let mut m = Matrix::zero(n, n * q_bits, dim, q);
    for i in 0..n {
        for k in 0..q_bits {
            let mut coeffs = vec![0u64; dim];
            coeffs[0] = (1u64 << k) % q;
            *m.get_mut(i, i * q_bits + k) = Poly::from_coeffs(coeffs, q);
        }
    }
    m
}
