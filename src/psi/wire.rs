//! Serializable public parameters.
//!
//! The wire form carries flat `u64` coefficient arrays: the digest and the
//! four public matrices exactly as they sit in NTT form, the message
//! polynomial in coefficient form. Round-trips are bit-exact. Ingest
//! validates every shape before a parameter set is rebuilt; nothing is
//! silently patched.

use serde::{Deserialize, Serialize};

use crate::error::{PsiError, Result};
use crate::math::Poly;
use crate::matrix::{Matrix, Vector};
use crate::params::LeParams;

use super::client::PublicView;

/// Wire form of the server's public parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicParameters {
    /// Digest vector, NTT form.
    pub pp: Vec<Vec<u64>>,
    /// Message polynomial, coefficient form.
    pub msg: Vec<u64>,
    pub q: u64,
    pub d: usize,
    pub n: usize,
    pub layers: usize,
    pub m: usize,
    pub m2: usize,
    #[serde(rename = "a0ntt")]
    pub a0_ntt: Vec<Vec<Vec<u64>>>,
    #[serde(rename = "a1ntt")]
    pub a1_ntt: Vec<Vec<Vec<u64>>>,
    #[serde(rename = "bntt")]
    pub b_ntt: Vec<Vec<Vec<u64>>>,
    #[serde(rename = "gntt")]
    pub g_ntt: Vec<Vec<Vec<u64>>>,
}

impl PublicParameters {
    /// Flattens a public view into wire form.
    pub fn from_view(view: &PublicView) -> Self {
        let params = &view.params;
        let flatten = |m: &Matrix| -> Vec<Vec<Vec<u64>>> {
            m.elements()
                .iter()
                .map(|row| row.iter().map(|p| p.raw().to_vec()).collect())
                .collect()
        };
        Self {
            pp: view
                .digest
                .elements()
                .iter()
                .map(|p| p.raw().to_vec())
                .collect(),
            msg: view.message.raw().to_vec(),
            q: params.q,
            d: params.d,
            n: params.n,
            layers: params.layers,
            m: params.m,
            m2: params.m2,
            a0_ntt: flatten(&params.a0),
            a1_ntt: flatten(&params.a1),
            b_ntt: flatten(&params.b),
            g_ntt: flatten(&params.g),
        }
    }

    /// JSON encoding of the parameters.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| PsiError::Serialization(e.to_string()))
    }

    /// Decodes and shape-checks parameters from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let params: Self =
            serde_json::from_slice(bytes).map_err(|e| PsiError::Serialization(e.to_string()))?;
        params.check_shape()?;
        Ok(params)
    }

    /// Rebuilds a usable [`PublicView`] from the wire form.
    pub fn instantiate(&self) -> Result<PublicView> {
        self.check_shape()?;

        let q = self.q;
        let rebuild = |name: &str, flat: &[Vec<Vec<u64>>]| -> Result<Matrix> {
            let mut rows = Vec::with_capacity(flat.len());
            for row in flat {
                let mut polys = Vec::with_capacity(row.len());
                for coeffs in row {
                    if coeffs.iter().any(|&c| c >= q) {
                        return Err(PsiError::Serialization(format!(
                            "{name}: coefficient out of range"
                        )));
                    }
                    polys.push(Poly::from_ntt_coeffs(coeffs.clone(), q));
                }
                rows.push(polys);
            }
            Ok(Matrix::from_elements(rows))
        };

        let a0 = rebuild("a0ntt", &self.a0_ntt)?;
        let a1 = rebuild("a1ntt", &self.a1_ntt)?;
        let b = rebuild("bntt", &self.b_ntt)?;
        let g = rebuild("gntt", &self.g_ntt)?;

        let q_bits = 64 - q.leading_zeros() as usize;
        let params = LeParams::from_parts(q, q_bits, self.d, self.n, self.layers, a0, a1, b, g)?;

        let digest = Vector::from_polys(
            self.pp
                .iter()
                .map(|coeffs| Poly::from_ntt_coeffs(coeffs.clone(), q))
                .collect(),
        );
        let message = Poly::from_coeffs(self.msg.clone(), q);

        Ok(PublicView {
            params,
            digest,
            message,
        })
    }

    fn check_shape(&self) -> Result<()> {
        let q_bits = 64 - self.q.leading_zeros() as usize;
        if self.m != self.n * q_bits {
            return Err(PsiError::Serialization(format!(
                "m = {} does not equal n·qBits = {}",
                self.m,
                self.n * q_bits
            )));
        }
        if self.m2 != 2 * self.m {
            return Err(PsiError::Serialization(format!(
                "m2 = {} does not equal 2m = {}",
                self.m2,
                2 * self.m
            )));
        }

        let check_vec = |name: &str, v: &[Vec<u64>], len: usize| -> Result<()> {
            if v.len() != len {
                return Err(PsiError::Serialization(format!(
                    "{name}: expected {len} elements, found {}",
                    v.len()
                )));
            }
            for coeffs in v {
                if coeffs.len() != self.d {
                    return Err(PsiError::Serialization(format!(
                        "{name}: expected {} coefficients, found {}",
                        self.d,
                        coeffs.len()
                    )));
                }
            }
            Ok(())
        };
        check_vec("pp", &self.pp, self.n)?;
        if self.msg.len() != self.d {
            return Err(PsiError::Serialization(format!(
                "msg: expected {} coefficients, found {}",
                self.d,
                self.msg.len()
            )));
        }

        let check_matrix = |name: &str, m: &[Vec<Vec<u64>>], cols: usize| -> Result<()> {
            if m.len() != self.n {
                return Err(PsiError::Serialization(format!(
                    "{name}: expected {} rows, found {}",
                    self.n,
                    m.len()
                )));
            }
            for row in m {
                check_vec(name, row, cols)?;
            }
            Ok(())
        };
        check_matrix("a0ntt", &self.a0_ntt, self.m)?;
        check_matrix("a1ntt", &self.a1_ntt, self.m)?;
        check_matrix("bntt", &self.b_ntt, self.m2)?;
        check_matrix("gntt", &self.g_ntt, self.m)?;
        Ok(())
    }
}
