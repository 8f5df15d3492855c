//! Encryption to a leaf index and witness-chain decryption.
//!
//! The encryptor knows only the digest. It draws one chain secret per tree
//! layer and publishes masked transfers `c0[ℓ]`, `c1[ℓ]`; the transfer on
//! the path side additionally embeds `Gᵀ·s_{ℓ+1}`, handing the next
//! layer's secret to whoever can supply the right child decompositions.
//! The digest layer is tied off by `c` and the message rides on `d`.
//!
//! Decryption seeds the chain from `c`, peels one layer per witness entry,
//! and closes with `⟨c0[Layers], sk⟩`: the compressed leaf equals `B·sk`,
//! so for the committed index everything telescopes to `d` plus bounded
//! noise. For any other index the chain collapses to uniform junk, which
//! the 95% threshold rejects.

use serde::{Deserialize, Serialize};

use crate::error::{PsiError, Result};
use crate::gadget;
use crate::math::{GaussianSampler, Poly};
use crate::matrix::Vector;
use crate::params::LeParams;
use rand::Rng;

/// Ciphertext targeting one leaf index. All components in NTT form.
///
/// `c0` and `c1` carry `Layers + 1` entries: per-layer transfers of width m
/// and, at index `Layers`, the leaf-layer entry of width m2 (`c0`) and its
/// width-m companion (`c1`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ciphertext {
    pub c0: Vec<Vector>,
    pub c1: Vec<Vector>,
    /// Digest tie-off: `digest ⊙ r[Layers] + e_c`.
    pub c: Vector,
    /// Message carrier: `msg·⌊q/2⌋ + e_d`.
    pub d: Poly,
}

impl Ciphertext {
    /// Compact binary encoding for shipping ciphertext batches.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| PsiError::Serialization(e.to_string()))
    }

    /// Decodes a ciphertext produced by [`Ciphertext::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| PsiError::Serialization(e.to_string()))
    }
}

/// Explicit randomness for one encryption, so `enc` itself is a
/// deterministic function. `r[Layers]` masks the digest layer and `r[0]`
/// the leaf layer; `e0[Layers]` is the only width-m2 error vector.
pub struct EncRandomness {
    pub r: Vec<Vector>,
    pub e0: Vec<Vector>,
    pub e1: Vec<Vector>,
    pub e_c: Vector,
    pub e_d: Poly,
}

impl EncRandomness {
    /// Samples encryption randomness: uniform chain secrets, Gaussian
    /// errors, everything pre-transformed to NTT form.
    pub fn sample<R: Rng>(params: &LeParams, rng: &mut R, sampler: &mut GaussianSampler) -> Self {
        let ctx = &params.ctx;
        let (d, q) = (params.d, params.q);
        let layers = params.layers;

        let r: Vec<Vector> = (0..=layers)
            .map(|_| Vector::random(params.n, d, q, rng).to_ntt_new(ctx))
            .collect();
        let e0: Vec<Vector> = (0..=layers)
            .map(|j| {
                let width = if j == layers { params.m2 } else { params.m };
                Vector::noise(width, d, q, sampler).to_ntt_new(ctx)
            })
            .collect();
        let e1: Vec<Vector> = (0..=layers)
            .map(|_| Vector::noise(params.m, d, q, sampler).to_ntt_new(ctx))
            .collect();
        let e_c = Vector::noise(params.n, d, q, sampler).to_ntt_new(ctx);
        let e_d = Poly::sample_gaussian(d, q, sampler).to_ntt_new(ctx);

        Self { r, e0, e1, e_c, e_d }
    }
}

/// Encrypts `msg` to `leaf_index` under the public digest.
///
/// Path bits are consumed most-significant first: the bit selecting the
/// step from layer ℓ to ℓ+1 is bit `Layers−1−ℓ` of the index, so the least
/// significant bit picks the leaf.
pub fn enc(
    params: &LeParams,
    digest: &Vector,
    leaf_index: u64,
    msg: &Poly,
    rand: &EncRandomness,
) -> Ciphertext {
    let ctx = &params.ctx;
    let layers = params.layers;
    debug_assert!(digest.is_ntt(), "digest must be in NTT form");
    debug_assert_eq!(rand.r.len(), layers + 1);

    let mut c0 = Vec::with_capacity(layers + 1);
    let mut c1 = Vec::with_capacity(layers + 1);

    for layer in 0..layers {
        let s = &rand.r[layers - layer];
        let s_next = &rand.r[layers - layer - 1];
        let bit = (leaf_index >> (layers - 1 - layer)) & 1;

        let mut left = params.a0.transpose_mul(s, ctx).add(&rand.e0[layer]);
        let mut right = params.a1.transpose_mul(s, ctx).add(&rand.e1[layer]);

        let embedded = gadget::gadget_transpose_mul(s_next, params.q_bits);
        if bit == 0 {
            left = left.add(&embedded);
        } else {
            right = right.add(&embedded);
        }
        c0.push(left);
        c1.push(right);
    }

    // Leaf layer: width m2 against B, masked by the innermost secret.
    c0.push(params.b.transpose_mul(&rand.r[0], ctx).add(&rand.e0[layers]));
    c1.push(params.a1.transpose_mul(&rand.r[0], ctx).add(&rand.e1[layers]));

    let c = digest.pointwise(&rand.r[layers], ctx).add(&rand.e_c);
    let d = &msg.scalar_mul(params.q / 2).to_ntt_new(ctx) + &rand.e_d;

    Ciphertext { c0, c1, c, d }
}

/// Decrypts with a leaf secret key and its witness chains. Returns the
/// noisy message polynomial in coefficient form; the caller applies the
/// threshold check. Never fails: a wrong key or index yields a polynomial
/// that simply misses the threshold.
pub fn dec(
    params: &LeParams,
    sk: &Vector,
    w1: &[Vector],
    w2: &[Vector],
    ct: &Ciphertext,
) -> Poly {
    let ctx = &params.ctx;
    let layers = params.layers;
    debug_assert_eq!(w1.len(), layers);
    debug_assert_eq!(w2.len(), layers);
    debug_assert_eq!(ct.c0.len(), layers + 1);

    // Chain seed: Σᵢ cᵢ ≈ ⟨digest, r[Layers]⟩.
    let mut chain = ct.c.sum_elements(params.d, params.q);

    for layer in 0..layers {
        let transfer = &ct.c0[layer].inner(&w1[layer], ctx) + &ct.c1[layer].inner(&w2[layer], ctx);
        chain = &transfer - &chain;
    }

    // Leaf closure: compressed leaf = B·sk, so this cancels the last hop.
    let leaf = ct.c0[layers].inner(sk, ctx);
    let noisy = &(&ct.d + &leaf) - &chain;
    noisy.from_ntt_new(ctx)
}
