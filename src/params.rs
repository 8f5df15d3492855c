//! Laconic Encryption parameter derivation.
//!
//! Fixes the Ring-LWE parameter set (128-bit security at d = 256,
//! q ≈ 2^58), derives the witness-tree depth from the expected dataset
//! size, and materializes the shared public matrices A0, A1, B, G in NTT
//! form from a fixed PRNG seed so that setup is deterministic.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::info;

use crate::error::{PsiError, Result};
use crate::gadget;
use crate::math::{NttContext, DEFAULT_Q, DEFAULT_Q_BITS};
use crate::matrix::Matrix;

/// Ring dimensions the NTT kernels are validated for.
pub const SUPPORTED_RING_DIMS: [usize; 4] = [256, 512, 1024, 2048];

/// Default ring dimension (128-bit security).
pub const DEFAULT_D: usize = 256;

/// Default matrix dimension.
pub const DEFAULT_N: usize = 4;

/// Slot expansion factor: the tree carries 16 slots per expected element,
/// which keeps the balls-into-bins collision probability below 10^-4 for
/// datasets up to 10k elements.
pub const EXPANSION_FACTOR: f64 = 16.0;

/// Default Gaussian standard deviation.
pub const DEFAULT_SIGMA: f64 = 3.2;

/// Default Gaussian cut-off (6σ).
pub const DEFAULT_BOUND: u64 = 19;

/// Seed for the shared public matrices. Both parties must derive identical
/// A0, A1, B, so this is a protocol constant, not configuration.
const MATRIX_SEED: u64 = 0x4c45_5053_495f_3538;

/// Immutable Laconic Encryption parameters.
///
/// Holds the ring description, the derived widths `m = n·qBits` and
/// `m2 = 2m`, the witness-tree depth, and the four public matrices in NTT
/// form. Constructed once by [`LeParams::setup`] and shared by reference.
#[derive(Clone, Debug)]
pub struct LeParams {
    /// Modulus (~2^58).
    pub q: u64,
    /// ⌈log₂ q⌉.
    pub q_bits: usize,
    /// Ring dimension (power of two).
    pub d: usize,
    /// Matrix dimension.
    pub n: usize,
    /// Gadget-expanded width n·qBits.
    pub m: usize,
    /// Leaf-layer width 2m (a leaf holds a pair of vectors).
    pub m2: usize,
    /// Depth of the binary witness tree.
    pub layers: usize,
    /// Gaussian noise standard deviation.
    pub sigma: f64,
    /// Gaussian cut-off bound.
    pub bound: u64,
    /// Shared NTT context for this (d, q).
    pub ctx: NttContext,
    /// Tree-hash matrix for left children, n × m, NTT form.
    pub a0: Matrix,
    /// Tree-hash matrix for right children, n × m, NTT form.
    pub a1: Matrix,
    /// Leaf compression matrix, n × m2, NTT form.
    pub b: Matrix,
    /// Gadget matrix, n × m, NTT form. Kept materialized for the public
    /// parameter wire; arithmetic uses the direct gadget routines.
    pub g: Matrix,
}

impl LeParams {
    /// Derives parameters for an expected server set of `size` elements
    /// using the default 128-bit parameter set.
    ///
    /// Deterministic: two calls with the same `size` produce byte-identical
    /// matrices.
    pub fn setup(size: usize) -> Result<Self> {
        let layers = tree_layers(size)?;
        Self::with_layers(DEFAULT_Q, DEFAULT_Q_BITS, DEFAULT_D, DEFAULT_N, layers)
    }

    /// Builds a parameter set with an explicit layer count, sampling the
    /// public matrices from the protocol seed.
    pub fn with_layers(q: u64, q_bits: usize, d: usize, n: usize, layers: usize) -> Result<Self> {
        validate(q, q_bits, d, n, layers)?;

        let ctx = NttContext::new(d, q);
        let m = n * q_bits;
        let m2 = 2 * m;

        let mut rng = ChaCha20Rng::seed_from_u64(MATRIX_SEED);
        let mut a0 = Matrix::random(n, m, d, q, &mut rng);
        let mut a1 = Matrix::random(n, m, d, q, &mut rng);
        let mut b = Matrix::random(n, m2, d, q, &mut rng);
        a0.to_ntt(&ctx);
        a1.to_ntt(&ctx);
        b.to_ntt(&ctx);
        let mut g = gadget::gadget_matrix(n, q_bits, d, q);
        g.to_ntt(&ctx);

        let num_slots = 1u64 << layers;
        info!(
            q,
            d,
            n,
            q_bits,
            layers,
            num_slots,
            "laconic encryption parameters initialized"
        );

        Ok(Self {
            q,
            q_bits,
            d,
            n,
            m,
            m2,
            layers,
            sigma: DEFAULT_SIGMA,
            bound: DEFAULT_BOUND,
            ctx,
            a0,
            a1,
            b,
            g,
        })
    }

    /// Rebuilds a parameter set from deserialized matrices. The caller (the
    /// wire layer) has already shape-checked every component.
    pub fn from_parts(
        q: u64,
        q_bits: usize,
        d: usize,
        n: usize,
        layers: usize,
        a0: Matrix,
        a1: Matrix,
        b: Matrix,
        g: Matrix,
    ) -> Result<Self> {
        validate(q, q_bits, d, n, layers)?;
        Ok(Self {
            q,
            q_bits,
            d,
            n,
            m: n * q_bits,
            m2: 2 * n * q_bits,
            layers,
            sigma: DEFAULT_SIGMA,
            bound: DEFAULT_BOUND,
            ctx: NttContext::new(d, q),
            a0,
            a1,
            b,
            g,
        })
    }

    /// Number of leaf slots in the witness tree.
    pub fn num_slots(&self) -> u64 {
        1u64 << self.layers
    }
}

/// Tree depth for a dataset: ⌈log₂(16·size)⌉, capped at 63.
pub fn tree_layers(size: usize) -> Result<usize> {
    if size == 0 {
        return Err(PsiError::Config("dataset size must be positive".into()));
    }
    let layers = (EXPANSION_FACTOR * size as f64).log2().ceil() as usize;
    if layers > 63 {
        return Err(PsiError::Config(format!(
            "{size} elements need {layers} tree layers, exceeding the 63-layer limit"
        )));
    }
    Ok(layers)
}

/// Balls-into-bins estimate that some two of `size` elements share one of
/// `slots` leaf slots: 1 − exp(−size²/(2·slots)).
///
/// Logged at setup for operator visibility; nothing branches on it. The
/// whole-set estimate is meaningful for small sets and saturates to 1.0
/// (exactly, in f64) once size² dominates the slot count. The quantity the
/// 16× slot expansion actually budgets is the per-pair rate `1/slots`,
/// about 4·10⁻⁶ at the 10k reference size.
pub fn collision_probability(size: usize, slots: u64) -> f64 {
    let m = size as f64;
    let n = slots as f64;
    1.0 - (-(m * m) / (2.0 * n)).exp()
}

fn validate(q: u64, q_bits: usize, d: usize, n: usize, layers: usize) -> Result<()> {
    if !SUPPORTED_RING_DIMS.contains(&d) {
        return Err(PsiError::Config(format!(
            "unsupported ring dimension {d}; supported: 256, 512, 1024, 2048"
        )));
    }
    if q % (2 * d as u64) != 1 {
        return Err(PsiError::Config(format!(
            "modulus {q} is not NTT-compatible with dimension {d} (q must be 1 mod 2d)"
        )));
    }
    if q_bits != 64 - q.leading_zeros() as usize {
        return Err(PsiError::Config(format!(
            "q_bits {q_bits} does not match modulus bit length"
        )));
    }
    if n == 0 {
        return Err(PsiError::Config("matrix dimension must be positive".into()));
    }
    if layers == 0 || layers > 63 {
        return Err(PsiError::Config(format!(
            "tree depth {layers} out of range [1, 63]"
        )));
    }
    Ok(())
}
