//! Mathematical primitives for the lattice PSI core.
//!
//! - **Modular arithmetic** over Z_q (single 58-bit NTT-friendly prime)
//! - **Negacyclic NTT** with Montgomery reduction for O(d log d) products
//! - **Polynomials** over R_q = Z_q[X]/(X^d + 1) with explicit domain tracking
//! - **Discrete Gaussian sampling** for error terms, one sampler per worker

pub mod mod_q;
pub mod ntt;
pub mod poly;
pub mod sampler;

pub use mod_q::{ModQ, DEFAULT_Q, DEFAULT_Q_BITS};
pub use ntt::NttContext;
pub use poly::Poly;
pub use sampler::GaussianSampler;
