//! PSI orchestration over the Laconic Encryption core.
//!
//! The server commits its fingerprint set into the witness tree and keeps
//! one keypair plus witness chains per element; the client encrypts each of
//! its fingerprints to the matching tree index under the published digest;
//! the detection engine decrypts every (ciphertext, element) pair and
//! collects the elements whose decryptions pass the threshold check.

pub mod client;
pub mod monitor;
pub mod server;
pub mod wire;
pub mod workers;

pub use client::{client_encrypt, client_encrypt_seeded, PublicView};
pub use monitor::{measure_noise_level, MonitorSnapshot, PerformanceMonitor};
pub use server::{
    detect, detect_with_cancel, public_parameters, server_init, server_init_with_config,
    teardown, MemoryUsage, ServerConfig, ServerContext,
};
pub use wire::PublicParameters;
pub use workers::{workers, WorkerConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::OnceLock;

use tracing::trace;

use crate::math::Poly;

/// Reduces a 64-bit fingerprint to its tree index: the low `layers` bits.
pub fn reduce_to_tree_index(fingerprint: u64, layers: usize) -> u64 {
    if layers == 0 || layers >= 64 {
        return fingerprint;
    }
    fingerprint & ((1u64 << layers) - 1)
}

/// Fraction of coefficients that must survive rounding for a decryption to
/// count as a match. Empirical for the reference parameter set; implementers
/// moving to deeper trees must re-derive it.
pub const MATCH_THRESHOLD: f64 = 0.95;

/// Threshold equality of a decrypted polynomial against the server message.
///
/// A coefficient decodes to 1 iff it lies in the open interval (q/4, 3q/4).
/// The decryption matches when at least 95% of the rounded coefficients
/// agree with the message bits; the margin absorbs the Gaussian noise
/// accumulated over the hash-chain peels.
pub fn correctness_check(decrypted: &Poly, original: &Poly, q: u64) -> bool {
    let q14 = q / 4;
    let q34 = (q / 4) * 3;
    let d = original.dimension();

    let mut matches = 0usize;
    for i in 0..d {
        let c = decrypted.coeff(i);
        let bit = u64::from(c > q14 && c < q34);
        if bit == original.coeff(i) {
            matches += 1;
        }
    }

    let rate = matches as f64 / d as f64;
    if verbose_decryption_logs() {
        trace!(rate, matches, coefficients = d, "decryption match rate");
    }
    rate >= MATCH_THRESHOLD
}

/// Per-ciphertext decryption logs are on unless `PSI_VERBOSE=false`.
fn verbose_decryption_logs() -> bool {
    static VERBOSE: OnceLock<bool> = OnceLock::new();
    *VERBOSE.get_or_init(|| std::env::var("PSI_VERBOSE").map_or(true, |v| v != "false"))
}

/// Caller-supplied cancellation handle for the detection engine. Workers
/// observe it between work items, never mid-decryption.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; already-dispatched items drain.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DEFAULT_Q;

    #[test]
    fn test_reduce_masks_low_bits() {
        assert_eq!(reduce_to_tree_index(0b1011_0110, 4), 0b0110);
        assert_eq!(reduce_to_tree_index(u64::MAX, 10), 1023);
        assert_eq!(reduce_to_tree_index(12345, 0), 12345);
        assert_eq!(reduce_to_tree_index(12345, 64), 12345);
    }

    #[test]
    fn test_correctness_check_exact_match() {
        let q = DEFAULT_Q;
        let msg = Poly::from_coeffs(vec![1, 0, 1, 0], q);
        // Encode each bit at the ideal points: q/2 for 1, 0 for 0.
        let dec = Poly::from_coeffs(vec![q / 2, 0, q / 2, 0], q);
        assert!(correctness_check(&dec, &msg, q));
    }

    #[test]
    fn test_correctness_check_interval_is_open() {
        let q = DEFAULT_Q;
        let one = Poly::from_coeffs(vec![1], q);
        // Exactly q/4 rounds to 0, just above rounds to 1.
        assert!(!correctness_check(&Poly::from_coeffs(vec![q / 4], q), &one, q));
        assert!(correctness_check(
            &Poly::from_coeffs(vec![q / 4 + 1], q),
            &one,
            q
        ));
        // 3·(q/4) is excluded as well.
        assert!(!correctness_check(
            &Poly::from_coeffs(vec![(q / 4) * 3], q),
            &one,
            q
        ));
    }

    #[test]
    fn test_correctness_check_threshold_boundary() {
        let q = DEFAULT_Q;
        let d = 256;
        let msg = Poly::from_coeffs(vec![1u64; d], q);

        // 13 corrupted of 256 → 94.9% match: below threshold.
        let mut coeffs = vec![q / 2; d];
        for c in coeffs.iter_mut().take(13) {
            *c = 0;
        }
        assert!(!correctness_check(&Poly::from_coeffs(coeffs, q), &msg, q));

        // 12 corrupted of 256 → 95.3%: above threshold.
        let mut coeffs = vec![q / 2; d];
        for c in coeffs.iter_mut().take(12) {
            *c = 0;
        }
        assert!(correctness_check(&Poly::from_coeffs(coeffs, q), &msg, q));
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
