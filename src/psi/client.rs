//! Client-side encryption.
//!
//! The client never sees the tree: it encrypts each of its fingerprints to
//! the fingerprint's tree index under the server's digest and message.
//! Encryption is embarrassingly parallel; every rayon worker owns its own
//! PRNG and Gaussian sampler, because a shared sampler serializes the whole
//! batch.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use crate::le::{enc, Ciphertext, EncRandomness};
use crate::math::{GaussianSampler, Poly};
use crate::matrix::Vector;
use crate::params::LeParams;

use super::reduce_to_tree_index;

/// Everything a client needs from the server: parameters, digest (NTT form)
/// and the server's message polynomial (coefficient form).
#[derive(Clone)]
pub struct PublicView {
    pub params: LeParams,
    pub digest: Vector,
    pub message: Poly,
}

/// Encrypts a batch of client fingerprints, one ciphertext per fingerprint,
/// in input order. Parallel internally; randomness is drawn from OS
/// entropy per worker.
pub fn client_encrypt(fingerprints: &[u64], view: &PublicView) -> Vec<Ciphertext> {
    let params = &view.params;
    fingerprints
        .par_iter()
        .map_init(
            || {
                (
                    ChaCha20Rng::from_entropy(),
                    GaussianSampler::new(params.sigma, params.bound),
                )
            },
            |(rng, sampler), &fp| encrypt_one(fp, view, rng, sampler),
        )
        .collect()
}

/// Deterministic variant: per-element randomness is derived from the master
/// seed and the element position, so the batch is reproducible regardless
/// of how rayon schedules it.
pub fn client_encrypt_seeded(fingerprints: &[u64], view: &PublicView, seed: u64) -> Vec<Ciphertext> {
    let params = &view.params;
    fingerprints
        .par_iter()
        .enumerate()
        .map(|(i, &fp)| {
            let lane = seed.wrapping_add((i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
            let mut rng = ChaCha20Rng::seed_from_u64(lane);
            let mut sampler = GaussianSampler::with_seed(params.sigma, params.bound, lane ^ 1);
            encrypt_one(fp, view, &mut rng, &mut sampler)
        })
        .collect()
}

fn encrypt_one<R: Rng>(
    fingerprint: u64,
    view: &PublicView,
    rng: &mut R,
    sampler: &mut GaussianSampler,
) -> Ciphertext {
    let params = &view.params;
    let index = reduce_to_tree_index(fingerprint, params.layers);
    let rand = EncRandomness::sample(params, rng, sampler);
    enc(params, &view.digest, index, &view.message, &rand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LeParams;
    use rand::SeedableRng;

    fn dummy_view() -> PublicView {
        let params = LeParams::setup(1).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(41);
        let digest = Vector::random(params.n, params.d, params.q, &mut rng)
            .to_ntt_new(&params.ctx);
        let message = Poly::random_binary(params.d, params.q, &mut rng);
        PublicView {
            params,
            digest,
            message,
        }
    }

    #[test]
    fn test_one_ciphertext_per_fingerprint() {
        let view = dummy_view();
        let cts = client_encrypt(&[3, 900, 17], &view);
        assert_eq!(cts.len(), 3);
        for ct in &cts {
            assert_eq!(ct.c0.len(), view.params.layers + 1);
        }
    }

    #[test]
    fn test_empty_batch() {
        let view = dummy_view();
        assert!(client_encrypt(&[], &view).is_empty());
    }

    #[test]
    fn test_seeded_batches_are_reproducible() {
        let view = dummy_view();
        let a = client_encrypt_seeded(&[10, 20], &view, 777);
        let b = client_encrypt_seeded(&[10, 20], &view, 777);
        assert_eq!(a[0].c, b[0].c);
        assert_eq!(a[0].d, b[0].d);
        assert_eq!(a[1].c0, b[1].c0);
    }

    #[test]
    fn test_seeded_elements_differ() {
        let view = dummy_view();
        // Same fingerprint twice: distinct per-element lanes must give
        // distinct ciphertexts.
        let cts = client_encrypt_seeded(&[42, 42], &view, 9);
        assert_ne!(cts[0].c, cts[1].c);
    }
}
