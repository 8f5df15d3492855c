//! Leaf key generation.
//!
//! A keypair binds a leaf slot to its owner: the public half is the pair of
//! vectors written into the tree, the secret half is the exact width-m2
//! binary gadget decomposition of that pair. Because `G · G⁻¹(v) = v` holds
//! exactly, the compressed leaf value equals `B · sk`, which is what lets
//! decryption peel the leaf layer with the secret key alone.

use rand::Rng;

use crate::gadget;
use crate::math::{GaussianSampler, Poly};
use crate::matrix::Vector;
use crate::params::LeParams;

/// Keypair for one server element.
#[derive(Clone, Debug)]
pub struct LeKeyPair {
    /// Public key: the pair of coefficient-form vectors stored at the leaf.
    pub public: (Vector, Vector),
    /// Secret key: binary decomposition of the pair, width m2, NTT form.
    pub secret: Vector,
}

/// Samples a keypair: uniform binary seed, small Gaussian error folded into
/// the published pair, secret re-derived as the pair's decomposition.
pub fn keygen<R: Rng>(
    params: &LeParams,
    rng: &mut R,
    sampler: &mut GaussianSampler,
) -> LeKeyPair {
    let half = |rng: &mut R, sampler: &mut GaussianSampler| -> Vector {
        let bits: Vec<Poly> = (0..params.m)
            .map(|_| Poly::random_binary(params.d, params.q, rng))
            .collect();
        let seeded = gadget::recompose(&bits, params.q_bits, params.q);
        let noise = Vector::noise(params.n, params.d, params.q, sampler);
        seeded.add(&noise)
    };

    let pk0 = half(rng, sampler);
    let pk1 = half(rng, sampler);

    let mut sk_bits = gadget::decompose_bits(&pk0, params.q_bits);
    sk_bits.extend(gadget::decompose_bits(&pk1, params.q_bits));
    for p in &mut sk_bits {
        p.to_ntt(&params.ctx);
    }

    LeKeyPair {
        public: (pk0, pk1),
        secret: Vector::from_polys(sk_bits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_secret_recomposes_to_public() {
        let params = LeParams::setup(2).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let mut sampler = GaussianSampler::with_seed(params.sigma, params.bound, 32);

        let kp = keygen(&params, &mut rng, &mut sampler);
        assert_eq!(kp.secret.len(), params.m2);

        let sk_coeff = kp.secret.from_ntt_new(&params.ctx);
        let first = gadget::recompose(&sk_coeff.elements()[..params.m], params.q_bits, params.q);
        let second = gadget::recompose(&sk_coeff.elements()[params.m..], params.q_bits, params.q);
        assert_eq!(first, kp.public.0);
        assert_eq!(second, kp.public.1);
    }

    #[test]
    fn test_keypairs_are_independent() {
        let params = LeParams::setup(2).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(33);
        let mut sampler = GaussianSampler::with_seed(params.sigma, params.bound, 34);

        let a = keygen(&params, &mut rng, &mut sampler);
        let b = keygen(&params, &mut rng, &mut sampler);
        assert_ne!(a.public.0, b.public.0);
        assert_ne!(a.secret, b.secret);
    }

    #[test]
    fn test_keygen_deterministic_under_seed() {
        let params = LeParams::setup(2).unwrap();
        let gen = || {
            let mut rng = ChaCha20Rng::seed_from_u64(35);
            let mut sampler = GaussianSampler::with_seed(params.sigma, params.bound, 36);
            keygen(&params, &mut rng, &mut sampler)
        };
        let a = gen();
        let b = gen();
        assert_eq!(a.public.0, b.public.0);
        assert_eq!(a.public.1, b.public.1);
        assert_eq!(a.secret, b.secret);
    }
}
