//! Modular arithmetic over Z_q.
//!
//! Stateless helpers for single-modulus arithmetic. The hot paths (NTT
//! butterflies, pointwise products) use the Montgomery routines inside
//! [`super::ntt::NttContext`]; everything else goes through these.

/// Default modulus q = 180143985094819841 (~2^58, NTT-friendly prime).
///
/// Satisfies q ≡ 1 (mod 2d) for every supported ring dimension d up to 2048,
/// so a primitive 2d-th root of unity exists for the negacyclic NTT.
pub const DEFAULT_Q: u64 = 180143985094819841;

/// Bit length of the default modulus: ⌈log₂ q⌉.
pub const DEFAULT_Q_BITS: usize = 58;

/// Stateless modular arithmetic over Z_q.
pub struct ModQ;

impl ModQ {
    /// `(a + b) mod q` for reduced operands.
    #[inline]
    pub fn add(a: u64, b: u64, q: u64) -> u64 {
        let sum = a + b;
        if sum >= q {
            sum - q
        } else {
            sum
        }
    }

    /// `(a - b) mod q` for reduced operands.
    #[inline]
    pub fn sub(a: u64, b: u64, q: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            q - (b - a)
        }
    }

    /// `(a * b) mod q`.
    #[inline]
    pub fn mul(a: u64, b: u64, q: u64) -> u64 {
        ((a as u128 * b as u128) % q as u128) as u64
    }

    /// `(-a) mod q` for a reduced operand.
    #[inline]
    pub fn neg(a: u64, q: u64) -> u64 {
        if a == 0 {
            0
        } else {
            q - a
        }
    }

    /// Maps a signed integer into [0, q).
    #[inline]
    pub fn from_signed(a: i64, q: u64) -> u64 {
        if a >= 0 {
            (a as u64) % q
        } else {
            let r = ((-a) as u64) % q;
            if r == 0 {
                0
            } else {
                q - r
            }
        }
    }

    /// Centered representative of `a` in (-q/2, q/2].
    #[inline]
    pub fn to_signed(a: u64, q: u64) -> i64 {
        if a <= q / 2 {
            a as i64
        } else {
            a as i64 - q as i64
        }
    }

    /// `base^exp mod q` by square-and-multiply.
    pub fn pow(mut base: u64, mut exp: u64, q: u64) -> u64 {
        let mut result = 1u64;
        base %= q;
        while exp > 0 {
            if exp & 1 == 1 {
                result = Self::mul(result, base, q);
            }
            exp >>= 1;
            base = Self::mul(base, base, q);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_q_ntt_friendly() {
        for d in [256u64, 512, 1024, 2048] {
            assert_eq!(DEFAULT_Q % (2 * d), 1, "q must be 1 mod 2d for d={d}");
        }
    }

    #[test]
    fn test_q_bits_matches_modulus() {
        assert_eq!(64 - DEFAULT_Q.leading_zeros() as usize, DEFAULT_Q_BITS);
        assert!(DEFAULT_Q < 1u64 << DEFAULT_Q_BITS);
    }

    #[test]
    fn test_add_sub_roundtrip() {
        let q = DEFAULT_Q;
        let a = q - 5;
        let b = 17;
        assert_eq!(ModQ::sub(ModQ::add(a, b, q), b, q), a);
    }

    #[test]
    fn test_from_signed() {
        let q = DEFAULT_Q;
        assert_eq!(ModQ::from_signed(42, q), 42);
        assert_eq!(ModQ::from_signed(-1, q), q - 1);
        assert_eq!(ModQ::from_signed(0, q), 0);
        assert_eq!(ModQ::to_signed(q - 3, q), -3);
    }

    #[test]
    fn test_pow_fermat() {
        // q is prime, so a^(q-1) = 1
        assert_eq!(ModQ::pow(3, DEFAULT_Q - 1, DEFAULT_Q), 1);
    }
}
