//! Keyed pseudorandom map from indices to bounded integers.
//!
//! Encoder, prover, and verifier all derive their per-index field elements
//! from this map, so its output must be identical across parties down to the
//! last bit: the index is hashed as a big-endian u32, the digest is padded to
//! the minimum encoded size of the limit, and the result is encrypted with
//! AES-256-CFB under a fixed all-zero IV. Rejection sampling with a masked
//! top byte keeps the output below the limit without bias.

use aes::cipher::KeyIvInit;
use aes::Aes256;
use cfb_mode::BufEncryptor;
use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::{IV_SIZE, KEY_SIZE, PRF_MAX_ITERATIONS};

type KeystreamCipher = BufEncryptor<Aes256>;

/// Deterministic map `index -> integer in [0, limit)` under a 32-byte key.
///
/// Stateless across calls: the cipher is re-synchronized on every
/// evaluation, so the output depends only on `(key, limit, index)`.
#[derive(Clone)]
pub struct Prf {
    key: Zeroizing<[u8; KEY_SIZE]>,
    limit: BigUint,
    limit_len: usize,
    msb_mask: u8,
}

impl Prf {
    /// Build a PRF bounded by `limit`.
    ///
    /// Keys shorter than 32 bytes are zero-extended to the AES-256 key size;
    /// generated keys are always exactly 32 bytes.
    pub fn new(key: &[u8], limit: BigUint) -> Self {
        let mut k = Zeroizing::new([0u8; KEY_SIZE]);
        let n = key.len().min(KEY_SIZE);
        k[..n].copy_from_slice(&key[..n]);

        let limit_len = limit.bits().div_ceil(8) as usize;
        let msb_mask = if limit_len == 0 {
            0
        } else {
            // (1 << (8 - leading_zeros)) - 1, written as a shift of 0xff
            0xffu8 >> limit.to_bytes_be()[0].leading_zeros()
        };

        Self {
            key: k,
            limit,
            limit_len,
            msb_mask,
        }
    }

    pub fn limit(&self) -> &BigUint {
        &self.limit
    }

    /// Evaluate the PRF at `i`. Deterministic, and always below the limit.
    pub fn evaluate(&self, i: u32) -> BigUint {
        if self.limit_len == 0 {
            return BigUint::zero();
        }

        let iv = [0u8; IV_SIZE];
        let mut cipher = KeystreamCipher::new((&*self.key).into(), (&iv).into());

        let digest = Sha256::digest(i.to_be_bytes());
        let digest = digest.as_slice();
        let head = self.limit_len.min(digest.len());

        let mut buf = vec![0u8; self.limit_len];
        let mut sample = BigUint::zero();
        for _ in 0..PRF_MAX_ITERATIONS {
            buf[..head].copy_from_slice(&digest[..head]);
            for b in buf[head..].iter_mut() {
                *b = 0;
            }
            // The keystream advances across attempts; only the first block
            // of each call is derived from the fixed IV.
            cipher.encrypt(&mut buf);
            buf[0] &= self.msb_mask;
            sample = BigUint::from_bytes_be(&buf);
            if sample < self.limit {
                return sample;
            }
        }

        // Rejection exhausted (~2^-80 per call); reduce as a last resort so
        // the contract `evaluate(i) < limit` still holds.
        sample % &self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn test_key(fill: u8) -> [u8; KEY_SIZE] {
        [fill; KEY_SIZE]
    }

    #[test]
    fn evaluation_is_deterministic() {
        let limit = BigUint::from(1_000_000_007u64);
        let prf = Prf::new(&test_key(0x11), limit.clone());
        let again = Prf::new(&test_key(0x11), limit);

        for i in 0..64 {
            assert_eq!(prf.evaluate(i), again.evaluate(i));
        }
    }

    #[test]
    fn outputs_stay_below_limit() {
        let mut rng = StdRng::seed_from_u64(crate::config::TEST_RANDOM_SEED);
        let mut key = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut key);

        for limit in [
            BigUint::from(1u32),
            BigUint::from(2u32),
            BigUint::from(255u32),
            BigUint::from(256u32),
            BigUint::from(1u64 << 40),
            BigUint::from_bytes_be(&[0x80; 32]),
        ] {
            let prf = Prf::new(&key, limit.clone());
            for i in 0..256 {
                assert!(prf.evaluate(i) < limit, "limit {limit} index {i}");
            }
        }
    }

    #[test]
    fn limit_one_always_maps_to_zero() {
        let prf = Prf::new(&test_key(0x42), BigUint::from(1u32));
        for i in 0..32 {
            assert!(prf.evaluate(i).is_zero());
        }
    }

    #[test]
    fn different_keys_diverge() {
        let limit = BigUint::from(u64::MAX);
        let a = Prf::new(&test_key(0xaa), limit.clone());
        let b = Prf::new(&test_key(0xbb), limit);

        let disagreements = (0..32).filter(|&i| a.evaluate(i) != b.evaluate(i)).count();
        assert!(disagreements >= 30);
    }

    #[test]
    fn different_indices_diverge() {
        let prf = Prf::new(&test_key(0x07), BigUint::from_bytes_be(&[0xff; 16]));
        let first = prf.evaluate(0);
        let disagreements = (1..32).filter(|&i| prf.evaluate(i) != first).count();
        assert_eq!(disagreements, 31);
    }

    #[test]
    fn zero_limit_is_inert() {
        // Never evaluated in a real ceremony (an empty file yields l = 0),
        // but construction must not panic.
        let prf = Prf::new(&test_key(0x00), BigUint::zero());
        assert!(prf.evaluate(0).is_zero());
    }

    #[test]
    fn short_keys_are_zero_extended() {
        let limit = BigUint::from(1u64 << 32);
        let short = Prf::new(&[0xcc; 16], limit.clone());
        let mut padded = [0u8; KEY_SIZE];
        padded[..16].copy_from_slice(&[0xcc; 16]);
        let long = Prf::new(&padded, limit);

        for i in 0..16 {
            assert_eq!(short.evaluate(i), long.evaluate(i));
        }
    }
}
