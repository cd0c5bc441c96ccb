//! Probable-prime generation for the field modulus.
//!
//! The modulus is generated once at engine setup and trusted thereafter, so
//! generation cost is paid rarely; testing uses trial division by small
//! primes followed by Miller-Rabin with random witnesses.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};

use crate::config::MILLER_RABIN_ROUNDS;

/// Odd primes used for cheap trial division before Miller-Rabin.
const SMALL_PRIMES: [u32; 53] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211, 223, 227, 229, 233, 239, 241, 251,
];

/// Miller-Rabin probable-prime test with `rounds` random witnesses.
pub fn is_probable_prime<R: RngCore + CryptoRng>(
    candidate: &BigUint,
    rounds: u32,
    rng: &mut R,
) -> bool {
    let one = BigUint::one();
    let two = &one + &one;
    let three = &two + &one;

    if candidate < &two {
        return false;
    }
    if candidate == &two || candidate == &three {
        return true;
    }
    if (candidate % 2u32).is_zero() {
        return false;
    }
    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if candidate == &p {
            return true;
        }
        if (candidate % &p).is_zero() {
            return false;
        }
    }

    // candidate - 1 = d * 2^s with d odd
    let minus_one = candidate - &one;
    let s = minus_one.trailing_zeros().unwrap_or(0);
    let d = &minus_one >> s;

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &minus_one);
        let mut x = a.modpow(&d, candidate);
        if x == one || x == minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, candidate);
            if x == minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Generate a random probable prime with exactly `bits` bits.
///
/// The top bit is forced so the advertised width is exact, which keeps the
/// sector size derived from the modulus stable across setups.
pub fn generate_prime<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> BigUint {
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, MILLER_RABIN_ROUNDS, rng) {
            return candidate;
        }
    }
}
