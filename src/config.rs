//! Centralized configuration for the heartbeat PoR engine.
//!
//! This module contains constants and default parameters used throughout the
//! crate to ensure consistency and ease of modification.

// --- Symmetric Key Material ---

/// Symmetric key size in bytes, shared by the encryption key, the MAC key,
/// the two PRF keys, and the challenge key (AES-256 / HMAC-SHA256).
pub const KEY_SIZE: usize = 32;

/// AES-CFB initialization vector size in bytes (one AES block).
pub const IV_SIZE: usize = 16;

/// HMAC-SHA256 digest size in bytes.
pub const MAC_SIZE: usize = 32;

// --- Scheme Parameters ---

/// Default number of sectors per chunk.
pub const DEFAULT_SECTORS: u32 = 10;

/// Default width of the prime modulus in bytes (a 1024-bit field).
pub const DEFAULT_PRIME_BYTES: usize = 128;

/// Default fraction of chunks a challenge examines; 1.0 scans the whole file.
pub const DEFAULT_CHECK_FRACTION: f64 = 1.0;

// --- Decode Ceilings ---

/// Ceiling on the declared byte length of any length-prefixed integer on the
/// wire. Integers above this are rejected before any allocation happens.
pub const MAX_INTEGER_BYTES: u32 = 1024;

/// Ceiling on the sealed state envelope size.
pub const MAX_STATE_RAW_BYTES: u32 = 2048;

// --- PRF and Primality Parameters ---

/// Cap on PRF rejection sampling attempts. The top-byte mask keeps the
/// expected attempt count below two, so hitting the cap is a ~2^-80 event.
pub const PRF_MAX_ITERATIONS: u32 = 80;

/// Miller-Rabin witness rounds for probable-prime testing.
pub const MILLER_RABIN_ROUNDS: u32 = 40;

// --- Test-related Constants ---

/// A fixed random seed used in tests to ensure deterministic behavior.
pub const TEST_RANDOM_SEED: u64 = 42;
