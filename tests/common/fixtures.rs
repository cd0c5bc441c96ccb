//! Test fixtures and scenario configuration.
//!
//! This module provides the CeremonyConfig struct for declarative test setup
//! and the CeremonySetup struct holding every artifact of an encode run.

#![allow(dead_code)]

use std::io::Cursor;

use heartbeat_por::{config::TEST_RANDOM_SEED, Heartbeat, State, StreamFile, Tag};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Complete test scenario configuration.
#[derive(Debug, Clone)]
pub struct CeremonyConfig {
    /// Fraction of chunks each challenge examines
    pub check_fraction: f64,
    /// Sectors per chunk
    pub sectors: u32,
    /// Prime modulus width in bytes
    pub prime_bytes: usize,
    /// Size of the encoded file in bytes
    pub data_size: usize,
    /// Base seed for all randomness in the scenario
    pub seed: u64,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            check_fraction: 1.0,
            sectors: 10,
            // A 256-bit field keeps most scenarios fast; the production
            // 1024-bit field is exercised explicitly where it matters.
            prime_bytes: 32,
            data_size: 4096,
            seed: TEST_RANDOM_SEED,
        }
    }
}

impl CeremonyConfig {
    /// A scenario over `size` bytes of deterministic data.
    pub fn with_size(size: usize) -> Self {
        Self {
            data_size: size,
            ..Default::default()
        }
    }

    /// A scenario sampling only a fraction of the chunks.
    pub fn with_fraction(check_fraction: f64, size: usize) -> Self {
        Self {
            check_fraction,
            data_size: size,
            ..Default::default()
        }
    }

    /// The production-sized parameter set: ten sectors over a 1024-bit field.
    pub fn production(size: usize) -> Self {
        Self {
            prime_bytes: 128,
            data_size: size,
            ..Default::default()
        }
    }
}

/// Everything an encode run leaves behind, ready for assertions.
pub struct CeremonySetup {
    pub heartbeat: Heartbeat,
    pub data: Vec<u8>,
    pub tag: Tag,
    pub state: State,
    pub rng: StdRng,
}

impl CeremonySetup {
    /// Chunk size in bytes for this scenario's geometry.
    pub fn chunk_size(&self) -> usize {
        (self.heartbeat.sectors() * self.heartbeat.sector_size()) as usize
    }
}

/// Creates deterministic test data of the specified size.
pub fn create_test_data(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; size];
    rng.fill_bytes(&mut data);
    data
}

/// Wrap a byte vector in the in-memory file adapter.
pub fn memory_file(data: &[u8]) -> StreamFile<Cursor<Vec<u8>>> {
    StreamFile::new(Cursor::new(data.to_vec()))
}

/// Run setup and encode for a scenario, deterministically.
pub fn setup_ceremony(config: &CeremonyConfig) -> CeremonySetup {
    setup_ceremony_with_data(config, create_test_data(config.data_size, config.seed))
}

/// Like [`setup_ceremony`] but over caller-provided file bytes.
pub fn setup_ceremony_with_data(config: &CeremonyConfig, data: Vec<u8>) -> CeremonySetup {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let heartbeat = Heartbeat::new_with_rng(
        config.check_fraction,
        config.sectors,
        config.prime_bytes,
        &mut rng,
    )
    .expect("scenario parameters are valid");

    let mut file = memory_file(&data);
    let (tag, state) = heartbeat
        .encode_with_rng(&mut file, &mut rng)
        .expect("encode succeeds");

    CeremonySetup {
        heartbeat,
        data,
        tag,
        state,
        rng,
    }
}
