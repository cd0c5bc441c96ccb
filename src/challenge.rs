//! Auditor challenges.

use num_bigint::BigUint;

use crate::config::KEY_SIZE;
use crate::error::{PorError, Result};
use crate::prf::Prf;
use crate::wire::{get_bigint, put_bigint, put_u32, ByteReader, Wire};

/// A fresh audit request: how many chunks to examine (`l`), the key both
/// verification PRFs are derived from, and the exclusive upper bound for
/// coefficient samples.
///
/// A challenge carries no file-specific data; the chunk count is supplied by
/// whichever party uses it (the prover has the tag, the verifier has the
/// state), which is why [`indexer`](Challenge::indexer) takes `n` as an
/// argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    l: u32,
    key: Vec<u8>,
    v_max: BigUint,
}

impl Challenge {
    /// Assemble a challenge. The key must not exceed 32 bytes.
    pub fn new(l: u32, key: Vec<u8>, v_max: BigUint) -> Result<Self> {
        if key.len() > KEY_SIZE {
            return Err(PorError::InvalidInput(format!(
                "challenge key of {} bytes exceeds {KEY_SIZE}",
                key.len()
            )));
        }
        Ok(Self { l, key, v_max })
    }

    /// Number of chunk indices this challenge samples.
    pub fn l(&self) -> u32 {
        self.l
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Exclusive upper bound for coefficient PRF outputs.
    pub fn v_max(&self) -> &BigUint {
        &self.v_max
    }

    /// PRF mapping `i ∈ [0, l)` to a chunk index in `[0, n)`.
    pub fn indexer(&self, n: u32) -> Prf {
        Prf::new(&self.key, BigUint::from(n))
    }

    /// PRF mapping `i ∈ [0, l)` to a coefficient below `v_max`.
    ///
    /// Shares its key with the indexer; prover/verifier agreement depends on
    /// both parties deriving both PRFs from the same challenge key.
    pub fn coefficients(&self) -> Prf {
        Prf::new(&self.key, self.v_max.clone())
    }
}

impl Wire for Challenge {
    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        put_u32(out, self.l);
        put_u32(out, self.key.len() as u32);
        out.extend_from_slice(&self.key);
        put_bigint(out, &self.v_max);
        Ok(())
    }

    fn deserialize(r: &mut ByteReader<'_>) -> Result<Self> {
        let l = r.get_u32("challenge l")?;
        let key_len = r.get_u32("challenge key size")? as usize;
        if key_len > KEY_SIZE {
            return Err(PorError::Deserialization(format!(
                "challenge key of {key_len} bytes exceeds {KEY_SIZE}"
            )));
        }
        let key = r.take(key_len, "challenge key")?.to_vec();
        let v_max = get_bigint(r, "challenge bound")?;
        Ok(Self { l, key, v_max })
    }
}
