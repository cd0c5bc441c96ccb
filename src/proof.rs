//! Server responses.

use num_bigint::BigUint;

use crate::error::Result;
use crate::wire::{get_bigint, put_bigint, put_u32, ByteReader, Wire};

/// The server's answer to a challenge: one aggregated sector combination
/// `μ_j` per sector position, and the matching combination `σ` over the tag
/// entries. All values are integers in `[0, p)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proof {
    mu: Vec<BigUint>,
    sigma: BigUint,
}

impl Proof {
    pub fn new(mu: Vec<BigUint>, sigma: BigUint) -> Self {
        Self { mu, sigma }
    }

    pub fn mu(&self) -> &[BigUint] {
        &self.mu
    }

    pub fn sigma(&self) -> &BigUint {
        &self.sigma
    }
}

impl Wire for Proof {
    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        put_u32(out, self.mu.len() as u32);
        for mu_j in &self.mu {
            put_bigint(out, mu_j);
        }
        put_bigint(out, &self.sigma);
        Ok(())
    }

    fn deserialize(r: &mut ByteReader<'_>) -> Result<Self> {
        let count = r.get_u32("mu count")?;
        let mut mu = Vec::new();
        for _ in 0..count {
            mu.push(get_bigint(r, "mu entry")?);
        }
        let sigma = get_bigint(r, "proof sigma")?;
        Ok(Self { mu, sigma })
    }
}
