//! Per-chunk aggregate authenticators.

use num_bigint::BigUint;

use crate::error::Result;
use crate::wire::{get_bigint, put_bigint, put_u32, ByteReader, Wire};

/// Ordered per-chunk authenticators `σ_0 … σ_{n-1}`, produced by the client
/// and stored by the server alongside the file. Each entry is an integer in
/// `[0, p)` binding one chunk to the auditor's secret PRF keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    sigma: Vec<BigUint>,
}

impl Tag {
    pub fn new(sigma: Vec<BigUint>) -> Self {
        Self { sigma }
    }

    pub fn sigma(&self) -> &[BigUint] {
        &self.sigma
    }

    /// Number of chunks this tag covers.
    pub fn len(&self) -> usize {
        self.sigma.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigma.is_empty()
    }

    pub(crate) fn push(&mut self, sigma_i: BigUint) {
        self.sigma.push(sigma_i);
    }
}

impl Wire for Tag {
    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        put_u32(out, self.sigma.len() as u32);
        for sigma_i in &self.sigma {
            put_bigint(out, sigma_i);
        }
        Ok(())
    }

    fn deserialize(r: &mut ByteReader<'_>) -> Result<Self> {
        let count = r.get_u32("sigma count")?;
        let mut sigma = Vec::new();
        for _ in 0..count {
            sigma.push(get_bigint(r, "sigma entry")?);
        }
        Ok(Self { sigma })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PorError;

    fn sample() -> Tag {
        Tag::new(vec![
            BigUint::from(0u32),
            BigUint::from(1u32),
            BigUint::from(u64::MAX),
            BigUint::from_bytes_be(&[0x42; 48]),
        ])
    }

    #[test]
    fn wire_roundtrip() {
        let tag = sample();
        let bytes = tag.to_bytes().unwrap();
        assert_eq!(Tag::from_bytes(&bytes).unwrap(), tag);
    }

    #[test]
    fn base64_roundtrip() {
        let tag = sample();
        let text = tag.to_base64().unwrap();
        assert_eq!(Tag::from_base64(&text).unwrap(), tag);
    }

    #[test]
    fn empty_tag_roundtrip() {
        let tag = Tag::default();
        let bytes = tag.to_bytes().unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert!(Tag::from_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn truncated_entry_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            Tag::from_bytes(&bytes),
            Err(PorError::Deserialization(_))
        ));
    }

    #[test]
    fn overclaimed_count_rejected() {
        // Declares four entries but carries none.
        let bytes = vec![0, 0, 0, 4];
        assert!(Tag::from_bytes(&bytes).is_err());
    }
}
