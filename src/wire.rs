//! Length-prefixed big-endian binary framing shared by every wire object.
//!
//! All five ceremony objects (heartbeat, tag, state, challenge, proof) use a
//! single encoding: 4-byte big-endian length prefixes for blobs and
//! collections, and arbitrary-precision integers written as
//! `u32 length ∥ minimum big-endian bytes` (zero encodes as a zero-length
//! body). Integer decodes are bounded by [`MAX_INTEGER_BYTES`] before any
//! allocation happens, and the stream must actually hold the declared bytes.
//!
//! Verification agreement between encoder, prover, and verifier depends
//! bit-exactly on this framing, so nothing here is negotiable at runtime.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use num_bigint::BigUint;
use num_traits::Zero;

use crate::config::MAX_INTEGER_BYTES;
use crate::error::{PorError, Result};

/// Bounds-checked cursor over a borrowed byte slice.
///
/// Every decode path goes through [`take`](ByteReader::take), which refuses
/// to read past the end of the buffer and names the field that failed.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left in the stream.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consume exactly `n` bytes, or fail naming `what`.
    pub fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(PorError::Deserialization(format!(
                "unable to read {what}: need {n} bytes, {} available",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    /// Read a big-endian u32.
    pub fn get_u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Append a big-endian u32.
pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Minimum big-endian encoding of an integer; zero encodes as zero bytes.
pub fn bigint_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

/// Append `u32 length ∥ minimum big-endian bytes`.
pub fn put_bigint(out: &mut Vec<u8>, value: &BigUint) {
    let bytes = bigint_bytes(value);
    put_u32(out, bytes.len() as u32);
    out.extend_from_slice(&bytes);
}

/// Bounded integer decode.
///
/// The declared length must not exceed [`MAX_INTEGER_BYTES`] and the stream
/// must hold at least that many bytes; either violation is a
/// [`PorError::Deserialization`].
pub fn get_bigint(r: &mut ByteReader<'_>, what: &str) -> Result<BigUint> {
    let len = r.get_u32(what)?;
    if len > MAX_INTEGER_BYTES {
        return Err(PorError::Deserialization(format!(
            "{what}: declared integer size {len} exceeds {MAX_INTEGER_BYTES} bytes"
        )));
    }
    let bytes = r.take(len as usize, what)?;
    Ok(BigUint::from_bytes_be(bytes))
}

/// Binary wire capability shared by every ceremony object.
///
/// Types implement [`serialize`](Wire::serialize) and
/// [`deserialize`](Wire::deserialize); byte-buffer and base64 text forms
/// come for free. The base64 form is the payload used by text-only
/// interchange formats; `from_base64(to_base64(x))` is the identity.
pub trait Wire: Sized {
    /// Append this object's wire form to `out`.
    fn serialize(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Decode one object from the reader, leaving any trailing bytes.
    fn deserialize(r: &mut ByteReader<'_>) -> Result<Self>;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.serialize(&mut out)?;
        Ok(out)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        Self::deserialize(&mut r)
    }

    fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    fn from_base64(text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| PorError::Deserialization(format!("invalid base64 payload: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_roundtrip() {
        let mut out = Vec::new();
        put_u32(&mut out, 0xdead_beef);
        assert_eq!(out, vec![0xde, 0xad, 0xbe, 0xef]);

        let mut r = ByteReader::new(&out);
        assert_eq!(r.get_u32("value").unwrap(), 0xdead_beef);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn bigint_minimum_encoding() {
        // Zero carries no bytes at all.
        assert!(bigint_bytes(&BigUint::zero()).is_empty());
        // No leading zero bytes on anything else.
        assert_eq!(bigint_bytes(&BigUint::from(0x01_00u32)), vec![0x01, 0x00]);
        assert_eq!(bigint_bytes(&BigUint::from(0x7fu32)), vec![0x7f]);
    }

    #[test]
    fn bigint_roundtrip() {
        for value in [
            BigUint::zero(),
            BigUint::from(1u32),
            BigUint::from(u64::MAX),
            BigUint::from_bytes_be(&[0xff; 64]),
        ] {
            let mut out = Vec::new();
            put_bigint(&mut out, &value);
            let mut r = ByteReader::new(&out);
            assert_eq!(get_bigint(&mut r, "value").unwrap(), value);
        }
    }

    #[test]
    fn oversized_integer_rejected() {
        let mut out = Vec::new();
        put_u32(&mut out, MAX_INTEGER_BYTES + 1);
        out.resize(out.len() + MAX_INTEGER_BYTES as usize + 1, 0xaa);

        let mut r = ByteReader::new(&out);
        assert!(matches!(
            get_bigint(&mut r, "value"),
            Err(PorError::Deserialization(_))
        ));
    }

    #[test]
    fn truncated_integer_rejected() {
        let mut out = Vec::new();
        put_u32(&mut out, 16);
        out.extend_from_slice(&[0u8; 8]); // 8 bytes short of the declared 16

        let mut r = ByteReader::new(&out);
        assert!(matches!(
            get_bigint(&mut r, "value"),
            Err(PorError::Deserialization(_))
        ));
    }

    #[test]
    fn reader_refuses_overrun() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert_eq!(r.take(2, "head").unwrap(), &[1, 2]);
        assert!(r.take(2, "tail").is_err());
        // A failed take consumes nothing.
        assert_eq!(r.take(1, "last").unwrap(), &[3]);
    }
}
