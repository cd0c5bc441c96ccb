//! Auditor-secret state and its encrypted envelope.
//!
//! The state carries what the auditor must remember about an encoded file:
//! the chunk count `n` and the two PRF keys the tag was built from. Before it
//! crosses the client/server boundary it is sealed into an encrypt-then-MAC
//! envelope; `n` lives in the signed-but-not-encrypted region so a keyless
//! server can still parse it. No code path ever uses PRF keys from an
//! envelope whose MAC did not verify.
//!
//! Envelope layout, all integers big-endian:
//!
//! ```text
//! raw        := u32 sig_len ∥ sig_region ∥ u32 mac_len ∥ mac[32]
//! sig_region := u32 n ∥ u32 iv_len ∥ iv ∥ u32 enc_len ∥ ciphertext
//! plaintext  := u32 |k_f| ∥ k_f ∥ u32 |k_α| ∥ k_α
//! ```

use std::fmt;

use aes::cipher::KeyIvInit;
use aes::Aes256;
use cfb_mode::{BufDecryptor, BufEncryptor};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::config::{IV_SIZE, KEY_SIZE, MAC_SIZE, MAX_STATE_RAW_BYTES};
use crate::error::{PorError, Result};
use crate::prf::Prf;
use crate::wire::{put_u32, ByteReader, Wire};

type HmacSha256 = Hmac<Sha256>;

/// Auditor-secret file metadata: chunk count plus the `f` and `α` PRF keys.
///
/// Lifecycle: created unsealed by `encode`, sealed with
/// [`encrypt_and_sign`](State::encrypt_and_sign) before leaving the client,
/// and unsealed in memory only via
/// [`check_sig_and_decrypt`](State::check_sig_and_decrypt).
#[derive(Clone)]
pub struct State {
    n: u32,
    f_key: Option<Zeroizing<Vec<u8>>>,
    alpha_key: Option<Zeroizing<Vec<u8>>>,
    raw: Option<Vec<u8>>,
}

impl State {
    /// Fresh unsealed state holding newly drawn PRF keys.
    pub(crate) fn with_keys(f_key: &[u8], alpha_key: &[u8]) -> Self {
        Self {
            n: 0,
            f_key: Some(Zeroizing::new(f_key.to_vec())),
            alpha_key: Some(Zeroizing::new(alpha_key.to_vec())),
            raw: None,
        }
    }

    /// Chunk count of the encoded file.
    pub fn n(&self) -> u32 {
        self.n
    }

    pub(crate) fn set_n(&mut self, n: u32) {
        self.n = n;
    }

    /// Whether this state currently holds a sealed envelope.
    pub fn is_sealed(&self) -> bool {
        self.raw.is_some()
    }

    /// Size in bytes of the keys this envelope is sealed with.
    pub const fn key_size() -> usize {
        KEY_SIZE
    }

    /// PRF `f` over `[0, limit)`, available once keys are present.
    pub(crate) fn prf_f(&self, limit: &num_bigint::BigUint) -> Result<Prf> {
        let key = self.f_key.as_ref().ok_or_else(|| {
            PorError::InvalidInput("state holds no f key; decrypt the envelope first".into())
        })?;
        Ok(Prf::new(key, limit.clone()))
    }

    /// PRF `α` over `[0, limit)`, available once keys are present.
    pub(crate) fn prf_alpha(&self, limit: &num_bigint::BigUint) -> Result<Prf> {
        let key = self.alpha_key.as_ref().ok_or_else(|| {
            PorError::InvalidInput("state holds no alpha key; decrypt the envelope first".into())
        })?;
        Ok(Prf::new(key, limit.clone()))
    }

    /// Seal the state: CFB-encrypt the PRF keys, then MAC the signed region.
    ///
    /// With `convergent` set the IV is all zeros, so equal plaintext states
    /// seal to identical envelopes (deduplication keyed on the envelope at
    /// the cost of leaking equality); otherwise the IV is freshly random.
    pub fn encrypt_and_sign(&mut self, k_enc: &[u8], k_mac: &[u8], convergent: bool) -> Result<()> {
        self.encrypt_and_sign_with_rng(k_enc, k_mac, convergent, &mut OsRng)
    }

    /// [`encrypt_and_sign`](State::encrypt_and_sign) with an injected RNG.
    pub fn encrypt_and_sign_with_rng<R: RngCore + CryptoRng>(
        &mut self,
        k_enc: &[u8],
        k_mac: &[u8],
        convergent: bool,
        rng: &mut R,
    ) -> Result<()> {
        let k_enc = symmetric_key(k_enc)?;
        let k_mac = symmetric_key(k_mac)?;
        let f_key = self.f_key.as_ref().ok_or_else(|| {
            PorError::InvalidInput("state has no f key; nothing to seal".into())
        })?;
        let alpha_key = self.alpha_key.as_ref().ok_or_else(|| {
            PorError::InvalidInput("state has no alpha key; nothing to seal".into())
        })?;

        let mut iv = [0u8; IV_SIZE];
        if !convergent {
            rng.fill_bytes(&mut iv);
        }

        // plaintext := |k_f| ∥ k_f ∥ |k_α| ∥ k_α
        let mut plaintext = Zeroizing::new(Vec::with_capacity(2 * (4 + KEY_SIZE)));
        put_u32(&mut plaintext, f_key.len() as u32);
        plaintext.extend_from_slice(f_key);
        put_u32(&mut plaintext, alpha_key.len() as u32);
        plaintext.extend_from_slice(alpha_key);

        let mut ciphertext = plaintext.to_vec();
        let mut cipher = BufEncryptor::<Aes256>::new((&k_enc).into(), (&iv).into());
        cipher.encrypt(&mut ciphertext);

        // sig_region := n ∥ iv_len ∥ iv ∥ enc_len ∥ ciphertext
        let mut sig = Vec::new();
        put_u32(&mut sig, self.n);
        put_u32(&mut sig, IV_SIZE as u32);
        sig.extend_from_slice(&iv);
        put_u32(&mut sig, ciphertext.len() as u32);
        sig.extend_from_slice(&ciphertext);

        let mut mac = HmacSha256::new_from_slice(&k_mac)
            .map_err(|_| PorError::InvalidInput("MAC key rejected".into()))?;
        mac.update(&sig);
        let mac_bytes = mac.finalize().into_bytes();

        let mut raw = Vec::new();
        put_u32(&mut raw, sig.len() as u32);
        raw.extend_from_slice(&sig);
        put_u32(&mut raw, mac_bytes.len() as u32);
        raw.extend_from_slice(&mac_bytes);

        self.raw = Some(raw);
        Ok(())
    }

    /// Authenticate the sealed envelope and, on success, recover the PRF keys.
    ///
    /// Returns `Ok(false)` when the envelope fails authentication — a wrong
    /// or truncated MAC, a MAC length other than 32, or a structure too
    /// mangled to reach the MAC check at all. Verification paths surface
    /// that as a domain `false`; challenge generation turns it into
    /// [`PorError::StateAuthentication`]. Key material is only parsed after
    /// the MAC verifies.
    pub fn check_sig_and_decrypt(&mut self, k_enc: &[u8], k_mac: &[u8]) -> Result<bool> {
        let k_enc = symmetric_key(k_enc)?;
        let k_mac = symmetric_key(k_mac)?;
        let raw = self.raw.as_ref().ok_or_else(|| {
            PorError::InvalidInput("state is not sealed; nothing to authenticate".into())
        })?;

        let Some((sig, mac_bytes)) = split_envelope(raw) else {
            return Ok(false);
        };

        let mut mac = HmacSha256::new_from_slice(&k_mac)
            .map_err(|_| PorError::InvalidInput("MAC key rejected".into()))?;
        mac.update(sig);
        if mac.verify_slice(mac_bytes).is_err() {
            return Ok(false);
        }

        // The region is authentic from here on; parse failures now mean the
        // envelope was sealed by incompatible code, not tampered with.
        let mut r = ByteReader::new(sig);
        let n = r.get_u32("state n")?;
        let iv_len = r.get_u32("state iv size")? as usize;
        if iv_len != IV_SIZE {
            return Err(PorError::Deserialization(format!(
                "state iv of {iv_len} bytes, expected {IV_SIZE}"
            )));
        }
        let iv: [u8; IV_SIZE] = r
            .take(IV_SIZE, "state iv")?
            .try_into()
            .map_err(|_| PorError::Deserialization("state iv length".into()))?;
        let enc_len = r.get_u32("state ciphertext size")? as usize;
        let ciphertext = r.take(enc_len, "state ciphertext")?;

        let mut plaintext = Zeroizing::new(ciphertext.to_vec());
        let mut cipher = BufDecryptor::<Aes256>::new((&k_enc).into(), (&iv).into());
        cipher.decrypt(&mut plaintext);

        let mut pr = ByteReader::new(&plaintext);
        let f_len = pr.get_u32("f key size")? as usize;
        let f_key = pr.take(f_len, "f key")?;
        let alpha_len = pr.get_u32("alpha key size")? as usize;
        let alpha_key = pr.take(alpha_len, "alpha key")?;

        self.n = n;
        self.f_key = (!f_key.is_empty()).then(|| Zeroizing::new(f_key.to_vec()));
        self.alpha_key = (!alpha_key.is_empty()).then(|| Zeroizing::new(alpha_key.to_vec()));
        Ok(true)
    }

    /// Extract `n` from the signed region without possessing any keys.
    ///
    /// This is all a keyless server can learn from a sealed state, and all it
    /// needs: the chunk count is signed but deliberately not encrypted.
    pub fn public_interpretation(&mut self) -> Result<()> {
        let raw = self.raw.as_ref().ok_or_else(|| {
            PorError::InvalidInput("state is not sealed; n is already in the clear".into())
        })?;

        let mut r = ByteReader::new(raw);
        r.take(4, "state sig size")?;
        self.n = r.get_u32("state n")?;
        Ok(())
    }
}

/// Split a raw envelope into `(sig_region, mac)` without trusting any of it.
///
/// `None` means the envelope cannot even be carved up, which callers treat
/// the same as a MAC mismatch.
fn split_envelope(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut r = ByteReader::new(raw);
    let sig_len = r.get_u32("sig size").ok()? as usize;
    let sig = r.take(sig_len, "sig region").ok()?;
    let mac_len = r.get_u32("mac size").ok()? as usize;
    if mac_len != MAC_SIZE {
        return None;
    }
    let mac = r.take(MAC_SIZE, "mac").ok()?;
    Some((sig, mac))
}

fn symmetric_key(key: &[u8]) -> Result<[u8; KEY_SIZE]> {
    key.try_into().map_err(|_| {
        PorError::InvalidInput(format!(
            "symmetric key of {} bytes, expected {KEY_SIZE}",
            key.len()
        ))
    })
}

impl Wire for State {
    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        let raw = self.raw.as_ref().ok_or_else(|| {
            PorError::InvalidInput("state must be sealed before serialization".into())
        })?;
        put_u32(out, raw.len() as u32);
        out.extend_from_slice(raw);
        Ok(())
    }

    fn deserialize(r: &mut ByteReader<'_>) -> Result<Self> {
        let raw_len = r.get_u32("state size")?;
        if raw_len > MAX_STATE_RAW_BYTES {
            return Err(PorError::Deserialization(format!(
                "sealed state of {raw_len} bytes exceeds {MAX_STATE_RAW_BYTES}"
            )));
        }
        let raw = r.take(raw_len as usize, "state envelope")?.to_vec();

        let mut state = Self {
            n: 0,
            f_key: None,
            alpha_key: None,
            raw: Some(raw),
        };
        state.public_interpretation()?;
        Ok(state)
    }
}

/// Envelope identity: two states are equal when they agree on the chunk
/// count and the sealed bytes. In-memory key material is deliberately
/// excluded; it never round-trips through the wire form.
impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n && self.raw == other.raw
    }
}

impl Eq for State {}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("n", &self.n)
            .field("sealed", &self.is_sealed())
            .field("has_keys", &self.f_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TEST_RANDOM_SEED;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const K_ENC: [u8; KEY_SIZE] = [0x10; KEY_SIZE];
    const K_MAC: [u8; KEY_SIZE] = [0x20; KEY_SIZE];

    fn sealed_state(n: u32, convergent: bool) -> State {
        let mut rng = StdRng::seed_from_u64(TEST_RANDOM_SEED);
        let mut state = State::with_keys(&[0x31; KEY_SIZE], &[0x32; KEY_SIZE]);
        state.set_n(n);
        state
            .encrypt_and_sign_with_rng(&K_ENC, &K_MAC, convergent, &mut rng)
            .unwrap();
        state
    }

    #[test]
    fn seal_unseal_recovers_keys() {
        let state = sealed_state(77, false);
        let bytes = state.to_bytes().unwrap();

        let mut decoded = State::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.n(), 77);
        assert!(decoded.prf_f(&num_bigint::BigUint::from(5u32)).is_err());

        assert!(decoded.check_sig_and_decrypt(&K_ENC, &K_MAC).unwrap());
        assert_eq!(decoded.n(), 77);
        let p = num_bigint::BigUint::from(1_000_003u64);
        let f = decoded.prf_f(&p).unwrap();
        let reference = Prf::new(&[0x31; KEY_SIZE], p.clone());
        assert_eq!(f.evaluate(9), reference.evaluate(9));
        let alpha = decoded.prf_alpha(&p).unwrap();
        let reference = Prf::new(&[0x32; KEY_SIZE], p);
        assert_eq!(alpha.evaluate(3), reference.evaluate(3));
    }

    #[test]
    fn wire_roundtrip_is_structural_identity() {
        let state = sealed_state(12, false);
        let bytes = state.to_bytes().unwrap();
        assert_eq!(State::from_bytes(&bytes).unwrap(), state);
    }

    #[test]
    fn every_envelope_flip_is_detected() {
        let state = sealed_state(3, false);
        let bytes = state.to_bytes().unwrap();

        // Skip the outer length prefix; everything after it is covered.
        for i in 4..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let decoded = State::from_bytes(&tampered);
            let authentic = match decoded {
                Ok(mut s) => s.check_sig_and_decrypt(&K_ENC, &K_MAC).unwrap_or(false),
                Err(_) => false,
            };
            assert!(!authentic, "flip at byte {i} went unnoticed");
        }
    }

    #[test]
    fn wrong_keys_fail_authentication() {
        let mut state = sealed_state(5, false);
        let mut wrong = K_MAC;
        wrong[0] ^= 0xff;
        assert!(!state.check_sig_and_decrypt(&K_ENC, &wrong).unwrap());
    }

    #[test]
    fn bad_key_length_is_invalid_input() {
        let mut state = sealed_state(5, false);
        assert!(matches!(
            state.check_sig_and_decrypt(&K_ENC[..16], &K_MAC),
            Err(PorError::InvalidInput(_))
        ));
        let mut unsealed = State::with_keys(&[1; KEY_SIZE], &[2; KEY_SIZE]);
        assert!(matches!(
            unsealed.encrypt_and_sign(&K_ENC, &K_MAC[..8], false),
            Err(PorError::InvalidInput(_))
        ));
    }

    #[test]
    fn convergent_sealing_is_deterministic() {
        let a = sealed_state(9, true);
        let b = sealed_state(9, true);
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }

    #[test]
    fn random_iv_sealing_differs() {
        let mut rng = StdRng::seed_from_u64(TEST_RANDOM_SEED);
        let mut seal = |rng: &mut StdRng| {
            let mut state = State::with_keys(&[0x31; KEY_SIZE], &[0x32; KEY_SIZE]);
            state.set_n(9);
            state
                .encrypt_and_sign_with_rng(&K_ENC, &K_MAC, false, rng)
                .unwrap();
            state.to_bytes().unwrap()
        };
        assert_ne!(seal(&mut rng), seal(&mut rng));
    }

    #[test]
    fn unsealed_state_does_not_serialize() {
        let state = State::with_keys(&[1; KEY_SIZE], &[2; KEY_SIZE]);
        assert!(matches!(
            state.to_bytes(),
            Err(PorError::InvalidInput(_))
        ));
    }

    #[test]
    fn oversized_envelope_rejected() {
        let mut bytes = Vec::new();
        put_u32(&mut bytes, MAX_STATE_RAW_BYTES + 1);
        bytes.resize(bytes.len() + MAX_STATE_RAW_BYTES as usize + 1, 0);
        assert!(matches!(
            State::from_bytes(&bytes),
            Err(PorError::Deserialization(_))
        ));
    }

    #[test]
    fn public_interpretation_reads_n_without_keys() {
        let state = sealed_state(424_242, false);
        let bytes = state.to_bytes().unwrap();
        let decoded = State::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.n(), 424_242);
    }
}
