//! The private heartbeat engine.
//!
//! Implements the Shacham-Waters compact proof-of-retrievability ceremony
//! over a random prime field: the client encodes a file into per-chunk
//! authenticators, an auditor issues short random challenges, the server
//! answers with aggregated sector combinations, and the auditor checks the
//! response against its secret state. The engine comes in two flavors
//! discriminated by a wire flag: the full engine holds the envelope keys and
//! may encode, challenge, and verify; the public reduction keeps only the
//! field parameters and is handed to the server to prove.

use std::fmt;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, debug_span};
use zeroize::Zeroizing;

use crate::challenge::Challenge;
use crate::config::{
    DEFAULT_CHECK_FRACTION, DEFAULT_PRIME_BYTES, DEFAULT_SECTORS, KEY_SIZE,
};
use crate::error::{PorError, Result};
use crate::file::{SeekableFile, SimpleFile};
use crate::prf::Prf;
use crate::prime::generate_prime;
use crate::proof::Proof;
use crate::state::State;
use crate::tag::Tag;
use crate::wire::{get_bigint, put_bigint, put_u32, ByteReader, Wire};

const FLAG_PUBLIC: u8 = 0x01;

/// One party's view of the scheme parameters.
///
/// Immutable after construction; every ceremony call is a pure function of
/// its inputs plus this configuration.
#[derive(Clone)]
pub struct Heartbeat {
    p: BigUint,
    sectors: u32,
    sector_size: u32,
    check_fraction: f64,
    k_enc: Zeroizing<[u8; KEY_SIZE]>,
    k_mac: Zeroizing<[u8; KEY_SIZE]>,
    is_public: bool,
}

impl Heartbeat {
    /// Generate a full (private) engine: fresh envelope keys and a random
    /// prime modulus of `prime_bytes` bytes.
    ///
    /// `check_fraction` is the fraction of chunks each challenge examines
    /// and must lie in `(0, 1]`. The sector size is derived from the prime
    /// so that sectors never need reduction before tagging.
    pub fn new(check_fraction: f64, sectors: u32, prime_bytes: usize) -> Result<Self> {
        Self::new_with_rng(check_fraction, sectors, prime_bytes, &mut OsRng)
    }

    /// [`new`](Heartbeat::new) with an injected RNG.
    pub fn new_with_rng<R: RngCore + CryptoRng>(
        check_fraction: f64,
        sectors: u32,
        prime_bytes: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if !(check_fraction > 0.0 && check_fraction <= 1.0) {
            return Err(PorError::InvalidInput(format!(
                "check fraction {check_fraction} outside (0, 1]"
            )));
        }
        if sectors == 0 {
            return Err(PorError::InvalidInput("sectors must be positive".into()));
        }
        if prime_bytes == 0 {
            return Err(PorError::InvalidInput(
                "prime width must be positive".into(),
            ));
        }

        let _span = debug_span!("heartbeat_init", prime_bytes, sectors).entered();

        let mut k_enc = Zeroizing::new([0u8; KEY_SIZE]);
        let mut k_mac = Zeroizing::new([0u8; KEY_SIZE]);
        rng.fill_bytes(&mut k_enc[..]);
        rng.fill_bytes(&mut k_mac[..]);

        let p = generate_prime((prime_bytes * 8) as u64, rng);
        let sector_size = (p.bits() / 8) as u32;
        debug!(bits = p.bits(), sector_size, "generated field modulus");

        Ok(Self {
            p,
            sectors,
            sector_size,
            check_fraction,
            k_enc,
            k_mac,
            is_public: false,
        })
    }

    /// Default parameters: scan the whole file, ten sectors per chunk, a
    /// 1024-bit modulus.
    pub fn default_scheme() -> Result<Self> {
        Self::new(DEFAULT_CHECK_FRACTION, DEFAULT_SECTORS, DEFAULT_PRIME_BYTES)
    }

    /// The public reduction: same field parameters, keys zeroed.
    ///
    /// Safe to hand to the server; idempotent.
    pub fn public(&self) -> Self {
        Self {
            p: self.p.clone(),
            sectors: self.sectors,
            sector_size: self.sector_size,
            check_fraction: self.check_fraction,
            k_enc: Zeroizing::new([0u8; KEY_SIZE]),
            k_mac: Zeroizing::new([0u8; KEY_SIZE]),
            is_public: true,
        }
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Prime modulus of the field.
    pub fn p(&self) -> &BigUint {
        &self.p
    }

    /// Sectors per chunk.
    pub fn sectors(&self) -> u32 {
        self.sectors
    }

    /// Sector size in bytes; every sector value stays below the modulus.
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub fn check_fraction(&self) -> f64 {
        self.check_fraction
    }

    /// Encode a file: read it sequentially and produce the per-chunk tag plus
    /// the sealed auditor state.
    ///
    /// Each chunk contributes `σ_i = f(i) + Σ_j α(j)·sector_{i,j} (mod p)`.
    /// A short sector read ends the file; the short sector contributes the
    /// bytes it actually carries. A chunk whose first read returns nothing is
    /// not emitted, so a file that ends exactly on a chunk boundary yields no
    /// trailing empty chunk.
    pub fn encode<F: SimpleFile>(&self, file: &mut F) -> Result<(Tag, State)> {
        self.encode_with_rng(file, &mut OsRng)
    }

    /// [`encode`](Heartbeat::encode) with an injected RNG.
    pub fn encode_with_rng<F: SimpleFile, R: RngCore + CryptoRng>(
        &self,
        file: &mut F,
        rng: &mut R,
    ) -> Result<(Tag, State)> {
        let _span = debug_span!("encode", sectors = self.sectors, sector_size = self.sector_size)
            .entered();

        if self.is_public {
            return Err(PorError::InvalidInput(
                "a public heartbeat cannot encode".into(),
            ));
        }

        let mut k_f = Zeroizing::new([0u8; KEY_SIZE]);
        let mut k_alpha = Zeroizing::new([0u8; KEY_SIZE]);
        rng.fill_bytes(&mut k_f[..]);
        rng.fill_bytes(&mut k_alpha[..]);

        let f = Prf::new(&k_f[..], self.p.clone());
        let alpha = Prf::new(&k_alpha[..], self.p.clone());

        let sector_size = self.sector_size as usize;
        let mut buf = vec![0u8; sector_size];
        let mut tag = Tag::default();
        let mut chunk_id: u32 = 0;

        loop {
            let bytes_read = file.read(&mut buf)?;
            if bytes_read == 0 {
                break;
            }

            let mut sigma = f.evaluate(chunk_id);
            sigma = (sigma + alpha.evaluate(0) * BigUint::from_bytes_be(&buf[..bytes_read]))
                % &self.p;
            let mut short = bytes_read < sector_size;

            if !short {
                for j in 1..self.sectors {
                    let n_read = file.read(&mut buf)?;
                    if n_read > 0 {
                        sigma = (sigma
                            + alpha.evaluate(j) * BigUint::from_bytes_be(&buf[..n_read]))
                            % &self.p;
                    }
                    if n_read < sector_size {
                        short = true;
                        break;
                    }
                }
            }

            tag.push(sigma);
            chunk_id += 1;
            if short {
                break;
            }
        }

        debug!(chunks = chunk_id, "file encoded");

        let mut state = State::with_keys(&k_f[..], &k_alpha[..]);
        state.set_n(chunk_id);
        state.encrypt_and_sign_with_rng(&self.k_enc[..], &self.k_mac[..], false, rng)?;

        Ok((tag, state))
    }

    /// Authenticate the sealed state and emit a fresh challenge examining
    /// `⌊check_fraction · n⌋` chunks with coefficients bounded by `p`.
    pub fn gen_challenge(&self, sealed_state: &State) -> Result<Challenge> {
        self.gen_challenge_with_rng(sealed_state, &mut OsRng)
    }

    /// [`gen_challenge`](Heartbeat::gen_challenge) with an injected RNG.
    pub fn gen_challenge_with_rng<R: RngCore + CryptoRng>(
        &self,
        sealed_state: &State,
        rng: &mut R,
    ) -> Result<Challenge> {
        let _span = debug_span!("gen_challenge").entered();

        if self.is_public {
            return Err(PorError::InvalidInput(
                "a public heartbeat cannot issue challenges".into(),
            ));
        }

        let mut state = sealed_state.clone();
        if state.is_sealed()
            && !state.check_sig_and_decrypt(&self.k_enc[..], &self.k_mac[..])?
        {
            return Err(PorError::StateAuthentication);
        }

        let l = (self.check_fraction * f64::from(state.n())) as u32;
        debug!(l, n = state.n(), "issuing challenge");

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rng.fill_bytes(&mut key[..]);
        Challenge::new(l, key.to_vec(), self.p.clone())
    }

    /// Answer a challenge with random access to the stored file and the tag.
    ///
    /// Either flavor of engine may prove. For each sampled index the server
    /// aggregates `μ_j = Σ_i v(i)·sector_{idx(i),j}` and
    /// `σ = Σ_i v(i)·σ_{idx(i)}`, all mod `p`. When the challenge covers the
    /// whole tag (`l ≥ n`) chunks are scanned in order instead of sampled.
    pub fn prove<F: SeekableFile>(
        &self,
        file: &mut F,
        challenge: &Challenge,
        tag: &Tag,
    ) -> Result<Proof> {
        let _span = debug_span!("prove", l = challenge.l(), chunks = tag.len()).entered();

        let n = tag.len() as u32;
        let indexer = challenge.indexer(n);
        let v = challenge.coefficients();

        let check_all = challenge.l() >= n;
        let count = if check_all { n } else { challenge.l() };
        debug!(check_all, count, "coverage");

        let sector_size = u64::from(self.sector_size);
        let chunk_size = u64::from(self.sectors) * sector_size;
        let mut buf = vec![0u8; self.sector_size as usize];
        let mut mu = vec![BigUint::zero(); self.sectors as usize];

        for j in 0..self.sectors {
            for i in 0..count {
                let index = if check_all { i } else { sample_index(&indexer, i) };
                let pos = u64::from(index) * chunk_size + u64::from(j) * sector_size;
                if file.seek(pos)? != pos {
                    break;
                }
                let bytes_read = file.read(&mut buf)?;
                let sector = BigUint::from_bytes_be(&buf[..bytes_read]);
                let slot = j as usize;
                mu[slot] = (&mu[slot] + v.evaluate(i) * sector) % &self.p;
            }
        }

        let mut sigma = BigUint::zero();
        for i in 0..count {
            let index = if check_all { i } else { sample_index(&indexer, i) };
            sigma = (sigma + v.evaluate(i) * &tag.sigma()[index as usize]) % &self.p;
        }

        Ok(Proof::new(mu, sigma))
    }

    /// Check a proof against the challenge and the sealed state.
    ///
    /// Domain failures — a rejected envelope, a malformed `μ` vector, or a
    /// mismatched `σ` — come back as `Ok(false)`; only structural problems
    /// (e.g. a state that was never sealed) surface as errors.
    pub fn verify(&self, proof: &Proof, challenge: &Challenge, sealed_state: &State) -> Result<bool> {
        let _span = debug_span!("verify", l = challenge.l()).entered();

        let mut state = sealed_state.clone();
        if state.is_sealed()
            && !state.check_sig_and_decrypt(&self.k_enc[..], &self.k_mac[..])?
        {
            debug!("state envelope rejected");
            return Ok(false);
        }

        if proof.mu().len() != self.sectors as usize {
            debug!(
                got = proof.mu().len(),
                expected = self.sectors,
                "mu arity mismatch"
            );
            return Ok(false);
        }

        let n = state.n();
        let indexer = challenge.indexer(n);
        let v = challenge.coefficients();
        let f = state.prf_f(&self.p)?;
        let alpha = state.prf_alpha(&self.p)?;

        let check_all = challenge.l() >= n;
        let count = if check_all { n } else { challenge.l().min(n) };

        let mut rhs = BigUint::zero();
        for i in 0..count {
            let index = if check_all { i } else { sample_index(&indexer, i) };
            rhs = (rhs + v.evaluate(i) * f.evaluate(index)) % &self.p;
        }
        for (j, mu_j) in proof.mu().iter().enumerate() {
            rhs = (rhs + alpha.evaluate(j as u32) * mu_j) % &self.p;
        }

        Ok(*proof.sigma() == rhs)
    }
}

/// Draw the chunk index for challenge position `i`.
fn sample_index(indexer: &Prf, i: u32) -> u32 {
    // The sample is below the indexer limit, which is a chunk count.
    indexer.evaluate(i).to_u32().unwrap_or(0)
}

impl Wire for Heartbeat {
    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut flags = 0u8;
        if self.is_public {
            flags |= FLAG_PUBLIC;
        }
        out.push(flags);

        if !self.is_public {
            put_u32(out, KEY_SIZE as u32);
            out.extend_from_slice(&self.k_enc[..]);
            put_u32(out, KEY_SIZE as u32);
            out.extend_from_slice(&self.k_mac[..]);
        }

        put_u32(out, self.sectors);
        put_u32(out, self.sector_size);
        put_bigint(out, &self.p);
        Ok(())
    }

    fn deserialize(r: &mut ByteReader<'_>) -> Result<Self> {
        let flags = r.get_u8("heartbeat flags")?;
        if flags & !FLAG_PUBLIC != 0 {
            return Err(PorError::Deserialization(format!(
                "unknown heartbeat flags 0x{flags:02x}"
            )));
        }
        let is_public = flags & FLAG_PUBLIC != 0;

        let mut k_enc = Zeroizing::new([0u8; KEY_SIZE]);
        let mut k_mac = Zeroizing::new([0u8; KEY_SIZE]);
        if !is_public {
            for key in [&mut k_enc, &mut k_mac] {
                let key_len = r.get_u32("key size")? as usize;
                if key_len != KEY_SIZE {
                    return Err(PorError::Deserialization(format!(
                        "incompatible key size {key_len}, expected {KEY_SIZE}"
                    )));
                }
                key.copy_from_slice(r.take(KEY_SIZE, "heartbeat key")?);
            }
        }

        let sectors = r.get_u32("sector count")?;
        let sector_size = r.get_u32("sector size")?;
        if sectors == 0 || sector_size == 0 {
            return Err(PorError::Deserialization(
                "sector geometry must be positive".into(),
            ));
        }
        let p = get_bigint(r, "prime modulus")?;
        if p.is_zero() {
            return Err(PorError::Deserialization("prime modulus is zero".into()));
        }

        // The check fraction is deliberately not on the wire; peers using a
        // non-default fraction agree on it out-of-band.
        Ok(Self {
            p,
            sectors,
            sector_size,
            check_fraction: DEFAULT_CHECK_FRACTION,
            k_enc,
            k_mac,
            is_public,
        })
    }
}

impl PartialEq for Heartbeat {
    fn eq(&self, other: &Self) -> bool {
        self.p == other.p
            && self.sectors == other.sectors
            && self.sector_size == other.sector_size
            && self.check_fraction == other.check_fraction
            && self.is_public == other.is_public
            && *self.k_enc == *other.k_enc
            && *self.k_mac == *other.k_mac
    }
}

impl fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heartbeat")
            .field("bits", &self.p.bits())
            .field("sectors", &self.sectors)
            .field("sector_size", &self.sector_size)
            .field("check_fraction", &self.check_fraction)
            .field("public", &self.is_public)
            .finish()
    }
}
