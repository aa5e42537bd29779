//! Cryptographic key types.
//!
//! Public keys are printed in the `PUB_K1_...` format; the legacy `EOS...` format is
//! accepted on input and available through [`PublicKey::to_legacy_string`]. Secret keys
//! accept both WIF and `PVT_K1_...`. Signatures use `SIG_K1_...`.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use k256::ecdsa::signature::hazmat::RandomizedPrehashSigner;
use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};
use k256::elliptic_curve::rand_core::{self, CryptoRng, RngCore};
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::Checksum256;
use crate::error::{ParseKeyError, SignerError};

/// Prefix of legacy public keys.
pub const LEGACY_PUBLIC_KEY_PREFIX: &str = "EOS";

const WIF_VERSION: u8 = 0x80;
const PUBLIC_KEY_LEN: usize = 33;
const SECRET_KEY_LEN: usize = 32;
const SIGNATURE_LEN: usize = 65;

/// Number of extra-entropy rounds tried before giving up on a canonical signature.
const MAX_CANONICAL_ATTEMPTS: u32 = 64;

/// Key type identifier (also the tag byte in the binary encoding).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum KeyType {
    /// secp256k1.
    K1 = 0,
    /// secp256r1. Parsed and serialized, but not used for signing.
    R1 = 1,
}

impl KeyType {
    /// Get the string suffix for this key type.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::K1 => "K1",
            KeyType::R1 => "R1",
        }
    }

    fn from_suffix(s: &str) -> Result<Self, ParseKeyError> {
        match s {
            "K1" => Ok(KeyType::K1),
            "R1" => Ok(KeyType::R1),
            other => Err(ParseKeyError::UnsupportedKeyType(other.to_string())),
        }
    }
}

impl TryFrom<u8> for KeyType {
    type Error = ParseKeyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyType::K1),
            1 => Ok(KeyType::R1),
            _ => Err(ParseKeyError::UnsupportedKeyType(value.to_string())),
        }
    }
}

// ============================================================================
// Checksummed base58
// ============================================================================

fn ripemd160(data: &[&[u8]]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    for chunk in data {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

fn encode_with_suffix(data: &[u8], suffix: &str) -> String {
    let checksum = ripemd160(&[data, suffix.as_bytes()]);
    let mut buf = data.to_vec();
    buf.extend_from_slice(&checksum[..4]);
    bs58::encode(buf).into_string()
}

fn decode_with_suffix(s: &str, suffix: &str, len: usize) -> Result<Vec<u8>, ParseKeyError> {
    let raw = decode_base58(s, len + 4)?;
    let (data, checksum) = raw.split_at(len);
    if ripemd160(&[data, suffix.as_bytes()])[..4] != *checksum {
        return Err(ParseKeyError::InvalidChecksum);
    }
    Ok(data.to_vec())
}

fn decode_base58(s: &str, expected: usize) -> Result<Vec<u8>, ParseKeyError> {
    let raw = bs58::decode(s)
        .into_vec()
        .map_err(|e| ParseKeyError::InvalidBase58(e.to_string()))?;
    if raw.len() != expected {
        return Err(ParseKeyError::InvalidLength {
            expected,
            actual: raw.len(),
        });
    }
    Ok(raw)
}

/// Split `PUB_K1_xxx` into (`K1`, `xxx`).
fn split_prefixed<'a>(s: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    s.strip_prefix(prefix)?
        .strip_prefix('_')?
        .split_once('_')
}

// ============================================================================
// PublicKey
// ============================================================================

/// A compressed elliptic-curve public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey {
    key_type: KeyType,
    data: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    /// Create a K1 key from 33 compressed SEC1 bytes.
    pub fn k1_from_bytes(bytes: &[u8]) -> Result<Self, ParseKeyError> {
        Self::from_parts(KeyType::K1, bytes)
    }

    fn from_parts(key_type: KeyType, bytes: &[u8]) -> Result<Self, ParseKeyError> {
        let data: [u8; PUBLIC_KEY_LEN] =
            bytes.try_into().map_err(|_| ParseKeyError::InvalidLength {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            })?;
        if key_type == KeyType::K1 {
            VerifyingKey::from_sec1_bytes(&data).map_err(|_| ParseKeyError::InvalidCurvePoint)?;
        }
        Ok(Self { key_type, data })
    }

    /// Get the key type.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Get the raw compressed key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Binary encoding: type tag followed by the key bytes.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + PUBLIC_KEY_LEN);
        out.push(self.key_type as u8);
        out.extend_from_slice(&self.data);
        out
    }

    /// Decode the binary encoding produced by [`to_packed`](Self::to_packed).
    pub fn from_packed(bytes: &[u8]) -> Result<Self, ParseKeyError> {
        let (tag, data) = bytes.split_first().ok_or(ParseKeyError::InvalidLength {
            expected: 1 + PUBLIC_KEY_LEN,
            actual: 0,
        })?;
        Self::from_parts(KeyType::try_from(*tag)?, data)
    }

    /// Legacy `EOS...` format (K1 only).
    pub fn to_legacy_string(&self) -> Option<String> {
        if self.key_type != KeyType::K1 {
            return None;
        }
        let checksum = ripemd160(&[&self.data]);
        let mut buf = self.data.to_vec();
        buf.extend_from_slice(&checksum[..4]);
        Some(format!(
            "{}{}",
            LEGACY_PUBLIC_KEY_PREFIX,
            bs58::encode(buf).into_string()
        ))
    }

    pub(crate) fn verifying_key(&self) -> Option<VerifyingKey> {
        match self.key_type {
            KeyType::K1 => VerifyingKey::from_sec1_bytes(&self.data).ok(),
            KeyType::R1 => None,
        }
    }
}

impl FromStr for PublicKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((suffix, body)) = split_prefixed(s, "PUB") {
            let key_type = KeyType::from_suffix(suffix)?;
            let data = decode_with_suffix(body, suffix, PUBLIC_KEY_LEN)?;
            return Self::from_parts(key_type, &data);
        }

        let body = s
            .strip_prefix(LEGACY_PUBLIC_KEY_PREFIX)
            .ok_or(ParseKeyError::InvalidFormat)?;
        let raw = decode_base58(body, PUBLIC_KEY_LEN + 4)?;
        let (data, checksum) = raw.split_at(PUBLIC_KEY_LEN);
        if ripemd160(&[data])[..4] != *checksum {
            return Err(ParseKeyError::InvalidChecksum);
        }
        Self::from_parts(KeyType::K1, data)
    }
}

impl TryFrom<&str> for PublicKey {
    type Error = ParseKeyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PUB_{}_{}",
            self.key_type.as_str(),
            encode_with_suffix(&self.data, self.key_type.as_str())
        )
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SecretKey
// ============================================================================

/// A secp256k1 secret key.
#[derive(Clone)]
pub struct SecretKey {
    key: SigningKey,
}

impl SecretKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create from raw 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseKeyError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(ParseKeyError::InvalidLength {
                expected: SECRET_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let key = SigningKey::from_slice(bytes).map_err(|_| ParseKeyError::InvalidCurvePoint)?;
        Ok(Self { key })
    }

    /// Get the raw 32 bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes().into()
    }

    /// Derive the public key.
    pub fn public_key(&self) -> PublicKey {
        let point = self.key.verifying_key().to_encoded_point(true);
        let mut data = [0u8; PUBLIC_KEY_LEN];
        data.copy_from_slice(point.as_bytes());
        PublicKey {
            key_type: KeyType::K1,
            data,
        }
    }

    /// Legacy WIF encoding.
    pub fn to_wif(&self) -> String {
        let mut buf = Vec::with_capacity(1 + SECRET_KEY_LEN + 4);
        buf.push(WIF_VERSION);
        buf.extend_from_slice(&self.to_bytes());
        let checksum = Sha256::digest(Sha256::digest(&buf));
        buf.extend_from_slice(&checksum[..4]);
        bs58::encode(buf).into_string()
    }

    /// Sign a 32-byte digest.
    ///
    /// Signing is deterministic (RFC 6979). The node only accepts canonical signatures,
    /// so non-canonical results are re-derived with a counter as extra nonce input.
    pub fn sign_digest(&self, digest: &Checksum256) -> Result<Signature, SignerError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
        let candidate = Signature::from_k256(&signature, recovery_id);
        if candidate.is_canonical() {
            return Ok(candidate);
        }

        for attempt in 1..=MAX_CANONICAL_ATTEMPTS {
            let mut nonce_data = NonceData(attempt);
            let signature: k256::ecdsa::Signature = self
                .key
                .sign_prehash_with_rng(&mut nonce_data, digest.as_bytes())
                .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
            let recovery_id = RecoveryId::trial_recovery_from_prehash(
                self.key.verifying_key(),
                digest.as_bytes(),
                &signature,
            )
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
            let candidate = Signature::from_k256(&signature, recovery_id);
            if candidate.is_canonical() {
                return Ok(candidate);
            }
        }

        Err(SignerError::SigningFailed(
            "could not produce a canonical signature".to_string(),
        ))
    }
}

impl FromStr for SecretKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((suffix, body)) = split_prefixed(s, "PVT") {
            if KeyType::from_suffix(suffix)? != KeyType::K1 {
                return Err(ParseKeyError::UnsupportedKeyType(suffix.to_string()));
            }
            let data = decode_with_suffix(body, suffix, SECRET_KEY_LEN)?;
            return Self::from_bytes(&data);
        }

        let raw = decode_base58(s, 1 + SECRET_KEY_LEN + 4)?;
        let (payload, checksum) = raw.split_at(1 + SECRET_KEY_LEN);
        if payload[0] != WIF_VERSION {
            return Err(ParseKeyError::InvalidFormat);
        }
        if Sha256::digest(Sha256::digest(payload))[..4] != *checksum {
            return Err(ParseKeyError::InvalidChecksum);
        }
        Self::from_bytes(&payload[1..])
    }
}

impl TryFrom<&str> for SecretKey {
    type Error = ParseKeyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PVT_K1_{}", encode_with_suffix(&self.to_bytes(), "K1"))
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(K1:***)")
    }
}

/// Deterministic "randomness" fed to RFC 6979 as additional data.
struct NonceData(u32);

impl RngCore for NonceData {
    fn next_u32(&mut self) -> u32 {
        self.0
    }

    fn next_u64(&mut self) -> u64 {
        self.0 as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
        let counter = self.0.to_be_bytes();
        let n = counter.len().min(dest.len());
        dest[..n].copy_from_slice(&counter[..n]);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for NonceData {}

// ============================================================================
// Signature
// ============================================================================

/// A compact recoverable signature: recovery byte, r, s.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    key_type: KeyType,
    data: [u8; SIGNATURE_LEN],
}

impl Signature {
    fn from_k256(signature: &k256::ecdsa::Signature, recovery_id: RecoveryId) -> Self {
        let mut data = [0u8; SIGNATURE_LEN];
        // 27 + 4 marks a compressed public key
        data[0] = 27 + 4 + recovery_id.to_byte();
        data[1..].copy_from_slice(&signature.to_bytes());
        Self {
            key_type: KeyType::K1,
            data,
        }
    }

    fn from_parts(key_type: KeyType, bytes: &[u8]) -> Result<Self, ParseKeyError> {
        let data: [u8; SIGNATURE_LEN] =
            bytes.try_into().map_err(|_| ParseKeyError::InvalidLength {
                expected: SIGNATURE_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self { key_type, data })
    }

    /// Get the key type.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Get the raw 65 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Binary encoding: type tag followed by the signature bytes.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + SIGNATURE_LEN);
        out.push(self.key_type as u8);
        out.extend_from_slice(&self.data);
        out
    }

    /// Decode the binary encoding produced by [`to_packed`](Self::to_packed).
    pub fn from_packed(bytes: &[u8]) -> Result<Self, ParseKeyError> {
        let (tag, data) = bytes.split_first().ok_or(ParseKeyError::InvalidLength {
            expected: 1 + SIGNATURE_LEN,
            actual: 0,
        })?;
        Self::from_parts(KeyType::try_from(*tag)?, data)
    }

    /// Whether r and s are both in canonical (minimal, positive) form.
    pub fn is_canonical(&self) -> bool {
        let c = &self.data;
        c[1] & 0x80 == 0
            && !(c[1] == 0 && c[2] & 0x80 == 0)
            && c[33] & 0x80 == 0
            && !(c[33] == 0 && c[34] & 0x80 == 0)
    }

    fn to_k256(&self) -> Option<(k256::ecdsa::Signature, RecoveryId)> {
        if self.key_type != KeyType::K1 {
            return None;
        }
        let signature = k256::ecdsa::Signature::from_slice(&self.data[1..]).ok()?;
        let recovery_id = RecoveryId::from_byte(self.data[0].checked_sub(27)? & 0x03)?;
        Some((signature, recovery_id))
    }

    /// Recover the public key that produced this signature over `digest`.
    pub fn recover(&self, digest: &Checksum256) -> Option<PublicKey> {
        let (signature, recovery_id) = self.to_k256()?;
        let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &signature, recovery_id)
            .ok()?;
        PublicKey::k1_from_bytes(key.to_encoded_point(true).as_bytes()).ok()
    }

    /// Verify this signature over `digest` against `public_key`.
    pub fn verify(&self, digest: &Checksum256, public_key: &PublicKey) -> bool {
        use k256::ecdsa::signature::hazmat::PrehashVerifier;

        let (Some((signature, _)), Some(key)) = (self.to_k256(), public_key.verifying_key())
        else {
            return false;
        };
        key.verify_prehash(digest.as_bytes(), &signature).is_ok()
    }
}

impl FromStr for Signature {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (suffix, body) = split_prefixed(s, "SIG").ok_or(ParseKeyError::InvalidFormat)?;
        let key_type = KeyType::from_suffix(suffix)?;
        let data = decode_with_suffix(body, suffix, SIGNATURE_LEN)?;
        Self::from_parts(key_type, &data)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SIG_{}_{}",
            self.key_type.as_str(),
            encode_with_suffix(&self.data, self.key_type.as_str())
        )
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
