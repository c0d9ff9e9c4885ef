//! The split-value commitment scheme `C(x, r) = H(x ‖ r)`.
//!
//! Encoding is canonical so that the same `(value, randomizer)` pair
//! always hashes to the same digest regardless of call site: field
//! elements are fixed-width big-endian (width fixed by the race's
//! [`Modulus`]), byte strings are length-prefixed: length-delimited
//! absorption into a `blake3::Hasher` rather than hoping two encodings
//! happen to agree.

use crate::field::{FieldElem, Modulus};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Parse a lowercase-hex string into a fixed `[u8; 32]`, the shape every
/// hash-sized value in this module round-trips through.
fn hex32(s: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(s).map_err(|e| format!("invalid hex `{s}`: {e}"))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| format!("expected 32 bytes, got {}", bytes.len() / 2))
}

/// Opaque commitment-blinding value, drawn fresh per commitment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Randomizer(pub [u8; 32]);

impl Randomizer {
    /// Draw a fresh randomizer from the supplied CSPRNG.
    pub fn random(rng: &mut (impl RngCore + ?Sized)) -> Self {
        let mut buf = [0u8; 32];
        rng.fill_bytes(&mut buf);
        Randomizer(buf)
    }

    /// Lowercase hex encoding, as required of byte strings in the SBB
    /// transcript.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Serialize for Randomizer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Randomizer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Randomizer(hex32(&s).map_err(serde::de::Error::custom)?))
    }
}

/// A binding, hiding commitment to a field element.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Commitment(pub [u8; 32]);

impl Serialize for Commitment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Commitment(hex32(&s).map_err(serde::de::Error::custom)?))
    }
}

impl Commitment {
    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Absorb a length-prefixed byte string into the hasher: an 8-byte
/// big-endian length followed by the bytes themselves. This is what
/// keeps fixed-width field-element encodings and variable-length
/// byte-string encodings from ever colliding with each other.
fn absorb_length_prefixed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// `commit(value, r) -> c`, with `value` encoded at the fixed width of
/// `modulus`.
pub fn commit(value: &FieldElem, modulus: &Modulus, r: &Randomizer) -> Commitment {
    let mut hasher = blake3::Hasher::new();
    absorb_length_prefixed(&mut hasher, &value.to_bytes(modulus));
    absorb_length_prefixed(&mut hasher, &r.0);
    let digest = hasher.finalize();
    Commitment(*digest.as_bytes())
}

/// Recompute and compare. Returns `Ok(())` on a match, or
/// [`crate::error::Error::CommitmentMismatch`] on mismatch — callers
/// supply the `race_id`/`position`/`pass` context since this primitive
/// has no notion of where in the grid it is being checked.
pub fn open(
    c: &Commitment,
    value: &FieldElem,
    modulus: &Modulus,
    r: &Randomizer,
    race_id: &str,
    position: &str,
    pass: char,
) -> Result<(), crate::error::Error> {
    if commit(value, modulus, r) == *c {
        Ok(())
    } else {
        Err(crate::error::Error::CommitmentMismatch {
            race_id: race_id.to_string(),
            position: position.to_string(),
            pass,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn commitment_opens_with_matching_value_and_randomizer() {
        let modulus = Modulus::new(BigUint::from(1009u64));
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let value = FieldElem::from_u64(42, &modulus);
        let r = Randomizer::random(&mut rng);
        let c = commit(&value, &modulus, &r);
        assert!(open(&c, &value, &modulus, &r, "P", "p0", 'A').is_ok());
    }

    #[test]
    fn commitment_rejects_wrong_value() {
        let modulus = Modulus::new(BigUint::from(1009u64));
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let value = FieldElem::from_u64(42, &modulus);
        let other = FieldElem::from_u64(43, &modulus);
        let r = Randomizer::random(&mut rng);
        let c = commit(&value, &modulus, &r);
        assert!(open(&c, &other, &modulus, &r, "P", "p0", 'A').is_err());
    }

    #[test]
    fn commitment_rejects_wrong_randomizer() {
        let modulus = Modulus::new(BigUint::from(1009u64));
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let value = FieldElem::from_u64(42, &modulus);
        let r1 = Randomizer::random(&mut rng);
        let r2 = Randomizer::random(&mut rng);
        let c = commit(&value, &modulus, &r1);
        assert!(open(&c, &value, &modulus, &r2, "P", "p0", 'A').is_err());
    }

    #[test]
    fn distinct_values_produce_distinct_commitments() {
        let modulus = Modulus::new(BigUint::from(1009u64));
        let r = Randomizer([7u8; 32]);
        let a = commit(&FieldElem::from_u64(1, &modulus), &modulus, &r);
        let b = commit(&FieldElem::from_u64(2, &modulus), &modulus, &r);
        assert_ne!(a, b);
    }
}
