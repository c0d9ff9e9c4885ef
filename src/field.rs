//! Modular arithmetic over a per-race modulus.
//!
//! The race modulus is arbitrary precision (write-ins can push it well
//! past 64 bits), so elements are backed by [`num_bigint::BigUint`]. The
//! modulus is never global state: every operation takes a [`Modulus`] by
//! reference rather than held as a process-wide static.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;
use serde::Deserialize;
use std::fmt;

/// A prime modulus `m` for one race, plus its canonical big-endian byte
/// width (used to pad field-element encodings so commitments to the same
/// race are directly comparable).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modulus {
    m: BigUint,
    byte_len: usize,
}

impl Modulus {
    /// Wrap a modulus value, precomputing its canonical byte width.
    pub fn new(m: BigUint) -> Self {
        let byte_len = m.to_bytes_be().len().max(1);
        Modulus { m, byte_len }
    }

    /// The modulus value itself.
    pub fn value(&self) -> &BigUint {
        &self.m
    }

    /// Canonical big-endian byte width for elements reduced mod `m`.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

impl fmt::Display for Modulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.m)
    }
}

impl serde::Serialize for Modulus {
    /// Decimal string, so a posted or archived modulus round-trips
    /// exactly regardless of its bit width.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.m.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Modulus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let m = s
            .parse::<BigUint>()
            .map_err(|e| serde::de::Error::custom(format!("invalid modulus `{s}`: {e}")))?;
        Ok(Modulus::new(m))
    }
}

/// A field element in `[0, m)` for some race's [`Modulus`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldElem(BigUint);

impl FieldElem {
    /// Wrap a value already known to be in `[0, m)`. Callers that cannot
    /// guarantee this should use [`FieldElem::reduce`] instead.
    pub fn new_unchecked(v: BigUint) -> Self {
        FieldElem(v)
    }

    /// Reduce an arbitrary non-negative integer modulo `m`.
    pub fn reduce(v: &BigUint, modulus: &Modulus) -> Self {
        FieldElem(v % &modulus.m)
    }

    /// The zero element.
    pub fn zero() -> Self {
        FieldElem(BigUint::zero())
    }

    /// Construct from a small integer, reducing modulo `m`.
    pub fn from_u64(v: u64, modulus: &Modulus) -> Self {
        FieldElem::reduce(&BigUint::from(v), modulus)
    }

    /// Draw a uniform element of `[0, m)` using the supplied CSPRNG.
    pub fn random(rng: &mut (impl RngCore + ?Sized), modulus: &Modulus) -> Self {
        FieldElem(rng.gen_biguint_below(&modulus.m))
    }

    /// `self + other (mod m)`.
    pub fn add(&self, other: &FieldElem, modulus: &Modulus) -> FieldElem {
        FieldElem((&self.0 + &other.0) % &modulus.m)
    }

    /// `self - other (mod m)`, always non-negative.
    pub fn sub(&self, other: &FieldElem, modulus: &Modulus) -> FieldElem {
        let m = &modulus.m;
        let lhs = &self.0 % m;
        let rhs = &other.0 % m;
        if lhs >= rhs {
            FieldElem(lhs - rhs)
        } else {
            FieldElem(m - (rhs - lhs))
        }
    }

    /// Canonical fixed-width big-endian encoding for this race's modulus.
    pub fn to_bytes(&self, modulus: &Modulus) -> Vec<u8> {
        let raw = self.0.to_bytes_be();
        let mut out = vec![0u8; modulus.byte_len()];
        let start = out.len() - raw.len();
        out[start..].copy_from_slice(&raw);
        out
    }

    /// Decode a canonical fixed-width big-endian encoding back into a
    /// reduced field element.
    pub fn from_bytes(bytes: &[u8], modulus: &Modulus) -> Self {
        FieldElem::reduce(&BigUint::from_bytes_be(bytes), modulus)
    }

    /// The underlying integer value.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Display for FieldElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for FieldElem {
    /// Decimal string, per the canonical-JSON rule that "integers in
    /// decimal" applies even to values too large for a JSON number.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for FieldElem {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let v = s
            .parse::<BigUint>()
            .map_err(|e| serde::de::Error::custom(format!("invalid field element `{s}`: {e}")))?;
        Ok(FieldElem(v))
    }
}

/// Small-prime trial division table used to fast-reject obvious
/// composites before paying for Miller-Rabin.
const SMALL_PRIMES: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Miller-Rabin probabilistic primality test with a fixed witness count,
/// grounded in the trial-division-then-Miller-Rabin pattern used by
/// from-scratch `BigUint` primality checks in the pack (Paillier key
/// generation's `math.rs`). `rounds` independent random bases are tried;
/// composite detection is certain, false positives are bounded by
/// `4^-rounds`.
pub fn is_probable_prime(n: &BigUint, rng: &mut impl RngCore, rounds: usize) -> bool {
    if *n < BigUint::from(2u64) {
        return false;
    }
    for &p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if *n == p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    // n - 1 = 2^s * d, d odd
    let one = BigUint::one();
    let n_minus_one = n - &one;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    'witness: for _ in 0..rounds {
        // base in [2, n-2]
        let a = rng.gen_biguint_range(&BigUint::from(2u64), &(n - &BigUint::from(2u64)));
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 0..s.saturating_sub(1) {
            x = x.modpow(&BigUint::from(2u64), n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Smallest prime `>= lower_bound`, used to derive a race modulus from
/// the encoded-choice upper bound.
pub fn next_probable_prime(lower_bound: &BigUint, rng: &mut impl RngCore) -> BigUint {
    let mut candidate = lower_bound.clone();
    if candidate.is_even() && candidate != BigUint::from(2u64) {
        candidate += BigUint::one();
    }
    loop {
        if is_probable_prime(&candidate, rng, 40) {
            return candidate;
        }
        candidate += if candidate.is_even() { BigUint::one() } else { BigUint::from(2u64) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(7)
    }

    #[test]
    fn known_primes_pass() {
        let mut r = rng();
        for p in [2u64, 3, 5, 97, 65537] {
            assert!(is_probable_prime(&BigUint::from(p), &mut r, 40), "{p} should be prime");
        }
    }

    #[test]
    fn known_composites_fail() {
        let mut r = rng();
        for c in [4u64, 6, 8, 9, 100, 65536] {
            assert!(!is_probable_prime(&BigUint::from(c), &mut r, 40), "{c} should be composite");
        }
    }

    #[test]
    fn next_prime_at_least_lower_bound() {
        let mut r = rng();
        let p = next_probable_prime(&BigUint::from(100u64), &mut r);
        assert!(p >= BigUint::from(100u64));
        assert!(is_probable_prime(&p, &mut r, 40));
    }

    #[test]
    fn add_sub_roundtrip_preserves_sum() {
        let modulus = Modulus::new(BigUint::from(101u64));
        let mut r = rng();
        let u = FieldElem::random(&mut r, &modulus);
        let v = FieldElem::random(&mut r, &modulus);
        let sum = u.add(&v, &modulus);
        let back = sum.sub(&v, &modulus);
        assert_eq!(back, FieldElem::reduce(u.as_biguint(), &modulus));
    }

    #[test]
    fn fixed_width_encoding_roundtrips() {
        let modulus = Modulus::new(BigUint::from(65537u64));
        let v = FieldElem::from_u64(42, &modulus);
        let bytes = v.to_bytes(&modulus);
        assert_eq!(bytes.len(), modulus.byte_len());
        assert_eq!(FieldElem::from_bytes(&bytes, &modulus), v);
    }
}
