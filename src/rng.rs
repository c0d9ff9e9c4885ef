//! Injected CSPRNG source.
//!
//! The protocol requires a single cryptographic entropy source, seeded
//! once per election, threaded through voter, server and proof
//! construction rather than reached for as process-wide state. Tests
//! substitute a seeded, deterministic source so that
//! reproducibility scenarios (same seed ⇒ byte-identical SBB transcript)
//! are checkable without touching OS entropy.

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// A CSPRNG usable throughout the protocol. Blanket-implemented for any
/// `RngCore + CryptoRng`, so `rand::rngs::OsRng` and the seeded
/// [`ChaCha20Rng`] below are interchangeable at call sites.
pub trait CsprngSource: RngCore + CryptoRng {}
impl<T: RngCore + CryptoRng> CsprngSource for T {}

/// Construct a production entropy source (OS CSPRNG).
pub fn os_rng() -> impl CsprngSource {
    rand::rngs::OsRng
}

/// Construct a deterministic, seeded entropy source for reproducible
/// runs (scenario S6: two elections seeded identically must produce
/// byte-identical SBB transcripts).
pub fn seeded_rng(seed: u64) -> impl CsprngSource {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Draw `len` uniform random bytes, used for ballot ids and randomizers.
pub fn random_bytes(rng: &mut impl CsprngSource, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rng.fill_bytes(&mut buf);
    buf
}
