//! A split-value voting protocol: the Rabin-Rivest design in which each
//! cast vote is additively split into two shares, shuffled through
//! independent mix-net passes, and opened under cut-and-choose so that
//! no single disclosed pass ever links a ballot to its choice.
//!
//! Invariants this crate upholds end to end:
//!
//! - every value ever written to the bulletin board is either a
//!   commitment or a disclosure the protocol has already decided is safe
//!   to reveal — plaintext shares never reach [`sbb`] before their pass
//!   is assigned to the Input-Comparison List;
//! - the race modulus, mix permutations, and commitment randomizers are
//!   always threaded as explicit values, never held in global or
//!   thread-local state;
//! - randomness is always drawn through an injected [`rng::CsprngSource`],
//!   so a run is exactly reproducible given the same seed.
//!
//! Module map: [`field`] and [`commitment`] provide the arithmetic and
//! commitment primitives; [`race`] models one race's ballot style and
//! modulus; [`voter`] splits a chosen vote into shares; [`server`] holds
//! the mix-net grid; [`proof`] implements the cut-and-choose disclosure
//! and verification; [`tally`] aggregates the verified result; [`sbb`]
//! is the append-only public transcript; [`config`] and [`election`] tie
//! everything into one orchestrator run; [`verify`] replays that proof
//! independently of the orchestrator that produced it.

pub mod commitment;
pub mod config;
pub mod election;
pub mod error;
pub mod field;
pub mod proof;
pub mod race;
pub mod rng;
pub mod sbb;
pub mod server;
pub mod tally;
pub mod verify;
pub mod voter;

pub use error::Error;
