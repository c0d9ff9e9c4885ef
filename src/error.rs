//! Crate-wide error type.
//!
//! A single `thiserror`-derived enum covers every failure mode named in
//! the protocol design: bad configuration, encoding overflow, proof
//! verification failures, and RNG exhaustion. Every fallible entry point
//! in this crate returns `Result<_, Error>`; nothing here is recovered
//! locally (see [`crate::election`] for the abort-and-surface policy).

use std::fmt;

/// Errors that can abort an election run or fail proof verification.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A setup parameter violates the configuration contract.
    #[error("invalid configuration: {reason}")]
    ConfigInvalid {
        /// Human-readable explanation.
        reason: String,
    },

    /// A choice (including a write-in) does not fit in `[0, m)`.
    #[error("choice `{choice}` for race `{race_id}` does not encode within modulus")]
    EncodingTooLarge {
        /// Race the choice was cast in.
        race_id: String,
        /// The offending choice text.
        choice: String,
    },

    /// A posted commitment failed to open during proof verification.
    #[error("commitment mismatch for race `{race_id}`, position `{position}`, pass `{pass}`")]
    CommitmentMismatch {
        /// Race the mismatch occurred in.
        race_id: String,
        /// Position (p-list slot) of the mismatch.
        position: String,
        /// Pass label (`A`, `B`, ...) the mismatch occurred in.
        pass: char,
    },

    /// A disclosed permutation is not a bijection on the position set.
    #[error("permutation for pass `{pass}` is invalid: {reason}")]
    PermutationInvalid {
        /// Pass label the permutation belongs to.
        pass: char,
        /// Human-readable explanation (duplicate image, missing index, ...).
        reason: String,
    },

    /// OPL passes disagree on per-choice totals.
    #[error("OPL passes disagree on tally for race `{race_id}`")]
    TallyInconsistent {
        /// Race whose OPL passes disagree.
        race_id: String,
    },

    /// A post was attempted on a closed bulletin board.
    #[error("SBB for election `{election_id}` is closed")]
    SbbClosed {
        /// Election id of the closed board.
        election_id: String,
    },

    /// The entropy source failed to produce randomness.
    #[error("entropy source failure: {reason}")]
    RngFailure {
        /// Underlying reason, if available.
        reason: String,
    },
}

impl Error {
    /// Shorthand for [`Error::ConfigInvalid`].
    pub fn config_invalid(reason: impl fmt::Display) -> Self {
        Error::ConfigInvalid { reason: reason.to_string() }
    }
}
