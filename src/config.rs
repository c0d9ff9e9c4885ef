//! Typed, validated election configuration, expressed as a `validate()`
//! returning [`Error::ConfigInvalid`] rather than an assertion failure.

use crate::error::Error;
use crate::proof::ChallengeDerivation;

/// The full set of options the election orchestrator recognizes.
#[derive(Clone, Debug)]
pub struct ElectionParameters {
    /// Non-empty election identifier.
    pub election_id: String,
    /// Ordered `(race_id, raw_choices)` pairs; race ids must be unique.
    /// A raw choice string of all `*` characters denotes a write-in slot.
    pub ballot_style: Vec<(String, Vec<String>)>,
    /// Number of voters.
    pub n_voters: usize,
    /// Number of independent cut-and-choose passes; even, `<= 26`.
    pub n_reps: u8,
    /// Upper bound on simultaneous server-row failures tolerated.
    pub n_fail: usize,
    /// Upper bound on simultaneous server-row leakages tolerated.
    pub n_leak: usize,
    /// Ballot id length, in random bytes before hex encoding.
    pub ballot_id_len: usize,
    /// Canonical-JSON indent width (`0` = compact).
    pub json_indent: usize,
    /// How the ICL/OPL split is derived.
    pub challenge_derivation: ChallengeDerivation,
}

impl ElectionParameters {
    /// Construct parameters with the documented defaults for
    /// `ballot_id_len` (32), `json_indent` (0), and `challenge_derivation`
    /// (Fiat-Shamir), leaving the caller to fill in the rest.
    pub fn new(
        election_id: impl Into<String>,
        ballot_style: Vec<(String, Vec<String>)>,
        n_voters: usize,
        n_reps: u8,
        n_fail: usize,
        n_leak: usize,
    ) -> ElectionParameters {
        ElectionParameters {
            election_id: election_id.into(),
            ballot_style,
            n_voters,
            n_reps,
            n_fail,
            n_leak,
            ballot_id_len: 32,
            json_indent: 0,
            challenge_derivation: ChallengeDerivation::FiatShamir,
        }
    }

    /// Enforce every configuration constraint, failing fast with a
    /// human-readable reason.
    pub fn validate(&self) -> Result<(), Error> {
        if self.election_id.is_empty() {
            return Err(Error::config_invalid("election_id must be non-empty"));
        }
        if self.ballot_style.is_empty() {
            return Err(Error::config_invalid("ballot_style must name at least one race"));
        }
        let mut seen_ids = std::collections::BTreeSet::new();
        for (race_id, choices) in &self.ballot_style {
            if race_id.is_empty() {
                return Err(Error::config_invalid("race_id must be non-empty"));
            }
            if !seen_ids.insert(race_id.as_str()) {
                return Err(Error::config_invalid(format!("duplicate race_id `{race_id}`")));
            }
            if choices.is_empty() {
                return Err(Error::config_invalid(format!(
                    "race `{race_id}` has no choices"
                )));
            }
        }
        if self.n_voters == 0 {
            return Err(Error::config_invalid("n_voters must be positive"));
        }
        if self.n_reps == 0 || self.n_reps % 2 != 0 || self.n_reps > 26 {
            return Err(Error::config_invalid(
                "n_reps must be a positive even number <= 26",
            ));
        }
        if self.ballot_id_len == 0 {
            return Err(Error::config_invalid("ballot_id_len must be positive"));
        }
        if crate::server::row_count(self.n_fail, self.n_leak) > 26 {
            return Err(Error::config_invalid(
                "n_fail + n_leak + 1 must not exceed 26 server rows",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> ElectionParameters {
        ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            2,
            2,
            0,
            0,
        )
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base_params().validate().is_ok());
    }

    #[test]
    fn empty_election_id_is_invalid() {
        let mut p = base_params();
        p.election_id = String::new();
        assert!(p.validate().is_err());
    }

    #[test]
    fn duplicate_race_ids_are_invalid() {
        let mut p = base_params();
        p.ballot_style.push(("P".to_string(), vec!["X".to_string()]));
        assert!(p.validate().is_err());
    }

    #[test]
    fn odd_n_reps_is_invalid() {
        let mut p = base_params();
        p.n_reps = 3;
        assert!(p.validate().is_err());
    }

    #[test]
    fn zero_voters_is_invalid() {
        let mut p = base_params();
        p.n_voters = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn excessive_row_tolerance_is_invalid() {
        let mut p = base_params();
        p.n_fail = 20;
        p.n_leak = 20;
        assert!(p.validate().is_err());
    }
}
