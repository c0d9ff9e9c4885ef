//! Cut-and-choose proof engine: splits the `n_reps` mix passes into an
//! Input-Comparison List (ICL) and an Output-Production List (OPL), and
//! discloses exactly one side per pass so no single pass ever reveals
//! both the linkage and the tally-relevant plaintexts.

use crate::commitment::{self, Randomizer};
use crate::error::Error;
use crate::field::{FieldElem, Modulus};
use crate::sbb::Position;
use crate::server::{Column, CommitmentColumn, Grid, MixPass, RowLabel};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A pass label (`A`, `B`, ...), one per independent cut-and-choose copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassLabel(char);

impl PassLabel {
    /// Wrap an uppercase ASCII letter as a pass label.
    pub fn new(c: char) -> Result<PassLabel, Error> {
        if c.is_ascii_uppercase() {
            Ok(PassLabel(c))
        } else {
            Err(Error::config_invalid(format!("pass label `{c}` is not A..Z")))
        }
    }

    /// The underlying character.
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl serde::Serialize for PassLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for PassLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        let c = chars.next().ok_or_else(|| serde::de::Error::custom("empty pass label"))?;
        if chars.next().is_some() {
            return Err(serde::de::Error::custom(format!("pass label `{s}` is not one character")));
        }
        PassLabel::new(c).map_err(serde::de::Error::custom)
    }
}

/// Build the first `n_reps` pass labels, `A..`. `n_reps` must be even
/// and at most 26.
pub fn pass_labels(n_reps: u8) -> Result<Vec<PassLabel>, Error> {
    if n_reps == 0 || n_reps % 2 != 0 || n_reps > 26 {
        return Err(Error::config_invalid(format!(
            "n_reps {n_reps} must be a positive even number <= 26"
        )));
    }
    Ok((0..n_reps).map(|i| PassLabel((b'A' + i) as char)).collect())
}

/// How the ICL/OPL split is derived from `n_reps` passes. Both behaviors
/// below are implemented and selectable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeDerivation {
    /// First half of the sorted pass labels is ICL, second half OPL —
    /// matches the original simulation's literal, non-randomized split.
    /// Default-off: a deterministic split is not a real cut-and-choose
    /// challenge, only a stand-in for one.
    Fixed,
    /// Shuffle pass labels under a BLAKE3 hash of the SBB transcript
    /// state at the end of the mix phase, first half ICL; the default,
    /// production-grade choice.
    FiatShamir,
}

/// Split `passes` (already sorted) into `(icl, opl)` per `derivation`.
/// `transcript_digest` is the BLAKE3 hash of the SBB state at the end of
/// the mix phase; it is ignored for [`ChallengeDerivation::Fixed`].
pub fn split_icl_opl(
    passes: &[PassLabel],
    derivation: ChallengeDerivation,
    transcript_digest: [u8; 32],
) -> (Vec<PassLabel>, Vec<PassLabel>) {
    let half = passes.len() / 2;
    match derivation {
        ChallengeDerivation::Fixed => {
            (passes[..half].to_vec(), passes[half..].to_vec())
        }
        ChallengeDerivation::FiatShamir => {
            let mut shuffled = passes.to_vec();
            let mut rng = ChaCha20Rng::from_seed(transcript_digest);
            for i in (1..shuffled.len()).rev() {
                let j = (rng.next_u64() as usize) % (i + 1);
                shuffled.swap(i, j);
            }
            (shuffled[..half].to_vec(), shuffled[half..].to_vec())
        }
    }
}

/// An opened split-value share: plaintext shares and their randomizers.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OpenedShare {
    /// First share.
    pub u: FieldElem,
    /// Second share.
    pub v: FieldElem,
    /// Randomizer for `u`'s commitment.
    pub ru: Randomizer,
    /// Randomizer for `v`'s commitment.
    pub rv: Randomizer,
}

/// The output-side randomizers for one re-randomized cell. Disclosing
/// these does not reveal anything the verifier could not already derive
/// (the re-randomized values `u', v'` follow deterministically from the
/// disclosed input opening and delta); without them the verifier would
/// have no way to recompute the output commitment at all.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OutputRandomizers {
    /// Randomizer for the re-randomized `u'`'s commitment.
    pub ru: Randomizer,
    /// Randomizer for the re-randomized `v'`'s commitment.
    pub rv: Randomizer,
}

/// What an ICL pass discloses: the permutation, the re-randomization
/// deltas, the column-0 openings, and the output-side randomizers —
/// never the output plaintexts themselves.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct IclDisclosure {
    /// The disclosed pass.
    pub pass: PassLabel,
    /// Input position -> output position.
    pub permutation: BTreeMap<Position, Position>,
    /// Per-position re-randomization delta.
    pub deltas: BTreeMap<Position, FieldElem>,
    /// Column-0 openings, by row and position.
    pub inputs: BTreeMap<RowLabel, BTreeMap<Position, OpenedShare>>,
    /// Output-side randomizers, keyed by row and INPUT position (the
    /// corresponding output position is `permutation[position]`).
    pub output_randomizers: BTreeMap<RowLabel, BTreeMap<Position, OutputRandomizers>>,
}

/// What an OPL pass discloses: the output-column openings. No
/// permutation is revealed, hiding linkage to individual voters.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OplDisclosure {
    /// The disclosed pass.
    pub pass: PassLabel,
    /// Output-column openings, by row and position.
    pub outputs: BTreeMap<RowLabel, BTreeMap<Position, OpenedShare>>,
}

/// Disclose an ICL pass given the grid's column 0 and the pass's record.
pub fn disclose_icl(grid: &Grid, pass: &MixPass) -> IclDisclosure {
    let inputs = open_column(grid.col0());

    let mut output_randomizers: BTreeMap<RowLabel, BTreeMap<Position, OutputRandomizers>> =
        BTreeMap::new();
    for (row, by_position) in &pass.output {
        for (input_pos, out_pos) in &pass.permutation {
            if let Some(cell) = by_position.get(out_pos) {
                output_randomizers.entry(*row).or_default().insert(
                    input_pos.clone(),
                    OutputRandomizers { ru: cell.ru, rv: cell.rv },
                );
            }
        }
    }

    IclDisclosure {
        pass: pass.label,
        permutation: pass.permutation.clone(),
        deltas: pass.deltas.clone(),
        inputs,
        output_randomizers,
    }
}

/// Disclose an OPL pass given its record's output column.
pub fn disclose_opl(pass: &MixPass) -> OplDisclosure {
    OplDisclosure { pass: pass.label, outputs: open_column(&pass.output) }
}

fn open_column(column: &Column) -> BTreeMap<RowLabel, BTreeMap<Position, OpenedShare>> {
    column
        .iter()
        .map(|(row, by_position)| {
            let opened = by_position
                .iter()
                .map(|(pos, cell)| {
                    (
                        pos.clone(),
                        OpenedShare { u: cell.u.clone(), v: cell.v.clone(), ru: cell.ru, rv: cell.rv },
                    )
                })
                .collect();
            (*row, opened)
        })
        .collect()
}

/// A disclosed permutation must be a bijection on the position set.
pub fn validate_permutation(
    permutation: &BTreeMap<Position, Position>,
    pass: char,
) -> Result<(), Error> {
    let mut images: Vec<&Position> = permutation.values().collect();
    images.sort();
    let mut domain: Vec<&Position> = permutation.keys().collect();
    domain.sort();
    if images.len() != domain.len() {
        return Err(Error::PermutationInvalid {
            pass,
            reason: "image and domain sizes differ".to_string(),
        });
    }
    let mut dedup = images.clone();
    dedup.dedup();
    if dedup.len() != images.len() {
        return Err(Error::PermutationInvalid {
            pass,
            reason: "permutation is not injective".to_string(),
        });
    }
    if images != domain {
        return Err(Error::PermutationInvalid {
            pass,
            reason: "image set does not equal the position set".to_string(),
        });
    }
    Ok(())
}

/// Verify one ICL disclosure against the grid's recorded column-0
/// commitments and a pass's recorded output commitments: the input
/// openings must match their commitments, the permutation must be a
/// bijection, and applying it with the disclosed deltas must reproduce
/// the output column's commitments.
pub fn verify_icl(
    race_id: &str,
    disclosure: &IclDisclosure,
    col0: &CommitmentColumn,
    output: &CommitmentColumn,
    modulus: &Modulus,
) -> Result<(), Error> {
    validate_permutation(&disclosure.permutation, disclosure.pass.as_char())?;

    for (row, by_position) in &disclosure.inputs {
        let recorded_row = col0.get(row).ok_or_else(|| Error::CommitmentMismatch {
            race_id: race_id.to_string(),
            position: "*".to_string(),
            pass: disclosure.pass.as_char(),
        })?;
        let output_randomizers_row =
            disclosure.output_randomizers.get(row).ok_or_else(|| Error::PermutationInvalid {
                pass: disclosure.pass.as_char(),
                reason: format!("no output randomizers disclosed for row {}", row.as_char()),
            })?;
        for (pos, opened) in by_position {
            let recorded = recorded_row.get(pos).ok_or_else(|| Error::CommitmentMismatch {
                race_id: race_id.to_string(),
                position: pos.to_string(),
                pass: disclosure.pass.as_char(),
            })?;
            commitment::open(
                &recorded.cu,
                &opened.u,
                modulus,
                &opened.ru,
                race_id,
                pos.as_str(),
                disclosure.pass.as_char(),
            )?;
            commitment::open(
                &recorded.cv,
                &opened.v,
                modulus,
                &opened.rv,
                race_id,
                pos.as_str(),
                disclosure.pass.as_char(),
            )?;

            let delta = disclosure.deltas.get(pos).ok_or_else(|| Error::PermutationInvalid {
                pass: disclosure.pass.as_char(),
                reason: format!("no delta disclosed for position {pos}"),
            })?;
            let expected_out_pos =
                disclosure.permutation.get(pos).ok_or_else(|| Error::PermutationInvalid {
                    pass: disclosure.pass.as_char(),
                    reason: format!("no permutation image for position {pos}"),
                })?;
            let out_row = output.get(row).ok_or_else(|| Error::CommitmentMismatch {
                race_id: race_id.to_string(),
                position: expected_out_pos.to_string(),
                pass: disclosure.pass.as_char(),
            })?;
            let out_cell = out_row.get(expected_out_pos).ok_or_else(|| Error::CommitmentMismatch {
                race_id: race_id.to_string(),
                position: expected_out_pos.to_string(),
                pass: disclosure.pass.as_char(),
            })?;
            let out_randomizers =
                output_randomizers_row.get(pos).ok_or_else(|| Error::PermutationInvalid {
                    pass: disclosure.pass.as_char(),
                    reason: format!("no output randomizers disclosed for position {pos}"),
                })?;

            let u_prime = opened.u.add(delta, modulus);
            let v_prime = opened.v.sub(delta, modulus);
            if commitment::commit(&u_prime, modulus, &out_randomizers.ru) != out_cell.cu
                || commitment::commit(&v_prime, modulus, &out_randomizers.rv) != out_cell.cv
            {
                return Err(Error::CommitmentMismatch {
                    race_id: race_id.to_string(),
                    position: expected_out_pos.to_string(),
                    pass: disclosure.pass.as_char(),
                });
            }
        }
    }
    Ok(())
}

/// Verify one OPL disclosure against a pass's recorded output
/// commitments.
pub fn verify_opl(
    race_id: &str,
    disclosure: &OplDisclosure,
    output: &CommitmentColumn,
    modulus: &Modulus,
) -> Result<(), Error> {
    for (row, by_position) in &disclosure.outputs {
        let recorded_row = output.get(row).ok_or_else(|| Error::CommitmentMismatch {
            race_id: race_id.to_string(),
            position: "*".to_string(),
            pass: disclosure.pass.as_char(),
        })?;
        for (pos, opened) in by_position {
            let recorded = recorded_row.get(pos).ok_or_else(|| Error::CommitmentMismatch {
                race_id: race_id.to_string(),
                position: pos.to_string(),
                pass: disclosure.pass.as_char(),
            })?;
            commitment::open(
                &recorded.cu,
                &opened.u,
                modulus,
                &opened.ru,
                race_id,
                pos.as_str(),
                disclosure.pass.as_char(),
            )?;
            commitment::open(
                &recorded.cv,
                &opened.v,
                modulus,
                &opened.rv,
                race_id,
                pos.as_str(),
                disclosure.pass.as_char(),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;
    use crate::server::{commitments_only, row_labels, Cell, Grid};
    use num_bigint::BigUint;

    fn grid_with_pass(modulus: &Modulus, n: usize) -> (Grid, MixPass) {
        let mut rng = seeded_rng(9);
        let rows = row_labels(1).unwrap();
        let mut grid = Grid::new("P", rows.clone());
        for i in 0..n {
            let pos = Position::new(i, n);
            let u = FieldElem::random(&mut rng, modulus);
            let v = FieldElem::from_u64(3, modulus).sub(&u, modulus);
            let cell = Cell::new(
                format!("b{i}"),
                u,
                v,
                Randomizer::random(&mut rng),
                Randomizer::random(&mut rng),
                modulus,
            );
            grid.set_col0_cell(rows[0], pos, cell);
        }
        let pass = grid.mix_pass(&mut rng, modulus, PassLabel::new('A').unwrap());
        (grid, pass)
    }

    #[test]
    fn valid_icl_disclosure_verifies() {
        let modulus = Modulus::new(BigUint::from(10007u64));
        let (grid, pass) = grid_with_pass(&modulus, 4);
        let disclosure = disclose_icl(&grid, &pass);
        let col0 = commitments_only(grid.col0());
        let out = commitments_only(&pass.output);
        assert!(verify_icl("P", &disclosure, &col0, &out, &modulus).is_ok());
    }

    #[test]
    fn valid_opl_disclosure_verifies() {
        let modulus = Modulus::new(BigUint::from(10007u64));
        let (_grid, pass) = grid_with_pass(&modulus, 4);
        let disclosure = disclose_opl(&pass);
        let out = commitments_only(&pass.output);
        assert!(verify_opl("P", &disclosure, &out, &modulus).is_ok());
    }

    #[test]
    fn tampered_opl_value_is_rejected() {
        let modulus = Modulus::new(BigUint::from(10007u64));
        let (_grid, pass) = grid_with_pass(&modulus, 4);
        let mut disclosure = disclose_opl(&pass);
        for by_position in disclosure.outputs.values_mut() {
            for opened in by_position.values_mut() {
                opened.u = opened.u.add(&FieldElem::from_u64(1, &modulus), &modulus);
            }
        }
        let out = commitments_only(&pass.output);
        assert!(matches!(
            verify_opl("P", &disclosure, &out, &modulus),
            Err(Error::CommitmentMismatch { .. })
        ));
    }

    #[test]
    fn swapped_permutation_entries_are_rejected() {
        let modulus = Modulus::new(BigUint::from(10007u64));
        let (grid, pass) = grid_with_pass(&modulus, 4);
        let mut disclosure = disclose_icl(&grid, &pass);
        let keys: Vec<Position> = disclosure.permutation.keys().cloned().collect();
        let a = disclosure.permutation[&keys[0]].clone();
        let b = disclosure.permutation[&keys[1]].clone();
        disclosure.permutation.insert(keys[0].clone(), b);
        disclosure.permutation.insert(keys[1].clone(), a);
        let col0 = commitments_only(grid.col0());
        let out = commitments_only(&pass.output);
        assert!(verify_icl("P", &disclosure, &col0, &out, &modulus).is_err());
    }

    #[test]
    fn fixed_split_is_first_half_icl() {
        let passes = pass_labels(4).unwrap();
        let (icl, opl) = split_icl_opl(&passes, ChallengeDerivation::Fixed, [0u8; 32]);
        assert_eq!(icl, vec![passes[0], passes[1]]);
        assert_eq!(opl, vec![passes[2], passes[3]]);
    }

    #[test]
    fn fiat_shamir_split_is_half_and_half() {
        let passes = pass_labels(6).unwrap();
        let (icl, opl) = split_icl_opl(&passes, ChallengeDerivation::FiatShamir, [7u8; 32]);
        assert_eq!(icl.len(), 3);
        assert_eq!(opl.len(), 3);
    }

    #[test]
    fn pass_labels_reject_odd_or_too_large() {
        assert!(pass_labels(3).is_err());
        assert!(pass_labels(28).is_err());
    }
}
