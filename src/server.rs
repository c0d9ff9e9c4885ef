//! The mix-net server grid: column 0 holds voter-cast shares, replicated
//! across rows for fault tolerance; each of the `n_reps` independent
//! passes mixes column 0 into its own output column under a uniform
//! permutation and per-position re-randomization.

use crate::commitment::{self, Commitment, Randomizer};
use crate::error::Error;
use crate::field::{FieldElem, Modulus};
use crate::proof::PassLabel;
use crate::rng::CsprngSource;
use crate::sbb::Position;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A row label (`a`, `b`, `c`, ...), one per redundant server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowLabel(char);

impl RowLabel {
    /// Wrap a lowercase ASCII letter as a row label.
    pub fn new(c: char) -> Result<RowLabel, Error> {
        if c.is_ascii_lowercase() {
            Ok(RowLabel(c))
        } else {
            Err(Error::config_invalid(format!("row label `{c}` is not a..z")))
        }
    }

    /// The underlying character.
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl serde::Serialize for RowLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for RowLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        let c = chars.next().ok_or_else(|| serde::de::Error::custom("empty row label"))?;
        if chars.next().is_some() {
            return Err(serde::de::Error::custom(format!("row label `{s}` is not one character")));
        }
        RowLabel::new(c).map_err(serde::de::Error::custom)
    }
}

/// Row count tolerating `n_fail` simultaneous failures and `n_leak`
/// simultaneous leakages: one more row than the combined tolerance, so
/// at least one row remains both live and unleaked.
pub fn row_count(n_fail: usize, n_leak: usize) -> usize {
    n_fail + n_leak + 1
}

/// Build the first `n` row labels, `a..`. Fails if more than 26 are
/// requested, since row labels are single lowercase letters.
pub fn row_labels(n: usize) -> Result<Vec<RowLabel>, Error> {
    if n == 0 || n > 26 {
        return Err(Error::config_invalid(format!(
            "row count {n} must be in 1..=26"
        )));
    }
    Ok((0..n).map(|i| RowLabel((b'a' + i as u8) as char)).collect())
}

/// A cast-vote record as stored in one grid cell.
#[derive(Clone, Debug)]
pub struct Cell {
    /// Ballot id this share belongs to.
    pub ballot_id: String,
    /// First share.
    pub u: FieldElem,
    /// Second share.
    pub v: FieldElem,
    /// Randomizer for `u`'s commitment.
    pub ru: Randomizer,
    /// Randomizer for `v`'s commitment.
    pub rv: Randomizer,
    /// Commitment to `u`.
    pub cu: Commitment,
    /// Commitment to `v`.
    pub cv: Commitment,
}

impl Cell {
    /// Build a cell from shares and randomizers, computing commitments.
    pub fn new(
        ballot_id: String,
        u: FieldElem,
        v: FieldElem,
        ru: Randomizer,
        rv: Randomizer,
        modulus: &Modulus,
    ) -> Cell {
        let cu = commitment::commit(&u, modulus, &ru);
        let cv = commitment::commit(&v, modulus, &rv);
        Cell { ballot_id, u, v, ru, rv, cu, cv }
    }
}

/// One column, replicated across rows: row label -> position -> cell.
pub type Column = BTreeMap<RowLabel, BTreeMap<Position, Cell>>;

/// A cell reduced to what the SBB actually publishes before any
/// proof-time disclosure: the ballot id and the two commitments, never
/// the plaintext shares or randomizers.
#[derive(Clone, Debug, serde::Serialize, Deserialize)]
pub struct CommitmentCell {
    /// Ballot id this share belongs to.
    pub ballot_id: String,
    /// Commitment to `u`.
    pub cu: Commitment,
    /// Commitment to `v`.
    pub cv: Commitment,
}

/// A column as visible to a verifier: commitments only.
pub type CommitmentColumn = BTreeMap<RowLabel, BTreeMap<Position, CommitmentCell>>;

/// Strip plaintext shares and randomizers from a column, leaving only
/// what is ever posted to the bulletin board prior to proof disclosure.
pub fn commitments_only(column: &Column) -> CommitmentColumn {
    column
        .iter()
        .map(|(row, by_position)| {
            let stripped = by_position
                .iter()
                .map(|(pos, cell)| {
                    (
                        pos.clone(),
                        CommitmentCell {
                            ballot_id: cell.ballot_id.clone(),
                            cu: cell.cu,
                            cv: cell.cv,
                        },
                    )
                })
                .collect();
            (*row, stripped)
        })
        .collect()
}

/// The record of one independent mix pass: its disclosed-at-proof-time
/// permutation and deltas, plus the output column they produce.
#[derive(Clone, Debug)]
pub struct MixPass {
    /// This pass's label (`A`, `B`, ...).
    pub label: PassLabel,
    /// Input position -> output position bijection.
    pub permutation: BTreeMap<Position, Position>,
    /// Per-input-position re-randomization delta.
    pub deltas: BTreeMap<Position, FieldElem>,
    /// The resulting output column, keyed by output position.
    pub output: Column,
}

/// The per-race grid: column 0 plus whatever mix passes have been run
/// against it.
#[derive(Debug)]
pub struct Grid {
    race_id: String,
    rows: Vec<RowLabel>,
    col0: Column,
}

impl Grid {
    /// Build an empty grid for `race_id` over the given rows.
    pub fn new(race_id: impl Into<String>, rows: Vec<RowLabel>) -> Grid {
        Grid { race_id: race_id.into(), rows, col0: BTreeMap::new() }
    }

    /// The race this grid belongs to.
    pub fn race_id(&self) -> &str {
        &self.race_id
    }

    /// The grid's row labels.
    pub fn rows(&self) -> &[RowLabel] {
        &self.rows
    }

    /// Write a voter-cast share into column 0.
    pub fn set_col0_cell(&mut self, row: RowLabel, position: Position, cell: Cell) {
        self.col0.entry(row).or_default().insert(position, cell);
    }

    /// Column 0 itself.
    pub fn col0(&self) -> &Column {
        &self.col0
    }

    /// The sorted position set, read off the first row (all rows share
    /// the same position set by grid construction).
    pub fn positions(&self) -> Vec<Position> {
        match self.rows.first().and_then(|r| self.col0.get(r)) {
            Some(by_position) => by_position.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Run one independent mix pass: draw a uniform permutation of the
    /// position set and, for every position, a re-randomization delta;
    /// apply both identically across every row so that redundant rows
    /// stay consistent with each other.
    pub fn mix_pass(
        &self,
        rng: &mut impl CsprngSource,
        modulus: &Modulus,
        label: PassLabel,
    ) -> MixPass {
        let positions = self.positions();

        let mut shuffled = positions.clone();
        fisher_yates_shuffle(&mut shuffled, rng);
        let permutation: BTreeMap<Position, Position> =
            positions.iter().cloned().zip(shuffled.into_iter()).collect();

        let deltas: BTreeMap<Position, FieldElem> = positions
            .iter()
            .cloned()
            .map(|p| (p, FieldElem::random(rng, modulus)))
            .collect();

        let mut output: Column = BTreeMap::new();
        for &row in &self.rows {
            let input_row = self.col0.get(&row).expect("row present in column 0");
            let mut output_row = BTreeMap::new();
            for pos in &positions {
                let cell = &input_row[pos];
                let delta = &deltas[pos];
                let u_prime = cell.u.add(delta, modulus);
                let v_prime = cell.v.sub(delta, modulus);
                let ru_prime = Randomizer::random(rng);
                let rv_prime = Randomizer::random(rng);
                let out_cell = Cell::new(
                    cell.ballot_id.clone(),
                    u_prime,
                    v_prime,
                    ru_prime,
                    rv_prime,
                    modulus,
                );
                let out_pos = permutation[pos].clone();
                output_row.insert(out_pos, out_cell);
            }
            output.insert(row, output_row);
        }

        MixPass { label, permutation, deltas, output }
    }
}

/// In-place Fisher-Yates shuffle using the injected CSPRNG.
fn fisher_yates_shuffle<T>(items: &mut [T], rng: &mut impl CsprngSource) {
    for i in (1..items.len()).rev() {
        let j = (rng.next_u64() as usize) % (i + 1);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;
    use num_bigint::BigUint;

    fn make_grid(modulus: &Modulus, n_positions: usize) -> Grid {
        let mut rng = seeded_rng(42);
        let rows = row_labels(1).unwrap();
        let mut grid = Grid::new("P", rows.clone());
        for i in 0..n_positions {
            let pos = Position::new(i, n_positions);
            let u = FieldElem::random(&mut rng, modulus);
            let v = FieldElem::from_u64(5, modulus).sub(&u, modulus);
            let ru = Randomizer::random(&mut rng);
            let rv = Randomizer::random(&mut rng);
            let cell = Cell::new(format!("ballot{i}"), u, v, ru, rv, modulus);
            grid.set_col0_cell(rows[0], pos, cell);
        }
        grid
    }

    #[test]
    fn mix_preserves_share_sum() {
        let modulus = Modulus::new(BigUint::from(10007u64));
        let grid = make_grid(&modulus, 5);
        let mut rng = seeded_rng(1);
        let pass = grid.mix_pass(&mut rng, &modulus, PassLabel::new('A').unwrap());
        for row_cells in pass.output.values() {
            for cell in row_cells.values() {
                assert_eq!(cell.u.add(&cell.v, &modulus), FieldElem::from_u64(5, &modulus));
            }
        }
    }

    #[test]
    fn mix_permutation_is_a_bijection() {
        let modulus = Modulus::new(BigUint::from(10007u64));
        let grid = make_grid(&modulus, 6);
        let mut rng = seeded_rng(2);
        let pass = grid.mix_pass(&mut rng, &modulus, PassLabel::new('A').unwrap());
        let mut images: Vec<&Position> = pass.permutation.values().collect();
        images.sort();
        images.dedup();
        assert_eq!(images.len(), pass.permutation.len());
    }

    #[test]
    fn row_count_covers_combined_fail_and_leak_tolerance() {
        assert_eq!(row_count(2, 1), 4);
        assert_eq!(row_count(0, 0), 1);
    }

    #[test]
    fn row_labels_reject_more_than_26() {
        assert!(row_labels(27).is_err());
        assert!(row_labels(0).is_err());
    }
}
