//! Voter: split-value encoding of a chosen ballot into per-row shares,
//! plus the public receipt that lets a voter later locate their own
//! vote on the bulletin board.

use crate::commitment::Randomizer;
use crate::error::Error;
use crate::field::FieldElem;
use crate::race::Race;
use crate::rng::CsprngSource;
use crate::sbb::Position;
use crate::server::{Cell, RowLabel};
use std::collections::BTreeMap;

/// A voter's public receipt, posted under `casting:receipts`. It carries
/// only the ballot id and its location, never the choice itself — an
/// implementation MUST NOT let the SBB link a ballot id to a voter
/// identity.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Receipt {
    /// The ballot id this receipt locates.
    pub ballot_id: String,
    /// Race the ballot was cast in.
    pub race_id: String,
    /// Position (p-list slot) of the cast-vote record.
    pub position: String,
}

/// One fully split-value-encoded vote, ready to be written into column 0
/// of the server grid for every row it is destined for.
pub struct CastVote {
    /// The public receipt for this vote.
    pub receipt: Receipt,
    /// Per-row cast-vote cells (identical by default; see
    /// [`cast_vote_with_shares`] for the generalization that lets them
    /// differ).
    pub rows: BTreeMap<RowLabel, Cell>,
}

/// Split `choice` for `race` into shares `(u, v)` with `u + v ≡ choice
/// (mod m)`, commit to both, and write an identical copy of the
/// resulting cell into every row of `rows`.
pub fn cast_vote(
    rng: &mut impl CsprngSource,
    race: &Race,
    choice: &str,
    position: &Position,
    rows: &[RowLabel],
    ballot_id_len: usize,
) -> Result<CastVote, Error> {
    let (u, v) = split_shares(rng, race, choice)?;
    let shares: BTreeMap<RowLabel, (FieldElem, FieldElem)> =
        rows.iter().map(|&r| (r, (u.clone(), v.clone()))).collect();
    cast_vote_with_shares(rng, race, &shares, position, ballot_id_len)
}

/// The generalized form of [`cast_vote`]: the caller supplies a
/// (possibly distinct) `(u, v)` pair per row, each of which MUST already
/// sum to the same encoded choice. This is the hook the protocol
/// requires a real implementation to expose, even though the
/// simulated default writes identical copies everywhere.
pub fn cast_vote_with_shares(
    rng: &mut impl CsprngSource,
    race: &Race,
    shares: &BTreeMap<RowLabel, (FieldElem, FieldElem)>,
    position: &Position,
    ballot_id_len: usize,
) -> Result<CastVote, Error> {
    let ballot_id = hex::encode(crate::rng::random_bytes(rng, ballot_id_len));
    let modulus = race.modulus();

    let mut rows = BTreeMap::new();
    for (&row, (u, v)) in shares {
        let ru = Randomizer::random(rng);
        let rv = Randomizer::random(rng);
        let cell = Cell::new(ballot_id.clone(), u.clone(), v.clone(), ru, rv, modulus);
        rows.insert(row, cell);
    }

    let receipt = Receipt {
        ballot_id: ballot_id.clone(),
        race_id: race.race_id().to_string(),
        position: position.to_string(),
    };

    Ok(CastVote { receipt, rows })
}

/// Draw `u` uniformly and derive `v = choice - u (mod m)`. Fails with
/// [`Error::EncodingTooLarge`] if `choice` does not
/// encode within the race's modulus.
fn split_shares(
    rng: &mut impl CsprngSource,
    race: &Race,
    choice: &str,
) -> Result<(FieldElem, FieldElem), Error> {
    let target = race.encode(choice)?;
    let modulus = race.modulus();
    let u = FieldElem::random(rng, modulus);
    let v = target.sub(&u, modulus);
    Ok((u, v))
}
