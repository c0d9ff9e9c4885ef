//! The election orchestrator: a strictly sequential state machine that
//! drives casting, mixing, proof disclosure, and tallying, posting every
//! transition to the [`Sbb`].

use crate::commitment::Randomizer;
use crate::config::ElectionParameters;
use crate::error::Error;
use crate::field::FieldElem;
use crate::proof::{
    self, pass_labels, split_icl_opl, ChallengeDerivation, IclDisclosure, OplDisclosure, PassLabel,
};
use crate::race::{ChoiceSpec, Race};
use crate::rng::CsprngSource;
use crate::sbb::{Position, Sbb};
use crate::server::{commitments_only, row_count, row_labels, CommitmentColumn, Grid, RowLabel};
use crate::tally;
use crate::voter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A flattened, self-contained view of one race's proof material,
/// independent of the `Election` that produced it — this is what a
/// verifier needs, and no more. Serializable so it can be written to
/// and read back from a transcript file independently of the run that
/// produced it: a verifier gets only this, never the `Election` or its
/// RNG seed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RaceTranscript {
    /// The race, reconstructed from its `setup:races` posting.
    pub race: Race,
    /// Column-0 commitments, from `casting:votes`.
    pub col0: CommitmentColumn,
    /// Every pass's output commitments, from `mix:*`, keyed by pass.
    pub pass_outputs: BTreeMap<PassLabel, CommitmentColumn>,
    /// ICL disclosures, from `proof:icl`.
    pub icl: Vec<IclDisclosure>,
    /// OPL disclosures, from `proof:opl`.
    pub opl: Vec<OplDisclosure>,
    /// The posted tally, from `tally`.
    pub tally: BTreeMap<String, u64>,
}

/// The full proof artifact bundling every race's transcript — the
/// analogue of a bundled proof that carries its header, commitments, and
/// openings as one verifiable unit. This is the whole of what
/// `run_election` writes to disk and `verify_transcript` reads back.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transcript {
    /// This election's id.
    pub election_id: String,
    /// Per-race transcripts, keyed by race id.
    pub races: BTreeMap<String, RaceTranscript>,
}

/// The completed orchestrator state: the public transcript plus the
/// tallies it proves.
pub struct Election {
    sbb: Sbb,
    races: BTreeMap<String, Race>,
    col0: BTreeMap<String, CommitmentColumn>,
    pass_outputs: BTreeMap<String, BTreeMap<PassLabel, CommitmentColumn>>,
    icl: BTreeMap<String, Vec<IclDisclosure>>,
    opl: BTreeMap<String, Vec<OplDisclosure>>,
    tallies: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Everything `run_inner` produces besides the bulletin board itself,
/// which the caller already owns and stitches back in on success.
struct ElectionData {
    races: BTreeMap<String, Race>,
    col0: BTreeMap<String, CommitmentColumn>,
    pass_outputs: BTreeMap<String, BTreeMap<PassLabel, CommitmentColumn>>,
    icl: BTreeMap<String, Vec<IclDisclosure>>,
    opl: BTreeMap<String, Vec<OplDisclosure>>,
    tallies: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(Serialize)]
struct SetupStartPayload<'a> {
    election_id: &'a str,
}

#[derive(Serialize)]
struct RacePayload {
    race_id: String,
    choices: Vec<String>,
    modulus: String,
}

#[derive(Serialize)]
struct SetupRacesPayload {
    races: Vec<RacePayload>,
}

#[derive(Serialize)]
struct SetupVotersPayload {
    n_voters: usize,
    ballot_id_len: usize,
}

#[derive(Serialize)]
struct ReceiptEntry {
    race_id: String,
    position: String,
}

#[derive(Serialize)]
struct MixPayload<'a> {
    race_id: &'a str,
    pass: PassLabel,
    output: &'a CommitmentColumn,
}

#[derive(Serialize)]
struct TallyPayload<'a> {
    race_id: &'a str,
    totals: &'a BTreeMap<String, u64>,
}

#[derive(Serialize)]
struct ProofPayload<'a, D> {
    race_id: &'a str,
    disclosure: &'a D,
}

impl Election {
    /// Run a complete election: `votes[i]` maps `race_id -> choice_text`
    /// for the voter at position `i`. Every SBB posting in this crate is
    /// unstamped (`time_stamp = false`): wall-clock timestamps would
    /// make scenario S6's byte-identical-transcript requirement
    /// impossible to satisfy across two real runs, so this simulation
    /// treats every posting as reproducible setup data.
    pub fn run(
        params: &ElectionParameters,
        votes: &[BTreeMap<String, String>],
        rng: &mut impl CsprngSource,
    ) -> Result<Election, Error> {
        params.validate()?;
        if votes.len() != params.n_voters {
            return Err(Error::config_invalid(format!(
                "expected {} votes, got {}",
                params.n_voters,
                votes.len()
            )));
        }

        let mut sbb = Sbb::new(params.election_id.clone(), params.json_indent);
        match Self::run_inner(params, votes, rng, &mut sbb) {
            Ok(data) => Ok(Election {
                sbb,
                races: data.races,
                col0: data.col0,
                pass_outputs: data.pass_outputs,
                icl: data.icl,
                opl: data.opl,
                tallies: data.tallies,
            }),
            Err(err) => {
                let _ = sbb.post("election:aborted", serde_json::json!({ "reason": err.to_string() }), false);
                Err(err)
            }
        }
    }

    fn run_inner(
        params: &ElectionParameters,
        votes: &[BTreeMap<String, String>],
        rng: &mut impl CsprngSource,
        sbb: &mut Sbb,
    ) -> Result<ElectionData, Error> {
        // Init
        sbb.post("setup:start", SetupStartPayload { election_id: &params.election_id }, false)?;

        // SetupRaces
        let mut races = BTreeMap::new();
        let mut race_payloads = Vec::new();
        for (race_id, raw_choices) in &params.ballot_style {
            let race = Race::new(race_id.clone(), raw_choices, rng)?;
            race_payloads.push(RacePayload {
                race_id: race.race_id().to_string(),
                choices: race.raw_choice_strings(),
                modulus: race.modulus().value().to_string(),
            });
            races.insert(race_id.clone(), race);
        }
        sbb.post("setup:races", SetupRacesPayload { races: race_payloads }, false)?;

        // SetupVoters
        sbb.post(
            "setup:voters",
            SetupVotersPayload { n_voters: params.n_voters, ballot_id_len: params.ballot_id_len },
            false,
        )?;

        // SetupKeys: documented no-op, no SBB posting.

        sbb.post("setup:finished", serde_json::json!({}), false)?;

        // CastVotes + DistributeToGrid
        let rows = row_labels(row_count(params.n_fail, params.n_leak))?;
        let mut grids: BTreeMap<String, Grid> = races
            .keys()
            .map(|race_id| (race_id.clone(), Grid::new(race_id.clone(), rows.clone())))
            .collect();
        let mut receipts: BTreeMap<String, ReceiptEntry> = BTreeMap::new();

        for (voter_idx, ballot) in votes.iter().enumerate() {
            let position = Position::new(voter_idx, params.n_voters);
            for (race_id, choice) in ballot {
                let race = races.get(race_id).ok_or_else(|| {
                    Error::config_invalid(format!("vote references unknown race `{race_id}`"))
                })?;
                let cast = voter::cast_vote(
                    rng,
                    race,
                    choice,
                    &position,
                    &rows,
                    params.ballot_id_len,
                )?;
                let grid = grids.get_mut(race_id).expect("grid exists for every race");
                for (row, cell) in cast.rows {
                    grid.set_col0_cell(row, position.clone(), cell);
                }
                receipts.insert(
                    cast.receipt.ballot_id.clone(),
                    ReceiptEntry { race_id: race_id.clone(), position: position.to_string() },
                );
            }
        }

        // PostCommitments
        let mut col0: BTreeMap<String, CommitmentColumn> = BTreeMap::new();
        for (race_id, grid) in &grids {
            let commitments = commitments_only(grid.col0());
            sbb.post(
                "casting:votes",
                serde_json::json!({ "race_id": race_id, "col0": &commitments }),
                false,
            )?;
            col0.insert(race_id.clone(), commitments);
        }

        // PostReceipts
        sbb.post("casting:receipts", &receipts, false)?;

        // Mix
        let passes = pass_labels(params.n_reps)?;
        let mut pass_outputs: BTreeMap<String, BTreeMap<PassLabel, CommitmentColumn>> =
            BTreeMap::new();
        let mut mix_passes: BTreeMap<String, Vec<crate::server::MixPass>> = BTreeMap::new();

        for (race_id, grid) in &grids {
            let mut per_race_outputs = BTreeMap::new();
            let mut records = Vec::new();
            for &label in &passes {
                let race = &races[race_id];
                let pass = grid.mix_pass(rng, race.modulus(), label);
                let output_commitments = commitments_only(&pass.output);
                sbb.post(
                    "mix:*",
                    MixPayload { race_id, pass: label, output: &output_commitments },
                    false,
                )?;
                per_race_outputs.insert(label, output_commitments);
                records.push(pass);
            }
            pass_outputs.insert(race_id.clone(), per_race_outputs);
            mix_passes.insert(race_id.clone(), records);
        }

        // Challenge derivation: hash the SBB state once, after every
        // mix-pass output commitment has been posted but before any
        // disclosure, so the split cannot be chosen to favor a cheat.
        let transcript_digest = *blake3::hash(sbb.to_canonical_string().as_bytes()).as_bytes();

        let mut icl: BTreeMap<String, Vec<IclDisclosure>> = BTreeMap::new();
        let mut opl: BTreeMap<String, Vec<OplDisclosure>> = BTreeMap::new();
        let mut tallies: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();

        for (race_id, records) in &mix_passes {
            let (icl_labels, opl_labels) =
                split_icl_opl(&passes, params.challenge_derivation, transcript_digest);

            let grid = &grids[race_id];
            let race = &races[race_id];

            let mut icl_disclosures = Vec::new();
            for label in &icl_labels {
                let pass = records.iter().find(|p| p.label == *label).expect("pass exists");
                icl_disclosures.push(proof::disclose_icl(grid, pass));
            }

            let mut opl_disclosures = Vec::new();
            for label in &opl_labels {
                let pass = records.iter().find(|p| p.label == *label).expect("pass exists");
                opl_disclosures.push(proof::disclose_opl(pass));
            }

            let race_tally = tally::compute_tally(race, &opl_disclosures)?;

            sbb.post("tally", TallyPayload { race_id, totals: &race_tally }, false)?;
            for d in &icl_disclosures {
                sbb.post("proof:icl", ProofPayload { race_id, disclosure: d }, false)?;
            }
            for d in &opl_disclosures {
                sbb.post("proof:opl", ProofPayload { race_id, disclosure: d }, false)?;
            }

            icl.insert(race_id.clone(), icl_disclosures);
            opl.insert(race_id.clone(), opl_disclosures);
            tallies.insert(race_id.clone(), race_tally);
        }

        sbb.close()?;

        Ok(ElectionData { races, col0, pass_outputs, icl, opl, tallies })
    }

    /// The completed bulletin board.
    pub fn sbb(&self) -> &Sbb {
        &self.sbb
    }

    /// Per-race final tallies.
    pub fn tallies(&self) -> &BTreeMap<String, BTreeMap<String, u64>> {
        &self.tallies
    }

    /// Assemble the flattened, verifier-facing transcript.
    pub fn proof_transcript(&self) -> Transcript {
        let races = self
            .races
            .keys()
            .map(|race_id| {
                let race = &self.races[race_id];
                let transcript = RaceTranscript {
                    race: Race::from_published(
                        race.race_id(),
                        race.choices().to_vec(),
                        race.modulus().value().clone(),
                    ),
                    col0: self.col0[race_id].clone(),
                    pass_outputs: self.pass_outputs[race_id].clone(),
                    icl: self.icl[race_id].clone(),
                    opl: self.opl[race_id].clone(),
                    tally: self.tallies[race_id].clone(),
                };
                (race_id.clone(), transcript)
            })
            .collect();
        Transcript { election_id: self.sbb.election_id().to_string(), races }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;
    use crate::verify;

    fn vote(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(r, c)| (r.to_string(), c.to_string())).collect()
    }

    #[test]
    fn s1_both_voters_choose_a() {
        let params = ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            2,
            2,
            0,
            0,
        );
        let votes = vec![vote(&[("P", "A")]), vote(&[("P", "A")])];
        let mut rng = seeded_rng(100);
        let election = Election::run(&params, &votes, &mut rng).unwrap();
        let tally = &election.tallies()["P"];
        assert_eq!(tally.get("A"), Some(&2));
        assert_eq!(tally.get("B").copied().unwrap_or(0), 0);
        assert!(election.sbb().read_all().last().unwrap().label == "election:done.");
    }

    #[test]
    fn s2_split_vote() {
        let params = ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            2,
            2,
            0,
            0,
        );
        let votes = vec![vote(&[("P", "A")]), vote(&[("P", "B")])];
        let mut rng = seeded_rng(101);
        let election = Election::run(&params, &votes, &mut rng).unwrap();
        let tally = &election.tallies()["P"];
        assert_eq!(tally.get("A"), Some(&1));
        assert_eq!(tally.get("B"), Some(&1));
    }

    #[test]
    fn s3_two_races_with_write_in() {
        let params = ElectionParameters::new(
            "E1",
            vec![
                ("P".to_string(), vec!["X".to_string(), "Y".to_string()]),
                ("V".to_string(), vec!["Y".to_string(), "N".to_string(), "****".to_string()]),
            ],
            3,
            4,
            0,
            0,
        );
        let votes = vec![
            vote(&[("P", "X"), ("V", "Y")]),
            vote(&[("P", "Y"), ("V", "Y")]),
            vote(&[("P", "X"), ("V", "abcd")]),
        ];
        let mut rng = seeded_rng(102);
        let election = Election::run(&params, &votes, &mut rng).unwrap();
        let p_tally = &election.tallies()["P"];
        assert_eq!(p_tally.get("X"), Some(&2));
        assert_eq!(p_tally.get("Y"), Some(&1));
        let v_tally = &election.tallies()["V"];
        assert_eq!(v_tally.get("Y"), Some(&2));
        assert_eq!(v_tally.get("N").copied().unwrap_or(0), 0);
        assert_eq!(v_tally.get("abcd"), Some(&1));
    }

    #[test]
    fn s6_same_seed_reproduces_byte_identical_transcript() {
        let params = ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            2,
            2,
            0,
            0,
        );
        let votes = vec![vote(&[("P", "A")]), vote(&[("P", "B")])];

        let mut rng1 = seeded_rng(555);
        let election1 = Election::run(&params, &votes, &mut rng1).unwrap();
        let mut rng2 = seeded_rng(555);
        let election2 = Election::run(&params, &votes, &mut rng2).unwrap();

        assert_eq!(election1.sbb().to_canonical_string(), election2.sbb().to_canonical_string());
    }

    #[test]
    fn n_voters_one_boundary() {
        let params = ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            1,
            2,
            0,
            0,
        );
        let votes = vec![vote(&[("P", "A")])];
        let mut rng = seeded_rng(9001);
        let election = Election::run(&params, &votes, &mut rng).unwrap();
        assert_eq!(election.tallies()["P"].get("A"), Some(&1));
    }

    #[test]
    fn full_transcript_verifies() {
        let params = ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            2,
            2,
            0,
            0,
        );
        let votes = vec![vote(&[("P", "A")]), vote(&[("P", "B")])];
        let mut rng = seeded_rng(77);
        let election = Election::run(&params, &votes, &mut rng).unwrap();
        let transcript = election.proof_transcript();
        let tallies = verify::verify_transcript(&transcript).unwrap();
        assert_eq!(tallies, *election.tallies());
    }

    #[test]
    fn aborted_run_leaves_no_terminator() {
        let mut params = ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            1,
            2,
            0,
            0,
        );
        params.n_voters = 2; // mismatches votes.len() below, forcing an abort
        let votes = vec![vote(&[("P", "A")])];
        let mut rng = seeded_rng(3);
        let err = Election::run(&params, &votes, &mut rng).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    // Silence an unused-import warning for ChoiceSpec / Randomizer /
    // FieldElem, which are re-exported here for downstream modules that
    // build test fixtures against this module's types.
    #[allow(dead_code)]
    fn _type_anchor(_: ChoiceSpec, _: Randomizer, _: FieldElem) {}
}
