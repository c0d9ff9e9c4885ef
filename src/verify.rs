//! Independent transcript verification: replays the cut-and-choose
//! checks and the tally computation against a [`Transcript`] alone, with
//! no access to the `Election` or `Grid` that produced it. A verifier
//! and the orchestrator that produced its input share only the
//! serialized proof, never in-process state.

use crate::election::Transcript;
use crate::error::Error;
use crate::proof;
use crate::tally;
use std::collections::BTreeMap;

/// Verify every race in `transcript`: every ICL disclosure must open
/// against the recorded column-0 and output commitments and reproduce
/// them after applying its permutation and deltas; every OPL disclosure
/// must open against its recorded output commitments; the posted tally
/// must match what the OPL disclosures actually decode to. Returns the
/// per-race tallies on success.
pub fn verify_transcript(
    transcript: &Transcript,
) -> Result<BTreeMap<String, BTreeMap<String, u64>>, Error> {
    let mut tallies = BTreeMap::new();

    for (race_id, race_transcript) in &transcript.races {
        for disclosure in &race_transcript.icl {
            let output = race_transcript.pass_outputs.get(&disclosure.pass).ok_or_else(|| {
                Error::CommitmentMismatch {
                    race_id: race_id.clone(),
                    position: "*".to_string(),
                    pass: disclosure.pass.as_char(),
                }
            })?;
            proof::verify_icl(
                race_id,
                disclosure,
                &race_transcript.col0,
                output,
                race_transcript.race.modulus(),
            )?;
        }

        for disclosure in &race_transcript.opl {
            let output = race_transcript.pass_outputs.get(&disclosure.pass).ok_or_else(|| {
                Error::CommitmentMismatch {
                    race_id: race_id.clone(),
                    position: "*".to_string(),
                    pass: disclosure.pass.as_char(),
                }
            })?;
            proof::verify_opl(race_id, disclosure, output, race_transcript.race.modulus())?;
        }

        let recomputed = tally::compute_tally(&race_transcript.race, &race_transcript.opl)?;
        if recomputed != race_transcript.tally {
            return Err(Error::TallyInconsistent { race_id: race_id.clone() });
        }

        tallies.insert(race_id.clone(), recomputed);
    }

    Ok(tallies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElectionParameters;
    use crate::election::Election;
    use crate::rng::seeded_rng;
    use std::collections::BTreeMap as Map;

    fn vote(entries: &[(&str, &str)]) -> Map<String, String> {
        entries.iter().map(|(r, c)| (r.to_string(), c.to_string())).collect()
    }

    #[test]
    fn verifies_a_clean_election() {
        let params = ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            3,
            4,
            1,
            0,
        );
        let votes = vec![vote(&[("P", "A")]), vote(&[("P", "B")]), vote(&[("P", "A")])];
        let mut rng = seeded_rng(42);
        let election = Election::run(&params, &votes, &mut rng).unwrap();
        let transcript = election.proof_transcript();
        let tallies = verify_transcript(&transcript).unwrap();
        assert_eq!(tallies["P"].get("A"), Some(&2));
        assert_eq!(tallies["P"].get("B"), Some(&1));
    }

    #[test]
    fn rejects_a_transcript_with_a_tampered_icl_opening() {
        let params = ElectionParameters::new(
            "E1",
            vec![("P".to_string(), vec!["A".to_string(), "B".to_string()])],
            2,
            2,
            0,
            0,
        );
        let votes = vec![vote(&[("P", "A")]), vote(&[("P", "B")])];
        let mut rng = seeded_rng(13);
        let election = Election::run(&params, &votes, &mut rng).unwrap();
        let mut transcript = election.proof_transcript();

        let race = transcript.races.get_mut("P").unwrap();
        let disclosure = race.icl.first_mut().expect("at least one ICL pass");
        let by_position = disclosure.inputs.values_mut().next().expect("at least one row");
        let opened = by_position.values_mut().next().expect("at least one position");
        opened.u = opened.u.add(&crate::field::FieldElem::from_u64(1, race.race.modulus()), race.race.modulus());

        assert!(verify_transcript(&transcript).is_err());
    }
}
