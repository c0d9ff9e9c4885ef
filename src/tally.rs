//! Verifiable tally: aggregates the OPL disclosures' output shares into
//! per-choice totals, requiring every OPL pass to agree.

use crate::error::Error;
use crate::proof::OplDisclosure;
use crate::race::Race;
use std::collections::BTreeMap;

/// Aggregate `opl_disclosures` for `race` into per-choice totals. Every
/// pass must decode to identical totals; disagreement raises
/// [`Error::TallyInconsistent`]. Write-ins decode to their own text and
/// are counted as distinct choices.
pub fn compute_tally(
    race: &Race,
    opl_disclosures: &[OplDisclosure],
) -> Result<BTreeMap<String, u64>, Error> {
    let mut totals: Option<BTreeMap<String, u64>> = None;

    for disclosure in opl_disclosures {
        // Redundant rows are expected to agree by grid construction; the
        // first row (by row-label order) is the tally's canonical source.
        let representative_row = disclosure
            .outputs
            .values()
            .next()
            .ok_or_else(|| Error::TallyInconsistent { race_id: race.race_id().to_string() })?;

        let mut pass_totals: BTreeMap<String, u64> = BTreeMap::new();
        for opened in representative_row.values() {
            let sum = opened.u.add(&opened.v, race.modulus());
            let choice = race.decode(&sum).ok_or_else(|| Error::TallyInconsistent {
                race_id: race.race_id().to_string(),
            })?;
            *pass_totals.entry(choice).or_insert(0) += 1;
        }

        match &totals {
            None => totals = Some(pass_totals),
            Some(existing) => {
                if *existing != pass_totals {
                    return Err(Error::TallyInconsistent { race_id: race.race_id().to_string() });
                }
            }
        }
    }

    totals.ok_or_else(|| Error::TallyInconsistent { race_id: race.race_id().to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::Randomizer;
    use crate::field::FieldElem;
    use crate::proof::{disclose_opl, PassLabel};
    use crate::rng::seeded_rng;
    use crate::sbb::Position;
    use crate::server::{row_labels, Cell, Grid};

    fn opl_for(race: &Race, choices: &[&str]) -> OplDisclosure {
        let mut rng = seeded_rng(3);
        let rows = row_labels(1).unwrap();
        let mut grid = Grid::new(race.race_id(), rows.clone());
        for (i, choice) in choices.iter().enumerate() {
            let pos = Position::new(i, choices.len());
            let target = race.encode(choice).unwrap();
            let u = FieldElem::random(&mut rng, race.modulus());
            let v = target.sub(&u, race.modulus());
            let cell = Cell::new(
                format!("b{i}"),
                u,
                v,
                Randomizer::random(&mut rng),
                Randomizer::random(&mut rng),
                race.modulus(),
            );
            grid.set_col0_cell(rows[0], pos, cell);
        }
        let pass = grid.mix_pass(&mut rng, race.modulus(), PassLabel::new('B').unwrap());
        disclose_opl(&pass)
    }

    #[test]
    fn agreeing_opl_passes_produce_expected_totals() {
        let mut rng = seeded_rng(1);
        let race = Race::new("P", &["A", "B"], &mut rng).unwrap();
        let opl = opl_for(&race, &["A", "A", "B"]);
        let totals = compute_tally(&race, std::slice::from_ref(&opl)).unwrap();
        assert_eq!(totals.get("A"), Some(&2));
        assert_eq!(totals.get("B"), Some(&1));
    }

    #[test]
    fn disagreeing_opl_passes_raise_tally_inconsistent() {
        let mut rng = seeded_rng(2);
        let race = Race::new("P", &["A", "B"], &mut rng).unwrap();
        let opl1 = opl_for(&race, &["A", "B"]);
        let mut opl2 = opl_for(&race, &["A", "B"]);
        // Corrupt one opened share so its decoded choice changes.
        for by_position in opl2.outputs.values_mut() {
            if let Some(opened) = by_position.values_mut().next() {
                opened.u = opened.u.add(&FieldElem::from_u64(1, race.modulus()), race.modulus());
            }
        }
        let result = compute_tally(&race, &[opl1, opl2]);
        assert!(matches!(result, Err(Error::TallyInconsistent { .. })));
    }

    #[test]
    fn write_ins_are_counted_as_distinct_choices() {
        let mut rng = seeded_rng(4);
        let race = Race::new("V", &["Y", "N", "****"], &mut rng).unwrap();
        let opl = opl_for(&race, &["Y", "abcd", "Y"]);
        let totals = compute_tally(&race, std::slice::from_ref(&opl)).unwrap();
        assert_eq!(totals.get("Y"), Some(&2));
        assert_eq!(totals.get("abcd"), Some(&1));
    }
}
