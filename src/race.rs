//! Race & ballot-style model: enumerates choices, derives a race
//! modulus, encodes choices as field elements.

use crate::error::Error;
use crate::field::{self, FieldElem, Modulus};
use num_bigint::BigUint;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// One slot in a race's published choice list: either a fixed choice
/// string or a write-in slot of a given maximum byte length, indicated
/// in the raw ballot style by a run of `*` characters (e.g. `"****"`
/// for a 4-byte write-in).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceSpec {
    /// A fixed, enumerated choice.
    Fixed(String),
    /// A write-in slot accepting up to `max_len` bytes of text.
    WriteIn {
        /// Maximum encodable write-in length, in bytes.
        max_len: usize,
    },
}

impl ChoiceSpec {
    /// Parse one raw ballot-style choice string. A string made entirely
    /// of `*` characters (and non-empty) denotes a write-in slot whose
    /// maximum length is the number of stars; anything else is a fixed
    /// choice.
    pub fn parse(raw: &str) -> ChoiceSpec {
        if !raw.is_empty() && raw.chars().all(|c| c == '*') {
            ChoiceSpec::WriteIn { max_len: raw.chars().count() }
        } else {
            ChoiceSpec::Fixed(raw.to_string())
        }
    }
}

/// A race: its id, its published choice list, and its derived modulus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Race {
    race_id: String,
    choices: Vec<ChoiceSpec>,
    modulus: Modulus,
}

impl Race {
    /// Build a race from raw ballot-style choice strings, deriving the
    /// modulus as the smallest prime at least as large as the
    /// encoded-choice upper bound. `rng` is only used for
    /// the Miller-Rabin witnesses in prime search, never to choose the
    /// bound itself.
    pub fn new(
        race_id: impl Into<String>,
        raw_choices: &[impl AsRef<str>],
        rng: &mut impl RngCore,
    ) -> Result<Race, Error> {
        let race_id = race_id.into();
        if race_id.is_empty() {
            return Err(Error::config_invalid("race_id must be non-empty"));
        }
        if raw_choices.is_empty() {
            return Err(Error::config_invalid(format!(
                "race `{race_id}` has no choices"
            )));
        }

        let choices: Vec<ChoiceSpec> =
            raw_choices.iter().map(|c| ChoiceSpec::parse(c.as_ref())).collect();

        let mut upper_bound = BigUint::from(0u64);
        for spec in &choices {
            let bound = match spec {
                ChoiceSpec::Fixed(text) => BigUint::from_bytes_be(text.as_bytes()),
                ChoiceSpec::WriteIn { max_len } => {
                    // Largest value representable in max_len bytes is 256^max_len - 1.
                    (BigUint::from(256u64).pow(*max_len as u32)) - BigUint::from(1u64)
                }
            };
            if bound > upper_bound {
                upper_bound = bound;
            }
        }

        let modulus = Modulus::new(field::next_probable_prime(&(upper_bound + 1u64), rng));

        Ok(Race { race_id, choices, modulus })
    }

    /// This race's id.
    pub fn race_id(&self) -> &str {
        &self.race_id
    }

    /// The published choice list, in ballot-style order.
    pub fn choices(&self) -> &[ChoiceSpec] {
        &self.choices
    }

    /// The derived race modulus.
    pub fn modulus(&self) -> &Modulus {
        &self.modulus
    }

    /// Reconstruct a race from its publicly posted `setup:races` data,
    /// without re-deriving the modulus: the verifier trusts (and
    /// independently could re-check) the posted prime rather than
    /// re-running prime search, which is not guaranteed to reproduce the
    /// same prime without the prover's exact RNG state.
    pub fn from_published(
        race_id: impl Into<String>,
        choices: Vec<ChoiceSpec>,
        modulus: BigUint,
    ) -> Race {
        Race { race_id: race_id.into(), choices, modulus: Modulus::new(modulus) }
    }

    /// The raw ballot-style choice strings this race was built from
    /// (write-ins rendered back as their star placeholder), for posting
    /// to the bulletin board under `setup:races`.
    pub fn raw_choice_strings(&self) -> Vec<String> {
        self.choices
            .iter()
            .map(|c| match c {
                ChoiceSpec::Fixed(text) => text.clone(),
                ChoiceSpec::WriteIn { max_len } => "*".repeat(*max_len),
            })
            .collect()
    }

    /// Encode a chosen text (a fixed choice's exact text, or write-in
    /// text no longer than its slot) as a field element in `[0, m)`.
    pub fn encode(&self, choice_text: &str) -> Result<FieldElem, Error> {
        let value = BigUint::from_bytes_be(choice_text.as_bytes());
        if value >= *self.modulus.value() {
            return Err(Error::EncodingTooLarge {
                race_id: self.race_id.clone(),
                choice: choice_text.to_string(),
            });
        }
        Ok(FieldElem::new_unchecked(value))
    }

    /// Decode a field element back to its original choice text. The
    /// encoding is the canonical big-endian byte interpretation of the
    /// choice text, so decoding is simply the inverse byte conversion
    /// followed by UTF-8 decoding, so encoding and decoding round-trip.
    pub fn decode(&self, elem: &FieldElem) -> Option<String> {
        let bytes = elem.as_biguint().to_bytes_be();
        String::from_utf8(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(11)
    }

    #[test]
    fn parses_write_in_placeholder() {
        assert_eq!(ChoiceSpec::parse("****"), ChoiceSpec::WriteIn { max_len: 4 });
        assert_eq!(ChoiceSpec::parse("A"), ChoiceSpec::Fixed("A".to_string()));
    }

    #[test]
    fn modulus_covers_all_fixed_choices_and_write_in_capacity() {
        let race = Race::new("P", &["A", "B", "****"], &mut rng()).unwrap();
        for c in ["A", "B"] {
            assert!(race.encode(c).is_ok());
        }
        assert!(race.encode("abcd").is_ok());
    }

    #[test]
    fn encode_decode_round_trips() {
        let race = Race::new("V", &["Y", "N", "****"], &mut rng()).unwrap();
        for text in ["Y", "N", "abcd"] {
            let elem = race.encode(text).unwrap();
            assert_eq!(race.decode(&elem).as_deref(), Some(text));
        }
    }

    #[test]
    fn write_in_at_maximum_length_round_trips_exactly() {
        let race = Race::new("V", &["Y", "N", "****"], &mut rng()).unwrap();
        let elem = race.encode("wxyz").unwrap();
        assert_eq!(race.decode(&elem).as_deref(), Some("wxyz"));
    }

    #[test]
    fn overlong_write_in_is_rejected() {
        let race = Race::new("V", &["Y", "N", "***"], &mut rng()).unwrap();
        assert!(matches!(race.encode("toolong"), Err(Error::EncodingTooLarge { .. })));
    }

    #[test]
    fn empty_race_id_is_invalid() {
        assert!(Race::new("", &["A", "B"], &mut rng()).is_err());
    }

    #[test]
    fn empty_choice_list_is_invalid() {
        let empty: Vec<&str> = vec![];
        assert!(Race::new("P", &empty, &mut rng()).is_err());
    }
}
