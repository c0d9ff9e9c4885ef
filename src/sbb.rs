//! Secure Bulletin Board: an append-only, totally-ordered, canonically
//! serialized transcript log. Every public output of the protocol engine
//! passes through here — it is the sole public output of the core.

use crate::error::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A sortable, zero-padded slot label (`p0`, `p1`, ...). Positions are
/// opaque slot identifiers, never voter identities.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(String);

impl Position {
    /// Build the `n`-th position label, zero-padded to the width needed
    /// for `count` total positions so that string ordering matches
    /// numeric ordering.
    pub fn new(index: usize, count: usize) -> Position {
        let width = count.saturating_sub(1).to_string().len().max(1);
        Position(format!("p{index:0width$}", width = width))
    }

    /// The raw label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Position {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Position(String::deserialize(deserializer)?))
    }
}

/// One posted record. `time` is `None` for static setup data explicitly
/// suppressed for transcript reproducibility.
#[derive(Clone, Debug)]
pub struct SbbEntry {
    /// The posting's label (e.g. `"setup:races"`).
    pub label: String,
    /// ISO-8601 timestamp, if this posting is timestamped.
    pub time: Option<String>,
    /// Arbitrary structured payload, canonically serialized on output.
    pub payload: Value,
}

/// The append-only log itself, keyed by `election_id`.
#[derive(Debug)]
pub struct Sbb {
    election_id: String,
    entries: Vec<SbbEntry>,
    closed: bool,
    json_indent: usize,
}

impl Sbb {
    /// Open a fresh board for `election_id`, rendering payloads with
    /// `json_indent` spaces of indentation (`0` = compact).
    pub fn new(election_id: impl Into<String>, json_indent: usize) -> Sbb {
        Sbb { election_id: election_id.into(), entries: Vec::new(), closed: false, json_indent }
    }

    /// This board's election id.
    pub fn election_id(&self) -> &str {
        &self.election_id
    }

    /// Append a labeled posting. Fails with [`Error::SbbClosed`] if
    /// `close` has already been called.
    pub fn post(
        &mut self,
        label: impl Into<String>,
        payload: impl Serialize,
        time_stamp: bool,
    ) -> Result<(), Error> {
        if self.closed {
            return Err(Error::SbbClosed { election_id: self.election_id.clone() });
        }
        let payload = serde_json::to_value(payload).expect("payload must serialize to JSON");
        let time = time_stamp.then(|| Utc::now().to_rfc3339());
        self.entries.push(SbbEntry { label: label.into(), time, payload });
        Ok(())
    }

    /// Write the terminator. Further posts fail with [`Error::SbbClosed`].
    /// Like every other posting in this simulation, the terminator is
    /// unstamped: a real wall-clock `time` here would make two runs
    /// seeded identically diverge in their last entry, defeating
    /// reproducibility (scenario S6).
    pub fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::SbbClosed { election_id: self.election_id.clone() });
        }
        self.entries.push(SbbEntry {
            label: "election:done.".to_string(),
            time: None,
            payload: Value::Null,
        });
        self.closed = true;
        Ok(())
    }

    /// Whether `close` has been called. A transcript lacking a
    /// terminator is a partial run that a verifier MUST reject.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The ordered list of postings, including the terminator if present.
    pub fn read_all(&self) -> &[SbbEntry] {
        &self.entries
    }

    /// Render the whole log as the canonical-JSON transcript described
    /// as an array of `{label, time, payload}` records, object
    /// keys sorted lexicographically, integers in decimal, byte strings
    /// in lowercase hex (callers are responsible for hex-encoding bytes
    /// before handing them to `post`; this function only sorts keys and
    /// controls whitespace).
    pub fn to_canonical_string(&self) -> String {
        let array = Value::Array(
            self.entries
                .iter()
                .map(|e| {
                    let mut obj = serde_json::Map::new();
                    obj.insert("label".to_string(), Value::String(e.label.clone()));
                    obj.insert(
                        "time".to_string(),
                        e.time.clone().map(Value::String).unwrap_or(Value::Null),
                    );
                    obj.insert("payload".to_string(), e.payload.clone());
                    Value::Object(obj)
                })
                .collect(),
        );
        canonical::encode(&array, self.json_indent)
    }
}

/// Deterministic JSON serialization independent of `serde_json`'s
/// (version-dependent, unspecified) default map ordering: every object
/// is rebuilt with its keys sorted before being written out.
pub mod canonical {
    use serde_json::Value;

    /// Serialize `value` with object keys sorted lexicographically at
    /// every nesting level, using `indent` spaces per level (`0` means
    /// fully compact, no insignificant whitespace).
    pub fn encode(value: &Value, indent: usize) -> String {
        let mut out = String::new();
        write_value(value, indent, 0, &mut out);
        out
    }

    fn write_value(value: &Value, indent: usize, depth: usize, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                if keys.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push('{');
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    newline_indent(out, indent, depth + 1);
                    out.push_str(&serde_json::to_string(k).expect("string key"));
                    out.push(':');
                    if indent > 0 {
                        out.push(' ');
                    }
                    write_value(&map[*k], indent, depth + 1, out);
                }
                newline_indent(out, indent, depth);
                out.push('}');
            }
            Value::Array(items) => {
                if items.is_empty() {
                    out.push_str("[]");
                    return;
                }
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    newline_indent(out, indent, depth + 1);
                    write_value(item, indent, depth + 1, out);
                }
                newline_indent(out, indent, depth);
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }

    fn newline_indent(out: &mut String, indent: usize, depth: usize) {
        if indent > 0 {
            out.push('\n');
            out.push_str(&" ".repeat(indent * depth));
        }
    }
}
