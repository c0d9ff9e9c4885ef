//! Minimal CLI transcript verifier.
//!
//! Reads the proof transcript `run_election` wrote (`transcript.json` by
//! default) and checks it: every ICL disclosure's linkage, every OPL
//! disclosure's commitment opening, and the posted tally's agreement
//! with what the OPL disclosures actually decode to. This binary never
//! sees the seed or the votes that produced the transcript — only its
//! serialized proof, exactly as a real verifier would receive it.

use std::{env, fs};

use sv_election::election::Transcript;
use sv_election::verify::verify_transcript;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let in_path = parse_flag(&args, "--transcript").unwrap_or_else(|| "transcript.json".to_string());

    let text = fs::read_to_string(&in_path)
        .map_err(|e| anyhow::anyhow!("read transcript {in_path}: {e}"))?;
    let transcript: Transcript = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("parse transcript {in_path}: {e}"))?;

    match verify_transcript(&transcript) {
        Ok(tallies) => {
            println!("transcript verifies.");
            for (race_id, totals) in &tallies {
                println!("race `{race_id}`:");
                for (choice, count) in totals {
                    println!("  {choice}: {count}");
                }
            }
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("verification failed: {e}")),
    }
}
