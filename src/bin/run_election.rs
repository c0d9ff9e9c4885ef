//! Minimal CLI election runner.
//!
//! Runs a small deterministic election from built-in ballot data (or a
//! `--votes` file: one line per voter, `race_id=choice` pairs separated
//! by `;`), prints the resulting tally, writes the canonical SBB
//! bulletin-board log to `sbb.json`, and writes the serialized proof
//! transcript (`sv_election::election::Transcript`) to `transcript.json`
//! — the file `verify_transcript` reads back to check the run
//! independently, with no access to the seed that produced it.

use std::{env, fs};

use sv_election::config::ElectionParameters;
use sv_election::election::Election;
use sv_election::rng::{os_rng, seeded_rng};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn parse_votes_file(path: &str) -> anyhow::Result<Vec<std::collections::BTreeMap<String, String>>> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read votes file {path}: {e}"))?;
    let mut votes = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut ballot = std::collections::BTreeMap::new();
        for entry in line.split(';') {
            let (race_id, choice) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("malformed vote entry `{entry}`, expected race_id=choice"))?;
            ballot.insert(race_id.trim().to_string(), choice.trim().to_string());
        }
        votes.push(ballot);
    }
    Ok(votes)
}

fn default_params() -> ElectionParameters {
    ElectionParameters::new(
        "demo-election",
        vec![
            ("president".to_string(), vec!["alice".to_string(), "bob".to_string()]),
            ("proposition-9".to_string(), vec!["yes".to_string(), "no".to_string()]),
        ],
        4,
        4,
        0,
        1,
    )
}

fn default_votes() -> Vec<std::collections::BTreeMap<String, String>> {
    let ballot = |p: &str, v: &str| {
        let mut m = std::collections::BTreeMap::new();
        m.insert("president".to_string(), p.to_string());
        m.insert("proposition-9".to_string(), v.to_string());
        m
    };
    vec![ballot("alice", "yes"), ballot("alice", "no"), ballot("bob", "yes"), ballot("bob", "yes")]
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_flag(&args, "--seed").and_then(|s| s.parse::<u64>().ok());
    let out_path = parse_flag(&args, "--out").unwrap_or_else(|| "transcript.json".to_string());
    let sbb_out_path =
        parse_flag(&args, "--sbb-out").unwrap_or_else(|| "sbb.json".to_string());

    let params = default_params();
    let votes = match parse_flag(&args, "--votes") {
        Some(path) => parse_votes_file(&path)?,
        None => default_votes(),
    };

    let mut rng_seeded;
    let mut rng_os;
    let election = if let Some(seed) = seed {
        rng_seeded = seeded_rng(seed);
        Election::run(&params, &votes, &mut rng_seeded)
    } else {
        rng_os = os_rng();
        Election::run(&params, &votes, &mut rng_os)
    }
    .map_err(|e| anyhow::anyhow!("election run failed: {e}"))?;

    for (race_id, totals) in election.tallies() {
        println!("race `{race_id}`:");
        for (choice, count) in totals {
            println!("  {choice}: {count}");
        }
    }

    fs::write(&sbb_out_path, election.sbb().to_canonical_string())
        .map_err(|e| anyhow::anyhow!("write {sbb_out_path}: {e}"))?;
    println!("wrote bulletin board log to {sbb_out_path}");

    let transcript_json = serde_json::to_string_pretty(&election.proof_transcript())
        .map_err(|e| anyhow::anyhow!("serialize proof transcript: {e}"))?;
    fs::write(&out_path, transcript_json).map_err(|e| anyhow::anyhow!("write {out_path}: {e}"))?;
    println!("wrote proof transcript to {out_path}");

    Ok(())
}
