use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::models::JobRecord;
use crate::table::temp_path_for;

pub const MIN_MENTIONS: usize = 3;
pub const PERSIST_LIMIT: usize = 100;
pub const DISPLAY_LIMIT: usize = 50;

// CamelCase, Capitalized (optionally .io/.ai/.com), ACRONYM
const TOKEN_PATTERN: &str =
    r"\b(?:[A-Z][a-z]+[A-Z][A-Za-z]*|[A-Z][a-z]+(?:\.(?:io|ai|com))?|[A-Z]{2,})\b";

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "our", "you", "your", "we", "are", "with", "this", "that", "will",
    "who", "what", "how", "why", "when", "where", "all", "any", "about", "from", "into",
    "join", "role", "team", "teams", "job", "jobs", "company", "sales", "revenue", "vice",
    "president", "chief", "officer", "head", "senior", "director", "manager", "lead",
    "experience", "responsibilities", "requirements", "qualifications", "benefits",
    "salary", "remote", "hybrid", "equal", "opportunity", "employer", "inc", "llc", "ltd",
    "usa", "new", "north", "south", "east", "west", "america", "americas", "emea", "apac",
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "monday", "friday", "ceo", "cro", "cfo", "coo",
    "svp", "evp", "b2b", "saas", "eeo", "kpis", "okrs", "these", "they", "their",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub mentions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub generated_at: String,
    pub potential_tools: Vec<Candidate>,
}

/// Rank capitalized tokens and acronyms that are not yet configured tools.
///
/// Every occurrence counts. Only tokens seen at least `MIN_MENTIONS` times are
/// returned, most mentioned first, ties by name.
pub fn discover_candidates(records: &[JobRecord], known_tools: &[String]) -> Result<Vec<Candidate>> {
    let token = Regex::new(TOKEN_PATTERN)?;
    let known: HashSet<String> = known_tools.iter().map(|t| t.to_lowercase()).collect();
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        let text = record.raw_text();
        for m in token.find_iter(&text) {
            let name = m.as_str();
            if name.len() <= 2 {
                continue;
            }
            let lower = name.to_lowercase();
            if stop.contains(lower.as_str())
                || known.contains(&lower)
                || known.contains(&lower.replace(['.', ' '], "_"))
            {
                continue;
            }
            *counts.entry(name.to_string()).or_default() += 1;
        }
    }

    let mut ranked: Vec<Candidate> = counts
        .into_iter()
        .filter(|(_, mentions)| *mentions >= MIN_MENTIONS)
        .map(|(name, mentions)| Candidate { name, mentions })
        .collect();
    ranked.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.name.cmp(&b.name)));
    Ok(ranked)
}

/// Overwrite the discovery side file with the top `PERSIST_LIMIT` candidates.
pub fn write_report(path: &Path, ranked: &[Candidate], generated_at: DateTime<Local>) -> Result<()> {
    let report = DiscoveryReport {
        generated_at: generated_at.to_rfc3339(),
        potential_tools: ranked.iter().take(PERSIST_LIMIT).cloned().collect(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, serde_json::to_string_pretty(&report)?)?;
    fs::rename(&temp_path, path)?;

    info!(
        "Saved {} candidate tool(s) to {}",
        report.potential_tools.len(),
        path.display()
    );
    Ok(())
}
