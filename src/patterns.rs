use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{IntelError, Result};

/// `{group: {id: pattern}}`, where group is a tool category or a signal type.
pub type PatternGroups = BTreeMap<String, BTreeMap<String, String>>;

/// On-disk pattern configuration (`signal_config.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default)]
    pub technographics: PatternGroups,
    #[serde(default)]
    pub signals: PatternGroups,
}

impl PatternConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IntelError::InputNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let config: PatternConfig = serde_json::from_str(&content)
            .map_err(|e| IntelError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn tool_count(&self) -> usize {
        self.technographics.values().map(|t| t.len()).sum()
    }

    pub fn signal_count(&self) -> usize {
        self.signals.values().map(|s| s.len()).sum()
    }

    /// Every configured tool id, lower-cased.
    pub fn known_tools(&self) -> Vec<String> {
        self.technographics
            .values()
            .flat_map(|tools| tools.keys())
            .map(|id| id.to_lowercase())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Tool,
    Signal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub kind: MatchKind,
    /// Category for tools, type for signals, as written in the config.
    pub group: String,
    pub id: String,
}

impl Match {
    /// `salesforce_cpq` -> `Salesforce Cpq`
    pub fn display_name(&self) -> String {
        title_case(&self.id.replace('_', " "))
    }

    /// `sales_engagement` -> `sales engagement` for tools; signal types are kept.
    pub fn group_label(&self) -> String {
        match self.kind {
            MatchKind::Tool => self.group.replace('_', " "),
            MatchKind::Signal => self.group.clone(),
        }
    }
}

struct CompiledPattern {
    kind: MatchKind,
    group: String,
    id: String,
    regex: Regex,
}

/// Compiled, case-insensitive form of a `PatternConfig`. Patterns that fail to
/// compile are dropped for the run.
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
    skipped: usize,
}

impl PatternSet {
    pub fn compile(config: &PatternConfig) -> Self {
        let mut set = PatternSet {
            patterns: Vec::new(),
            skipped: 0,
        };
        set.add_groups(MatchKind::Tool, &config.technographics);
        set.add_groups(MatchKind::Signal, &config.signals);

        info!(
            "Compiled {} pattern(s), skipped {}",
            set.patterns.len(),
            set.skipped
        );
        set
    }

    fn add_groups(&mut self, kind: MatchKind, groups: &PatternGroups) {
        for (group, entries) in groups {
            for (id, pattern) in entries {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(regex) => self.patterns.push(CompiledPattern {
                        kind,
                        group: group.clone(),
                        id: id.clone(),
                        regex,
                    }),
                    Err(e) => {
                        warn!("Skipping pattern {}/{} ({:?}): {}", group, id, pattern, e);
                        self.skipped += 1;
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// One entry per pattern that matches anywhere in `text`, in config order.
pub fn extract_matches(text: &str, patterns: &PatternSet) -> Vec<Match> {
    patterns
        .patterns
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| Match {
            kind: p.kind,
            group: p.group.clone(),
            id: p.id.clone(),
        })
        .collect()
}

/// Upper-case each letter that follows a non-letter and lower-case the rest,
/// so `6sense` -> `6Sense` and `o'reilly` -> `O'Reilly`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut after_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if after_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            after_letter = true;
        } else {
            out.push(c);
            after_letter = false;
        }
    }
    out
}
