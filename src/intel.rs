use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::models::{signal_key, CompanyProfile, JobRecord, SignalMention, ToolMention};
use crate::patterns::{extract_matches, MatchKind, PatternSet};

/// Per-company aggregates. Companies keep first-seen order; tool and signal
/// maps are keyed by tool id and `type:id` respectively.
#[derive(Debug, Default)]
pub struct Aggregate {
    pub companies: Vec<CompanyProfile>,
    pub tools: HashMap<String, BTreeMap<String, ToolMention>>,
    pub signals: HashMap<String, BTreeMap<String, SignalMention>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregateStats {
    pub companies: usize,
    pub companies_with_tools: usize,
    pub companies_with_signals: usize,
    pub tool_mentions: usize,
    pub signal_mentions: usize,
}

impl Aggregate {
    pub fn tools_for(&self, company: &str) -> impl Iterator<Item = &ToolMention> {
        self.tools.get(company).into_iter().flat_map(|t| t.values())
    }

    pub fn signals_for(&self, company: &str) -> impl Iterator<Item = &SignalMention> {
        self.signals.get(company).into_iter().flat_map(|s| s.values())
    }

    pub fn stats(&self) -> AggregateStats {
        AggregateStats {
            companies: self.companies.len(),
            companies_with_tools: self.tools.values().filter(|t| !t.is_empty()).count(),
            companies_with_signals: self.signals.values().filter(|s| !s.is_empty()).count(),
            tool_mentions: self.tools.values().map(|t| t.len()).sum(),
            signal_mentions: self.signals.values().map(|s| s.len()).sum(),
        }
    }
}

#[derive(Default)]
struct SalaryTotals {
    min_sum: f64,
    max_sum: f64,
    count: u32,
}

/// Group postings by company and count tool/signal adoption.
///
/// Records without a company are ignored. Salary averages only use postings
/// that carry both bounds.
pub fn aggregate(records: &[JobRecord], patterns: &PatternSet) -> Aggregate {
    let mut out = Aggregate::default();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut salaries: Vec<SalaryTotals> = Vec::new();

    for record in records {
        let Some(name) = record
            .company
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        else {
            continue;
        };
        let seen = record.seen_date().map(str::to_string);

        let idx = *index.entry(name.to_string()).or_insert_with(|| {
            out.companies.push(CompanyProfile {
                name: name.to_string(),
                url: None,
                industry: None,
                stage: None,
                size: None,
                revenue: None,
                total_job_postings: 0,
                avg_salary_min: None,
                avg_salary_max: None,
                last_seen: None,
            });
            salaries.push(SalaryTotals::default());
            out.companies.len() - 1
        });

        let company = &mut out.companies[idx];
        company.total_job_postings += 1;
        fill_once(&mut company.url, &record.company_url);
        fill_once(&mut company.industry, &record.company_industry);
        fill_once(&mut company.stage, &record.company_stage);
        fill_once(&mut company.size, &record.company_num_employees);
        fill_once(&mut company.revenue, &record.company_revenue);
        keep_latest(&mut company.last_seen, &seen);

        if let Some((min, max)) = record.salary_range() {
            let totals = &mut salaries[idx];
            totals.min_sum += min;
            totals.max_sum += max;
            totals.count += 1;
        }

        let text = record.search_text();
        for m in extract_matches(&text, patterns) {
            match m.kind {
                MatchKind::Tool => {
                    let mention = out
                        .tools
                        .entry(name.to_string())
                        .or_default()
                        .entry(m.id.clone())
                        .or_insert_with(|| ToolMention {
                            tool_id: m.id.clone(),
                            tool_name: m.display_name(),
                            category: m.group_label(),
                            count: 0,
                            last_seen: None,
                        });
                    mention.count += 1;
                    keep_latest(&mut mention.last_seen, &seen);
                }
                MatchKind::Signal => {
                    let mention = out
                        .signals
                        .entry(name.to_string())
                        .or_default()
                        .entry(signal_key(&m.group, &m.id))
                        .or_insert_with(|| SignalMention {
                            signal_type: m.group_label(),
                            signal_id: m.id.clone(),
                            signal_value: m.display_name(),
                            count: 0,
                            last_seen: None,
                        });
                    mention.count += 1;
                    keep_latest(&mut mention.last_seen, &seen);
                }
            }
        }
    }

    for (company, totals) in out.companies.iter_mut().zip(&salaries) {
        if totals.count > 0 {
            company.avg_salary_min = Some(totals.min_sum / f64::from(totals.count));
            company.avg_salary_max = Some(totals.max_sum / f64::from(totals.count));
        }
    }

    debug!("Aggregated {} companies", out.companies.len());
    out
}

fn fill_once(slot: &mut Option<String>, value: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

/// ISO dates compare correctly as strings.
fn keep_latest(slot: &mut Option<String>, candidate: &Option<String>) {
    if let Some(date) = candidate {
        if slot.as_deref().is_none_or(|current| date.as_str() > current) {
            *slot = Some(date.clone());
        }
    }
}
