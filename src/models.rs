use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Seniority {
    CLevel,
    Evp,
    Svp,
    Vp,
    HeadOf,
    Other,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::CLevel => "C-Level",
            Seniority::Evp => "EVP",
            Seniority::Svp => "SVP",
            Seniority::Vp => "VP",
            Seniority::HeadOf => "Head of",
            Seniority::Other => "Other",
        }
    }

    /// Classify a job title. C-suite wins over any VP wording in the same title.
    pub fn from_title(title: &str) -> Self {
        let lower = title.to_lowercase();
        let padded = format!(" {} ", lower.replace(',', " "));

        let c_suite = [
            "chief revenue officer",
            "chief sales officer",
            "chief commercial officer",
        ];
        if c_suite.iter().any(|t| lower.contains(t))
            || ["cro", "cso", "cco"]
                .iter()
                .any(|a| padded.contains(&format!(" {} ", a)))
        {
            return Seniority::CLevel;
        }

        if lower.contains("executive vice president") || padded.contains(" evp ") {
            Seniority::Evp
        } else if lower.contains("senior vice president") || padded.contains(" svp ") {
            Seniority::Svp
        } else if lower.contains("vice president") || padded.contains(" vp ") {
            Seniority::Vp
        } else if lower.contains("head of") {
            Seniority::HeadOf
        } else {
            Seniority::Other
        }
    }
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Seniority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c-level" | "c level" | "c-suite" => Ok(Seniority::CLevel),
            "evp" => Ok(Seniority::Evp),
            "svp" => Ok(Seniority::Svp),
            "vp" => Ok(Seniority::Vp),
            "head of" => Ok(Seniority::HeadOf),
            "other" => Ok(Seniority::Other),
            other => Err(format!("unknown seniority '{}'", other)),
        }
    }
}

/// One job posting as read from an extract or the master dataset.
///
/// Only the columns the pipeline reads are typed here; the table keeps
/// every other column untouched.
#[derive(Debug, Clone, Default)]
pub struct JobRecord {
    pub job_url: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub date_posted: Option<String>,
    pub description: Option<String>,
    pub company_description: Option<String>,
    pub skills: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub is_remote: Option<bool>,
    pub seniority: Option<Seniority>,
    pub company_url: Option<String>,
    pub company_industry: Option<String>,
    pub company_stage: Option<String>,
    pub company_num_employees: Option<String>,
    pub company_revenue: Option<String>,
    pub import_date: Option<String>,
    pub import_week: Option<String>,
}

impl JobRecord {
    /// Lower-cased concatenation of the free-text fields patterns run against.
    pub fn search_text(&self) -> String {
        self.raw_text().to_lowercase()
    }

    /// Same fields as `search_text`, original case preserved.
    pub fn raw_text(&self) -> String {
        let mut text = String::new();
        for field in [
            &self.description,
            &self.title,
            &self.company_description,
            &self.skills,
        ] {
            if let Some(value) = field {
                text.push(' ');
                text.push_str(value);
            }
        }
        text
    }

    /// `date_posted`, falling back to `import_date`.
    pub fn seen_date(&self) -> Option<&str> {
        self.date_posted
            .as_deref()
            .or(self.import_date.as_deref())
    }

    /// Both salary bounds, or nothing.
    pub fn salary_range(&self) -> Option<(f64, f64)> {
        match (self.min_amount, self.max_amount) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    pub fn seniority_or_classified(&self) -> Seniority {
        self.seniority.unwrap_or_else(|| {
            self.title
                .as_deref()
                .map(Seniority::from_title)
                .unwrap_or(Seniority::Other)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyProfile {
    pub name: String,
    pub url: Option<String>,
    pub industry: Option<String>,
    pub stage: Option<String>,
    pub size: Option<String>,
    pub revenue: Option<String>,
    pub total_job_postings: i64,
    pub avg_salary_min: Option<f64>,
    pub avg_salary_max: Option<f64>,
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolMention {
    pub tool_id: String,
    pub tool_name: String,
    pub category: String,
    pub count: i64,
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalMention {
    pub signal_type: String,
    pub signal_id: String,
    pub signal_value: String,
    pub count: i64,
    pub last_seen: Option<String>,
}

impl SignalMention {
    pub fn key(&self) -> String {
        signal_key(&self.signal_type, &self.signal_id)
    }
}

pub fn signal_key(signal_type: &str, signal_id: &str) -> String {
    format!("{}:{}", signal_type, signal_id)
}

/// Row shape returned by store queries.
#[derive(Debug, Clone)]
pub struct StoredCompany {
    pub id: i64,
    pub name: String,
    pub industry: Option<String>,
    pub stage: Option<String>,
    pub total_job_postings: i64,
    pub avg_salary_min: Option<i64>,
    pub avg_salary_max: Option<i64>,
    pub last_seen: Option<String>,
}
