use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{IntelError, Result};
use crate::models::JobRecord;

/// Cell values that pandas-produced extracts use for "no value".
const NULL_MARKERS: [&str; 4] = ["nan", "null", "none", "n/a"];

pub fn is_null(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || NULL_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m))
}

/// A CSV table with ordered, named columns. Every row has exactly one cell
/// per header; an empty cell is null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IntelError::InputNotFound(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut table = Table::new(headers);
        let width = table.headers.len();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.len() > width {
                warn!(
                    "{}: row {} has {} cells for {} columns, extra cells dropped",
                    path.display(),
                    i + 1,
                    row.len(),
                    width
                );
            }
            table.push_row(row);
        }

        debug!("Read {} rows from {}", table.rows.len(), path.display());
        Ok(table)
    }

    /// Write the whole table next to `path`, then rename it into place, so a
    /// reader never sees a half-written file.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = temp_path_for(path);
        {
            let mut writer = csv::Writer::from_path(&temp_path)?;
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&temp_path, path)?;

        debug!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_columns(&self, path: &Path, required: &[&str]) -> Result<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| self.column(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IntelError::MissingColumns {
                path: path.to_path_buf(),
                missing,
            })
        }
    }

    /// Non-null cell value of `name` in row `row`.
    pub fn value(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column(name)?;
        let cell = self.rows.get(row)?.get(col)?;
        if is_null(cell) { None } else { Some(cell.as_str()) }
    }

    /// Append any of `names` not already present as null-filled columns.
    pub fn ensure_columns<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if self.column(name).is_none() {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }
    }

    /// Set `name` to `value` on every row, adding the column if needed.
    pub fn fill_column(&mut self, name: &str, value: &str) {
        self.ensure_columns(&[name]);
        if let Some(col) = self.column(name) {
            for row in &mut self.rows {
                row[col] = value.to_string();
            }
        }
    }

    /// Append row `row` of `other`, aligning cells by column name. Columns of
    /// `other` this table lacks must have been added with `ensure_columns`.
    pub fn push_aligned(&mut self, other: &Table, row: usize) {
        let index: HashMap<&str, usize> = other
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        let source = &other.rows[row];
        let aligned = self
            .headers
            .iter()
            .map(|h| {
                index
                    .get(h.as_str())
                    .map(|&i| source[i].clone())
                    .unwrap_or_default()
            })
            .collect();
        self.rows.push(aligned);
    }

    /// Append a row, padding or cutting it to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Stable sort, greatest value first. Null cells sort last.
    pub fn sort_desc_by(&mut self, name: &str) {
        let Some(col) = self.column(name) else {
            return;
        };
        self.rows.sort_by(|a, b| {
            match (is_null(&a[col]), is_null(&b[col])) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => b[col].cmp(&a[col]),
            }
        });
    }

    pub fn records(&self) -> Vec<JobRecord> {
        (0..self.rows.len()).map(|i| self.record(i)).collect()
    }

    pub fn record(&self, row: usize) -> JobRecord {
        let text = |name: &str| self.value(row, name).map(str::to_string);
        let amount = |name: &str| self.value(row, name).and_then(|v| v.trim().parse::<f64>().ok());

        JobRecord {
            job_url: text("job_url"),
            title: text("title"),
            company: text("company"),
            location: text("location"),
            date_posted: text("date_posted"),
            description: text("description"),
            company_description: text("company_description"),
            skills: text("skills"),
            min_amount: amount("min_amount"),
            max_amount: amount("max_amount"),
            is_remote: self.value(row, "is_remote").and_then(parse_bool),
            seniority: self.value(row, "seniority").and_then(|v| v.parse().ok()),
            company_url: text("company_url_direct").or_else(|| text("company_url")),
            company_industry: text("company_industry"),
            company_stage: text("company_stage"),
            company_num_employees: text("company_num_employees"),
            company_revenue: text("company_revenue"),
            import_date: text("import_date"),
            import_week: text("import_week"),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("write fixture");
        path
    }

    #[test]
    fn test_read_pads_short_rows_and_quotes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(
            dir.path(),
            "jobs.csv",
            "job_url,title,description\na,\"VP, Sales\",\"multi\nline\"\nb,CRO\n",
        );
        let table = Table::read(&path).expect("read");
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "title"), Some("VP, Sales"));
        assert_eq!(table.value(0, "description"), Some("multi\nline"));
        assert_eq!(table.value(1, "description"), None);
        assert_eq!(table.rows()[1].len(), 3);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Table::read(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, IntelError::InputNotFound(_)));
    }

    #[test]
    fn test_require_columns_lists_missing() {
        let table = Table::new(vec!["job_url".into(), "title".into()]);
        let err = table
            .require_columns(Path::new("w.csv"), &["job_url", "company", "description"])
            .unwrap_err();
        match err {
            IntelError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["company".to_string(), "description".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_markers() {
        assert!(is_null(""));
        assert!(is_null("  "));
        assert!(is_null("NaN"));
        assert!(is_null("None"));
        assert!(!is_null("0"));
        assert!(!is_null("Acme"));
    }

    #[test]
    fn test_push_aligned_fills_missing_columns() {
        let mut master = Table::new(vec!["job_url".into(), "metro".into()]);
        master.push_row(vec!["a".into(), "Boston".into()]);

        let mut weekly = Table::new(vec!["title".into(), "job_url".into()]);
        weekly.push_row(vec!["VP Sales".into(), "b".into()]);

        master.ensure_columns(weekly.headers());
        master.push_aligned(&weekly, 0);

        assert_eq!(master.headers(), &["job_url", "metro", "title"]);
        assert_eq!(master.rows()[0], vec!["a", "Boston", ""]);
        assert_eq!(master.rows()[1], vec!["b", "", "VP Sales"]);
    }

    #[test]
    fn test_sort_desc_is_stable_with_nulls_last() {
        let mut table = Table::new(vec!["id".into(), "import_date".into()]);
        table.push_row(vec!["1".into(), "2026-10-01".into()]);
        table.push_row(vec!["2".into(), "".into()]);
        table.push_row(vec!["3".into(), "2026-10-19".into()]);
        table.push_row(vec!["4".into(), "2026-10-01".into()]);
        table.sort_desc_by("import_date");

        let ids: Vec<&str> = table.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "4", "2"]);
    }

    #[test]
    fn test_write_atomic_round_trips_and_leaves_no_temp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out").join("master.csv");
        let mut table = Table::new(vec!["job_url".into(), "title".into()]);
        table.push_row(vec!["a".into(), "Head of Sales, \"EMEA\"".into()]);

        table.write_atomic(&path).expect("write");
        assert!(!temp_path_for(&path).exists());
        assert_eq!(Table::read(&path).expect("read"), table);
    }

    #[test]
    fn test_record_reads_typed_fields() {
        let mut table = Table::new(
            ["job_url", "company", "min_amount", "max_amount", "is_remote", "seniority", "company_url"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        table.push_row(
            ["a", "Acme", "100000.0", "nan", "True", "SVP", "https://acme.example"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let record = table.record(0);
        assert_eq!(record.company.as_deref(), Some("Acme"));
        assert_eq!(record.min_amount, Some(100000.0));
        assert_eq!(record.max_amount, None);
        assert_eq!(record.is_remote, Some(true));
        assert_eq!(record.seniority, Some(crate::models::Seniority::Svp));
        assert_eq!(record.company_url.as_deref(), Some("https://acme.example"));
    }
}
