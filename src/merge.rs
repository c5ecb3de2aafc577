use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{IntelError, Result};
use crate::models::Seniority;
use crate::table::{is_null, Table};

pub const URL_COLUMN: &str = "job_url";
pub const REQUIRED_COLUMNS: [&str; 4] = [URL_COLUMN, "title", "company", "description"];
pub const WEEKLY_PREFIX: &str = "executive_sales_jobs_";

/// Outcome of merging one weekly extract.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub added: usize,
    pub skipped: usize,
    pub total: usize,
    pub created: bool,
    /// Seniority breakdown of the added records.
    pub seniority: BTreeMap<Seniority, usize>,
}

/// Merge `weekly` into `master`, in memory.
///
/// Every weekly record is stamped with `today`'s import date and ISO week.
/// Records whose `job_url` is already in the master, or appeared earlier in
/// the same extract, are skipped. Records with no URL are always added. The
/// result is ordered by import date, newest first.
pub fn merge(
    weekly: &Table,
    master: Option<&Table>,
    today: NaiveDate,
) -> (Table, MergeResult) {
    let mut weekly = weekly.clone();
    weekly.fill_column("import_date", &today.format("%Y-%m-%d").to_string());
    weekly.fill_column("import_week", &iso_week(today));

    let created = master.is_none();
    let mut merged = match master {
        Some(m) => m.clone(),
        None => Table::new(weekly.headers().to_vec()),
    };

    let mut seen: HashSet<String> = match merged.column(URL_COLUMN) {
        Some(col) => merged
            .rows()
            .iter()
            .map(|row| &row[col])
            .filter(|url| !is_null(url))
            .cloned()
            .collect(),
        None => HashSet::new(),
    };

    merged.ensure_columns(weekly.headers());

    let mut added = 0;
    let mut skipped = 0;
    let mut seniority: BTreeMap<Seniority, usize> = BTreeMap::new();

    for row in 0..weekly.len() {
        if let Some(url) = weekly.value(row, URL_COLUMN) {
            if !seen.insert(url.to_string()) {
                skipped += 1;
                continue;
            }
        }
        merged.push_aligned(&weekly, row);
        *seniority
            .entry(weekly.record(row).seniority_or_classified())
            .or_default() += 1;
        added += 1;
    }

    merged.sort_desc_by("import_date");

    let result = MergeResult {
        added,
        skipped,
        total: merged.len(),
        created,
        seniority,
    };
    (merged, result)
}

/// Merge the extract at `weekly_path` into the master CSV at `master_path`.
///
/// Both inputs are validated before anything is written. The master is
/// replaced only after the full merge is computed; an empty extract leaves
/// it untouched.
pub fn merge_files(weekly_path: &Path, master_path: &Path, today: NaiveDate) -> Result<MergeResult> {
    let weekly = Table::read(weekly_path)?;
    weekly.require_columns(weekly_path, &REQUIRED_COLUMNS)?;
    info!("Weekly extract {}: {} records", weekly_path.display(), weekly.len());

    let master = if master_path.exists() {
        let master = Table::read(master_path)?;
        if !master.headers().is_empty() {
            master.require_columns(master_path, &[URL_COLUMN])?;
        }
        info!("Existing master {}: {} records", master_path.display(), master.len());
        Some(master)
    } else {
        info!("No master at {}, creating it", master_path.display());
        None
    };

    if weekly.is_empty() {
        warn!("Weekly extract is empty, nothing to merge");
        let total = master.as_ref().map_or(0, Table::len);
        return Ok(MergeResult {
            added: 0,
            skipped: 0,
            total,
            created: false,
            seniority: BTreeMap::new(),
        });
    }

    let (merged, result) = merge(&weekly, master.as_ref(), today);
    merged.write_atomic(master_path)?;
    info!(
        "Master saved: {} added, {} duplicates skipped, {} total",
        result.added, result.skipped, result.total
    );
    Ok(result)
}

/// Newest `executive_sales_jobs_*.csv` in `dir`. Extract names carry their
/// date, so the lexicographic maximum is the latest.
pub fn latest_extract(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(WEEKLY_PREFIX) && n.ends_with(".csv"))
        })
        .collect();
    candidates.sort();

    candidates.pop().ok_or_else(|| IntelError::NoWeeklyExtract {
        dir: dir.to_path_buf(),
        pattern: format!("{}*.csv", WEEKLY_PREFIX),
    })
}

/// Append `today,count` to the openings trend file unless today is already
/// recorded. A missing trend file is left alone.
pub fn record_trend(path: &Path, today: NaiveDate, count: usize) -> Result<bool> {
    if !path.exists() {
        debug!("No trend file at {}, skipping", path.display());
        return Ok(false);
    }

    let today = today.format("%Y-%m-%d").to_string();
    let trend = Table::read(path)?;
    trend.require_columns(path, &["Date"])?;
    if (0..trend.len()).any(|row| trend.value(row, "Date") == Some(today.as_str())) {
        info!("Trend tracking already has an entry for {}", today);
        return Ok(false);
    }

    let existing = fs::read(path)?;
    let mut file = OpenOptions::new().append(true).open(path)?;
    if !existing.is_empty() && !existing.ends_with(b"\n") {
        file.write_all(b"\n")?;
    }
    writeln!(file, "{},{}", today, count)?;
    info!("Updated trend tracking: {} -> {} jobs", today, count);
    Ok(true)
}

/// ISO 8601 year-week, e.g. `2026-W43`.
pub fn iso_week(date: NaiveDate) -> String {
    date.format("%G-W%V").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.push_row(row.iter().map(|c| c.to_string()).collect());
        }
        t
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    fn urls(t: &Table) -> Vec<String> {
        (0..t.len())
            .map(|i| t.value(i, URL_COLUMN).unwrap_or("").to_string())
            .collect()
    }

    const HEADERS: [&str; 6] = ["job_url", "title", "company", "description", "min_amount", "max_amount"];

    #[test]
    fn test_first_run_copies_extract() {
        let weekly = table(&HEADERS, &[&["a", "VP Sales", "Acme", "", "1", "2"]]);
        let (merged, result) = merge(&weekly, None, day("2026-10-19"));
        assert!(result.created);
        assert_eq!(result.added, 1);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.value(0, "import_date"), Some("2026-10-19"));
        assert_eq!(merged.value(0, "import_week"), Some("2026-W43"));
    }

    #[test]
    fn test_duplicates_skipped_and_null_urls_pass_through() {
        let master = table(
            &["job_url", "company", "import_date"],
            &[&["a", "Acme", "2026-10-12"], &["", "Nobody", "2026-10-12"]],
        );
        let weekly = table(
            &HEADERS,
            &[
                &["a", "VP", "Acme", "", "", ""],
                &["", "CRO", "Initech", "", "", ""],
                &["", "CRO", "Initech", "", "", ""],
                &["b", "SVP", "Acme", "", "", ""],
                &["b", "SVP", "Acme", "", "", ""],
            ],
        );
        let (merged, result) = merge(&weekly, Some(&master), day("2026-10-19"));
        assert_eq!(result.added, 3);
        assert_eq!(result.skipped, 2);
        assert_eq!(merged.len(), 5);
        assert_eq!(urls(&merged), vec!["", "", "b", "a", ""]);
    }

    #[test]
    fn test_url_uniqueness_invariant() {
        let master = table(&HEADERS, &[&["a", "", "", "", "", ""], &["c", "", "", "", "", ""]]);
        let weekly = table(
            &HEADERS,
            &[&["c", "", "", "", "", ""], &["d", "", "", "", "", ""], &["d", "", "", "", "", ""]],
        );
        let (merged, _) = merge(&weekly, Some(&master), day("2026-10-19"));
        let mut all = urls(&merged);
        let before = all.len();
        all.sort();
        all.dedup();
        assert_eq!(before, all.len());
        assert_eq!(before, 3);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let master = table(&HEADERS, &[&["a", "VP", "Acme", "", "100000", "150000"]]);
        let weekly = table(
            &HEADERS,
            &[&["a", "VP", "Acme", "", "100000", "150000"], &["b", "CRO", "Globex", "", "", ""]],
        );
        let today = day("2026-10-19");
        let (once, first) = merge(&weekly, Some(&master), today);
        let (twice, second) = merge(&weekly, Some(&once), today);
        assert_eq!(first.added, 1);
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_schema_is_union_with_master_order_first() {
        let master = table(&["job_url", "metro"], &[&["a", "Boston"]]);
        let weekly = table(&HEADERS, &[&["b", "VP", "Acme", "", "", ""]]);
        let (merged, _) = merge(&weekly, Some(&master), day("2026-10-19"));
        assert_eq!(
            merged.headers(),
            &[
                "job_url", "metro", "title", "company", "description", "min_amount",
                "max_amount", "import_date", "import_week"
            ]
        );
        // new record first (newest import), old record null-filled
        assert_eq!(merged.value(0, "metro"), None);
        assert_eq!(merged.value(1, "metro"), Some("Boston"));
        assert_eq!(merged.value(1, "import_date"), None);
    }

    #[test]
    fn test_seniority_breakdown_of_added() {
        let weekly = table(
            &["job_url", "title", "company", "description", "seniority"],
            &[
                &["a", "Chief Revenue Officer", "Acme", "", ""],
                &["b", "Whatever", "Acme", "", "VP"],
                &["c", "SVP Sales", "Acme", "", ""],
            ],
        );
        let (_, result) = merge(&weekly, None, day("2026-10-19"));
        assert_eq!(result.seniority.get(&Seniority::CLevel), Some(&1));
        assert_eq!(result.seniority.get(&Seniority::Vp), Some(&1));
        assert_eq!(result.seniority.get(&Seniority::Svp), Some(&1));
    }

    #[test]
    fn test_merge_files_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let master_path = dir.path().join("master_jobs_database.csv");
        let weekly_path = dir.path().join("executive_sales_jobs_20261019.csv");
        fs::write(
            &master_path,
            "job_url,title,company,description,min_amount,max_amount,import_date\n\
             a,VP Sales,Acme,,100000,150000,2026-10-12\n",
        )
        .expect("master");
        fs::write(
            &weekly_path,
            "job_url,title,company,description,min_amount,max_amount\n\
             a,VP Sales,Acme,,100000,150000\n\
             b,SVP Sales,Acme,,120000,160000\n\
             c,CRO,Globex,,,\n",
        )
        .expect("weekly");

        let result = merge_files(&weekly_path, &master_path, day("2026-10-19")).expect("merge");
        assert_eq!(result.added, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.total, 3);

        let master = Table::read(&master_path).expect("read");
        assert_eq!(urls(&master), vec!["b", "c", "a"]);

        let again = merge_files(&weekly_path, &master_path, day("2026-10-19")).expect("again");
        assert_eq!(again.added, 0);
        assert_eq!(Table::read(&master_path).expect("read"), master);
    }

    #[test]
    fn test_merge_files_rejects_missing_columns_without_writing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let master_path = dir.path().join("master.csv");
        let weekly_path = dir.path().join("weekly.csv");
        fs::write(&master_path, "job_url,title\na,VP\n").expect("master");
        fs::write(&weekly_path, "job_url,title\nb,CRO\n").expect("weekly");

        let err = merge_files(&weekly_path, &master_path, day("2026-10-19")).unwrap_err();
        assert!(matches!(err, IntelError::MissingColumns { .. }));
        assert_eq!(fs::read_to_string(&master_path).expect("read"), "job_url,title\na,VP\n");
    }

    #[test]
    fn test_merge_files_empty_extract_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let master_path = dir.path().join("master.csv");
        let weekly_path = dir.path().join("weekly.csv");
        fs::write(&weekly_path, "job_url,title,company,description\n").expect("weekly");

        let result = merge_files(&weekly_path, &master_path, day("2026-10-19")).expect("merge");
        assert_eq!(result.added, 0);
        assert!(!master_path.exists());
    }

    #[test]
    fn test_latest_extract() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            latest_extract(dir.path()),
            Err(IntelError::NoWeeklyExtract { .. })
        ));
        for name in [
            "executive_sales_jobs_20261005.csv",
            "executive_sales_jobs_20261012.csv",
            "raw_jobs_20261019.csv",
            "executive_sales_jobs_20261012.json",
        ] {
            fs::write(dir.path().join(name), "").expect("touch");
        }
        let latest = latest_extract(dir.path()).expect("latest");
        assert_eq!(latest.file_name().and_then(|n| n.to_str()), Some("executive_sales_jobs_20261012.csv"));
    }

    #[test]
    fn test_record_trend_once_per_day() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Sales_Exec_Openings.csv");
        assert!(!record_trend(&path, day("2026-10-19"), 10).expect("missing"));

        fs::write(&path, "Date,Openings\n2026-10-12,40").expect("trend");
        assert!(record_trend(&path, day("2026-10-19"), 42).expect("append"));
        assert!(!record_trend(&path, day("2026-10-19"), 42).expect("again"));
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "Date,Openings\n2026-10-12,40\n2026-10-19,42\n"
        );
    }

    #[test]
    fn test_iso_week_year_boundary() {
        assert_eq!(iso_week(day("2027-01-01")), "2026-W53");
        assert_eq!(iso_week(day("2026-12-28")), "2026-W53");
        assert_eq!(iso_week(day("2026-01-01")), "2026-W01");
    }
}
