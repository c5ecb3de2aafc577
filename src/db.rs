use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{IntelError, Result};
use crate::intel::Aggregate;
use crate::models::{SignalMention, StoredCompany};
use crate::table::temp_path_for;

const SCHEMA: &str = r#"
    CREATE TABLE companies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE,
        url TEXT,
        industry TEXT,
        stage TEXT,
        size TEXT,
        revenue TEXT,
        total_job_postings INTEGER,
        avg_salary_min INTEGER,
        avg_salary_max INTEGER,
        last_seen TEXT
    );

    CREATE TABLE company_tools (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_id INTEGER NOT NULL REFERENCES companies(id),
        company_name TEXT,
        tool_id TEXT,
        tool_name TEXT,
        tool_category TEXT,
        mention_count INTEGER,
        last_seen TEXT
    );

    CREATE TABLE company_signals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_id INTEGER NOT NULL REFERENCES companies(id),
        company_name TEXT,
        signal_type TEXT,
        signal_key TEXT,
        signal_value TEXT,
        mention_count INTEGER,
        last_seen TEXT
    );
"#;

const INDEXES: &str = r#"
    CREATE INDEX idx_tools_company ON company_tools(company_id);
    CREATE INDEX idx_tools_category ON company_tools(tool_category);
    CREATE INDEX idx_tools_name ON company_tools(tool_name);
    CREATE INDEX idx_signals_company ON company_signals(company_id);
    CREATE INDEX idx_signals_type ON company_signals(signal_type);
    CREATE INDEX idx_companies_stage ON companies(stage);
    CREATE INDEX idx_companies_industry ON companies(industry);
"#;

/// Row counts written by a store rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    pub companies: usize,
    pub tools: usize,
    pub signals: usize,
}

/// The company intelligence store.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open an existing store for querying.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IntelError::InputNotFound(path.to_path_buf()));
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Replace the store at `path` with one built from `agg`.
    ///
    /// The new store is built in a sibling file and renamed over `path` only
    /// once every row is committed, so a failed rebuild leaves the previous
    /// store untouched.
    pub fn rebuild(path: &Path, agg: &Aggregate) -> Result<StoreCounts> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = temp_path_for(path);
        if temp_path.exists() {
            fs::remove_file(&temp_path)?;
        }

        let counts = {
            let mut conn = Connection::open(&temp_path)?;
            conn.execute_batch(SCHEMA)?;
            let tx = conn.transaction()?;
            let counts = insert_all(&tx, agg)?;
            tx.execute_batch(INDEXES)?;
            tx.commit()?;
            counts
        };

        fs::rename(&temp_path, path)?;
        info!(
            "Rebuilt {} ({} companies, {} tools, {} signals)",
            path.display(),
            counts.companies,
            counts.tools,
            counts.signals
        );
        Ok(counts)
    }

    /// Companies ordered by posting count, optionally restricted to those
    /// using a tool (id or display name) or showing a signal type.
    pub fn list_companies(
        &self,
        tool: Option<&str>,
        signal: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredCompany>> {
        let mut sql = String::from(
            "SELECT c.id, c.name, c.industry, c.stage, c.total_job_postings,
                    c.avg_salary_min, c.avg_salary_max, c.last_seen
             FROM companies c
             WHERE 1=1",
        );

        let mut args: Vec<String> = vec![];

        if let Some(t) = tool {
            sql.push_str(&format!(
                " AND c.id IN (SELECT company_id FROM company_tools
                               WHERE LOWER(tool_id) = LOWER(?{n}) OR LOWER(tool_name) = LOWER(?{n}))",
                n = args.len() + 1
            ));
            args.push(t.to_string());
        }

        if let Some(s) = signal {
            sql.push_str(&format!(
                " AND c.id IN (SELECT company_id FROM company_signals WHERE LOWER(signal_type) = LOWER(?{}))",
                args.len() + 1
            ));
            args.push(s.to_string());
        }

        sql.push_str(&format!(
            " ORDER BY c.total_job_postings DESC, c.name LIMIT {}",
            limit
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_company)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_company(&self, name: &str) -> Result<Option<StoredCompany>> {
        let company = self
            .conn
            .query_row(
                "SELECT id, name, industry, stage, total_job_postings,
                        avg_salary_min, avg_salary_max, last_seen
                 FROM companies WHERE name = ?1",
                [name],
                Self::row_to_company,
            )
            .optional()?;
        Ok(company)
    }

    /// `(tool_name, mention_count)` for one company, most mentioned first.
    pub fn company_tools(&self, company_id: i64) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT tool_name, mention_count FROM company_tools
             WHERE company_id = ?1 ORDER BY mention_count DESC, tool_name",
        )?;
        let rows = stmt.query_map([company_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Signals for one company, most mentioned first.
    pub fn company_signals(&self, company_id: i64) -> Result<Vec<SignalMention>> {
        let mut stmt = self.conn.prepare(
            "SELECT signal_type, signal_key, signal_value, mention_count, last_seen
             FROM company_signals
             WHERE company_id = ?1 ORDER BY mention_count DESC, signal_key",
        )?;
        let rows = stmt.query_map([company_id], |row| {
            let signal_type: String = row.get(0)?;
            let key: String = row.get(1)?;
            let signal_id = key
                .split_once(':')
                .map(|(_, id)| id.to_string())
                .unwrap_or_else(|| key.clone());
            Ok(SignalMention {
                signal_type,
                signal_id,
                signal_value: row.get(2)?,
                count: row.get(3)?,
                last_seen: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<StoredCompany> {
        Ok(StoredCompany {
            id: row.get(0)?,
            name: row.get(1)?,
            industry: row.get(2)?,
            stage: row.get(3)?,
            total_job_postings: row.get(4)?,
            avg_salary_min: row.get(5)?,
            avg_salary_max: row.get(6)?,
            last_seen: row.get(7)?,
        })
    }
}

fn insert_all(conn: &Connection, agg: &Aggregate) -> Result<StoreCounts> {
    let mut counts = StoreCounts::default();
    let mut company_ids: HashMap<&str, i64> = HashMap::new();

    {
        let mut stmt = conn.prepare(
            "INSERT INTO companies (name, url, industry, stage, size, revenue,
                                    total_job_postings, avg_salary_min, avg_salary_max, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for company in &agg.companies {
            stmt.execute(params![
                company.name,
                company.url,
                company.industry,
                company.stage,
                company.size,
                company.revenue,
                company.total_job_postings,
                company.avg_salary_min.map(truncate_amount),
                company.avg_salary_max.map(truncate_amount),
                company.last_seen,
            ])?;
            company_ids.insert(company.name.as_str(), conn.last_insert_rowid());
            counts.companies += 1;
        }
    }

    {
        let mut stmt = conn.prepare(
            "INSERT INTO company_tools (company_id, company_name, tool_id, tool_name,
                                        tool_category, mention_count, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        // Walk companies rather than the map so row order is reproducible.
        for company in &agg.companies {
            let Some(&company_id) = company_ids.get(company.name.as_str()) else {
                continue;
            };
            for tool in agg.tools_for(&company.name) {
                stmt.execute(params![
                    company_id,
                    company.name,
                    tool.tool_id,
                    tool.tool_name,
                    tool.category,
                    tool.count,
                    tool.last_seen,
                ])?;
                counts.tools += 1;
            }
        }
    }

    {
        let mut stmt = conn.prepare(
            "INSERT INTO company_signals (company_id, company_name, signal_type, signal_key,
                                          signal_value, mention_count, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for company in &agg.companies {
            let Some(&company_id) = company_ids.get(company.name.as_str()) else {
                continue;
            };
            for signal in agg.signals_for(&company.name) {
                stmt.execute(params![
                    company_id,
                    company.name,
                    signal.signal_type,
                    signal.key(),
                    signal.signal_value,
                    signal.count,
                    signal.last_seen,
                ])?;
                counts.signals += 1;
            }
        }
    }

    debug!(
        "Inserted {} companies, {} tool rows, {} signal rows",
        counts.companies, counts.tools, counts.signals
    );
    Ok(counts)
}

fn truncate_amount(value: f64) -> i64 {
    value.trunc() as i64
}
