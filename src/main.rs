mod config;
mod db;
mod discover;
mod error;
mod intel;
mod logging;
mod merge;
mod models;
mod patterns;
mod table;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Command, Settings};
use db::Database;
use patterns::{PatternConfig, PatternSet};
use std::path::PathBuf;
use table::Table;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cro-intel")]
#[command(about = "Merge weekly job extracts and build company intelligence for The CRO Report")]
struct Cli {
    /// Directory holding extracts, the master dataset and generated stores
    #[arg(short, long, global = true, default_value = config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a weekly extract into the master dataset
    Merge {
        /// Weekly extract (default: newest executive_sales_jobs_*.csv in the data dir)
        #[arg(short, long)]
        weekly: Option<PathBuf>,

        /// Master dataset to update
        #[arg(short, long)]
        master: Option<PathBuf>,

        /// Openings trend file to append today's count to
        #[arg(short, long)]
        tracking: Option<PathBuf>,
    },

    /// Rebuild the company intelligence store from the master dataset
    Intel {
        /// Master dataset to read
        #[arg(short, long)]
        master: Option<PathBuf>,

        /// Pattern configuration (technographics + signals)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// SQLite store to (re)create
        #[arg(long)]
        db: Option<PathBuf>,

        /// Report candidate tools missing from the configuration instead
        #[arg(long)]
        discover: bool,

        /// Where discovery mode writes its report
        #[arg(long)]
        discovered: Option<PathBuf>,
    },

    /// List companies in the intelligence store
    Companies {
        /// Only companies using this tool (id or name)
        #[arg(short, long)]
        tool: Option<String>,

        /// Only companies showing this signal type
        #[arg(short, long)]
        signal: Option<String>,

        /// Number of companies to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Show one company's tools and signals instead of the list
        #[arg(short, long, conflicts_with_all = ["tool", "signal"])]
        name: Option<String>,

        /// SQLite store to read
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn run_merge(settings: &Settings) -> Result<()> {
    let weekly_path = match &settings.weekly {
        Some(path) => path.clone(),
        None => merge::latest_extract(&settings.data_dir)?,
    };
    println!("Weekly extract: {}", weekly_path.display());

    let today = chrono::Local::now().date_naive();
    let result = merge::merge_files(&weekly_path, &settings.master, today)
        .with_context(|| format!("Failed to merge {} into {}", weekly_path.display(), settings.master.display()))?;

    println!("\nResults:");
    if result.created {
        println!("  Created master database");
    }
    println!("  Records added:      {}", result.added);
    println!("  Duplicates skipped: {}", result.skipped);
    println!("  Master total:       {}", result.total);
    if !result.seniority.is_empty() {
        println!("\n{:<10} {:>6}", "SENIORITY", "ADDED");
        println!("{}", "-".repeat(17));
        for (level, count) in &result.seniority {
            println!("{:<10} {:>6}", level, count);
        }
    }

    if result.added + result.skipped > 0 {
        let weekly_count = result.added + result.skipped;
        merge::record_trend(&settings.tracking, today, weekly_count)
            .with_context(|| format!("Failed to update {}", settings.tracking.display()))?;
    }

    Ok(())
}

fn run_intel(settings: &Settings, discover_mode: bool) -> Result<()> {
    let config = PatternConfig::load(&settings.pattern_config)
        .with_context(|| format!("Failed to load pattern config {}", settings.pattern_config.display()))?;
    println!("Configured tools:   {}", config.tool_count());
    println!("Configured signals: {}", config.signal_count());

    let master = Table::read(&settings.master)
        .with_context(|| format!("Failed to read master dataset {}", settings.master.display()))?;
    master.require_columns(&settings.master, &["company"])?;
    let records = master.records();
    info!("Loaded {} records from {}", records.len(), settings.master.display());
    println!("Total records:      {}", records.len());

    if discover_mode {
        let ranked = discover::discover_candidates(&records, &config.known_tools())?;
        discover::write_report(&settings.discovered, &ranked, chrono::Local::now())
            .with_context(|| format!("Failed to write {}", settings.discovered.display()))?;

        if ranked.is_empty() {
            println!("\nNo candidate tools found.");
        } else {
            println!("\nTop potential new tools (saved to {}):", settings.discovered.display());
            println!("{:<30} {:>8}", "NAME", "MENTIONS");
            println!("{}", "-".repeat(39));
            for candidate in ranked.iter().take(discover::DISPLAY_LIMIT) {
                println!("{:<30} {:>8}", truncate(&candidate.name, 28), candidate.mentions);
            }
        }
        return Ok(());
    }

    let patterns = PatternSet::compile(&config);
    if patterns.is_empty() {
        warn!("No usable patterns; the store will contain companies only");
    }
    println!("Active patterns:    {}", patterns.len());
    if patterns.skipped() > 0 {
        println!("Skipped patterns:   {} (see log)", patterns.skipped());
    }

    let agg = intel::aggregate(&records, &patterns);
    let stats = agg.stats();
    println!("\nCompanies processed:    {}", stats.companies);
    println!("Companies with tools:   {}", stats.companies_with_tools);
    println!("Companies with signals: {}", stats.companies_with_signals);
    println!("Total tool mentions:    {}", stats.tool_mentions);
    println!("Total signal mentions:  {}", stats.signal_mentions);

    let counts = Database::rebuild(&settings.db, &agg)
        .with_context(|| format!("Failed to write store {}", settings.db.display()))?;

    println!("\nStore created: {}", settings.db.display());
    println!("  Companies:      {}", counts.companies);
    println!("  Tool records:   {}", counts.tools);
    println!("  Signal records: {}", counts.signals);
    Ok(())
}

fn run_companies(settings: &Settings, tool: Option<&str>, signal: Option<&str>, limit: usize) -> Result<()> {
    let db = Database::open(&settings.db)
        .with_context(|| format!("Failed to open store {}. Run 'cro-intel intel' first.", settings.db.display()))?;
    let companies = db.list_companies(tool, signal, limit)?;
    if companies.is_empty() {
        println!("No companies found in {}.", db.path().display());
        return Ok(());
    }

    println!(
        "{:<28} {:<18} {:<12} {:>5} {:>16} {:>11}",
        "COMPANY", "INDUSTRY", "STAGE", "JOBS", "AVG PAY", "LAST SEEN"
    );
    println!("{}", "-".repeat(95));
    for company in companies {
        let pay = match (company.avg_salary_min, company.avg_salary_max) {
            (Some(min), Some(max)) => format!("${}k-${}k", min / 1000, max / 1000),
            _ => "-".to_string(),
        };
        println!(
            "{:<28} {:<18} {:<12} {:>5} {:>16} {:>11}",
            truncate(&company.name, 26),
            truncate(&company.industry.unwrap_or_default(), 16),
            truncate(&company.stage.unwrap_or_default(), 10),
            company.total_job_postings,
            pay,
            company.last_seen.unwrap_or_default()
        );
        let tools = db.company_tools(company.id)?;
        if !tools.is_empty() {
            let names: Vec<String> = tools
                .iter()
                .map(|(name, count)| format!("{} ({})", name, count))
                .collect();
            println!("  tools: {}", names.join(", "));
        }
    }
    Ok(())
}

fn run_company_detail(settings: &Settings, name: &str) -> Result<()> {
    let db = Database::open(&settings.db)
        .with_context(|| format!("Failed to open store {}. Run 'cro-intel intel' first.", settings.db.display()))?;
    let Some(company) = db.get_company(name)? else {
        println!("No company named '{}' in {}.", name, db.path().display());
        return Ok(());
    };

    println!("{}", company.name);
    println!("  Industry:  {}", company.industry.as_deref().unwrap_or("-"));
    println!("  Stage:     {}", company.stage.as_deref().unwrap_or("-"));
    println!("  Postings:  {}", company.total_job_postings);
    if let (Some(min), Some(max)) = (company.avg_salary_min, company.avg_salary_max) {
        println!("  Avg pay:   ${}-${}", min, max);
    }
    println!("  Last seen: {}", company.last_seen.as_deref().unwrap_or("-"));

    let tools = db.company_tools(company.id)?;
    if !tools.is_empty() {
        println!("\n{:<30} {:>8}", "TOOL", "MENTIONS");
        println!("{}", "-".repeat(39));
        for (tool, count) in &tools {
            println!("{:<30} {:>8}", truncate(tool, 28), count);
        }
    }

    let signals = db.company_signals(company.id)?;
    if !signals.is_empty() {
        println!("\n{:<16} {:<24} {:>8}", "SIGNAL", "VALUE", "MENTIONS");
        println!("{}", "-".repeat(50));
        for signal in &signals {
            println!(
                "{:<16} {:<24} {:>8}",
                truncate(&signal.signal_type, 14),
                truncate(&signal.signal_value, 22),
                signal.count
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let settings = Settings::from_data_dir(&cli.data_dir);

    match cli.command {
        Commands::Merge {
            weekly,
            master,
            tracking,
        } => {
            let settings = settings
                .with_weekly(weekly)
                .with_master(master)
                .with_tracking(tracking);
            settings.validate(Command::Merge)?;
            run_merge(&settings)?;
        }

        Commands::Intel {
            master,
            config,
            db,
            discover,
            discovered,
        } => {
            let settings = settings
                .with_master(master)
                .with_pattern_config(config)
                .with_db(db)
                .with_discovered(discovered);
            settings.validate(if discover { Command::Discover } else { Command::Intel })?;
            run_intel(&settings, discover)?;
        }

        Commands::Companies {
            tool,
            signal,
            limit,
            name,
            db,
        } => {
            let settings = settings.with_db(db);
            settings.validate(Command::Companies)?;
            match name {
                Some(name) => run_company_detail(&settings, &name)?,
                None => run_companies(&settings, tool.as_deref(), signal.as_deref(), limit)?,
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
