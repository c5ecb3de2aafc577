use std::path::{Path, PathBuf};

use crate::error::{IntelError, Result};

pub const DEFAULT_DATA_DIR: &str = "data";

/// What a run is about to do, which decides the paths it reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Merge,
    Intel,
    Discover,
    Companies,
}

/// File locations for one run. Built once in `main` from the data directory
/// plus any per-path overrides, then validated before any work starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub weekly: Option<PathBuf>,
    pub master: PathBuf,
    pub tracking: PathBuf,
    pub pattern_config: PathBuf,
    pub db: PathBuf,
    pub discovered: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_data_dir(DEFAULT_DATA_DIR)
    }
}

impl Settings {
    pub fn from_data_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            data_dir: dir.to_path_buf(),
            weekly: None,
            master: dir.join("master_jobs_database.csv"),
            tracking: dir.join("Sales_Exec_Openings.csv"),
            pattern_config: dir.join("signal_config.json"),
            db: dir.join("company_intelligence.db"),
            discovered: dir.join("discovered_tools.json"),
        }
    }

    pub fn with_weekly(mut self, path: Option<PathBuf>) -> Self {
        self.weekly = path;
        self
    }

    pub fn with_master(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.master = p;
        }
        self
    }

    pub fn with_tracking(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.tracking = p;
        }
        self
    }

    pub fn with_pattern_config(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.pattern_config = p;
        }
        self
    }

    pub fn with_db(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.db = p;
        }
        self
    }

    pub fn with_discovered(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.discovered = p;
        }
        self
    }

    /// `(path, read)` for every file `command` touches; `read` marks inputs
    /// that must already exist.
    fn paths_for(&self, command: Command) -> Vec<(&PathBuf, bool)> {
        match command {
            Command::Merge => {
                let mut paths = vec![(&self.master, false), (&self.tracking, false)];
                paths.extend(self.weekly.as_ref().map(|w| (w, true)));
                paths
            }
            Command::Intel => vec![
                (&self.master, true),
                (&self.pattern_config, true),
                (&self.db, false),
            ],
            Command::Discover => vec![
                (&self.master, true),
                (&self.pattern_config, true),
                (&self.discovered, false),
            ],
            Command::Companies => vec![(&self.db, true)],
        }
    }

    /// Check the paths `command` will use before any work starts. The data
    /// directory must exist when one of them still points into it (or when
    /// the weekly extract is looked up there), no file path may name a
    /// directory, and inputs must exist.
    pub fn validate(&self, command: Command) -> Result<()> {
        let paths = self.paths_for(command);

        let scans_data_dir = command == Command::Merge && self.weekly.is_none();
        let needs_data_dir =
            scans_data_dir || paths.iter().any(|(p, _)| p.starts_with(&self.data_dir));
        if needs_data_dir && !self.data_dir.is_dir() {
            return Err(IntelError::Config(format!(
                "data directory {} does not exist",
                self.data_dir.display()
            )));
        }

        if let Some((dir, _)) = paths.iter().find(|(p, _)| p.is_dir()) {
            return Err(IntelError::Config(format!(
                "{} is a directory, expected a file",
                dir.display()
            )));
        }

        if let Some((missing, _)) = paths.iter().find(|(p, read)| *read && !p.exists()) {
            return Err(IntelError::InputNotFound(missing.to_path_buf()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_derive_from_data_dir() {
        let settings = Settings::from_data_dir("/srv/cro");
        assert_eq!(settings.master, PathBuf::from("/srv/cro/master_jobs_database.csv"));
        assert_eq!(settings.db, PathBuf::from("/srv/cro/company_intelligence.db"));
        assert_eq!(settings.weekly, None);
        assert_eq!(Settings::default().data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_data_dir("data")
            .with_master(Some("/tmp/master.csv".into()))
            .with_db(None);
        assert_eq!(settings.master, PathBuf::from("/tmp/master.csv"));
        assert_eq!(settings.db, PathBuf::from("data/company_intelligence.db"));
    }

    #[test]
    fn test_validate_requires_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = Settings::from_data_dir(&missing)
            .validate(Command::Merge)
            .unwrap_err();
        assert!(matches!(err, IntelError::Config(_)));

        assert!(Settings::from_data_dir(dir.path()).validate(Command::Merge).is_ok());
    }

    #[test]
    fn test_validate_merge_with_every_path_overridden() {
        let dir = tempfile::tempdir().expect("tempdir");
        let weekly = dir.path().join("weekly.csv");
        std::fs::write(&weekly, "job_url,title,company,description\n").expect("weekly");

        let settings = Settings::from_data_dir(dir.path().join("no_such_data_dir"))
            .with_weekly(Some(weekly))
            .with_master(Some(dir.path().join("master.csv")))
            .with_tracking(Some(dir.path().join("openings.csv")));
        assert!(settings.validate(Command::Merge).is_ok());

        // Without --weekly the extract is looked up in the data dir.
        let settings = settings.with_weekly(None);
        assert!(matches!(
            settings.validate(Command::Merge),
            Err(IntelError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_inputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let absent = dir.path().join("absent.csv");
        let settings = Settings::from_data_dir(dir.path()).with_weekly(Some(absent.clone()));
        match settings.validate(Command::Merge) {
            Err(IntelError::InputNotFound(path)) => assert_eq!(path, absent),
            other => panic!("expected InputNotFound, got {:?}", other),
        }

        let settings = Settings::from_data_dir(dir.path());
        assert!(matches!(
            settings.validate(Command::Intel),
            Err(IntelError::InputNotFound(_))
        ));
        assert!(matches!(
            settings.validate(Command::Companies),
            Err(IntelError::InputNotFound(_))
        ));

        std::fs::write(&settings.master, "company\n").expect("master");
        std::fs::write(&settings.pattern_config, "{}").expect("config");
        assert!(settings.validate(Command::Intel).is_ok());
        assert!(settings.validate(Command::Discover).is_ok());
    }

    #[test]
    fn test_validate_rejects_directory_as_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::from_data_dir(dir.path()).with_db(Some(dir.path().to_path_buf()));
        assert!(matches!(
            settings.validate(Command::Companies),
            Err(IntelError::Config(_))
        ));
    }
}
