use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::normalize::MAX_AMOUNT;
use crate::source::FormSink;

pub const DEFAULT_SESSION_PATH: &str = ".jeopardy-session.json";
pub const DEFAULT_RULES_PATH: &str = "game_rules.toml";

/// Weekday value table and edit policy. Index 0 is Monday, the first day of
/// the scoring week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRules {
    #[serde(default = "default_values")]
    pub values: Vec<i64>,
    #[serde(default = "default_wager_day")]
    pub wager_day: usize,
    #[serde(default = "default_max_submissions")]
    pub max_submissions_per_day: usize,
}

fn default_values() -> Vec<i64> {
    vec![200, 600, 1000, 400, 1200, 2000, 0]
}

fn default_wager_day() -> usize {
    6
}

fn default_max_submissions() -> usize {
    2
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            values: default_values(),
            wager_day: default_wager_day(),
            max_submissions_per_day: default_max_submissions(),
        }
    }
}

impl GameRules {
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let rules: Self = toml::from_str(contents)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Missing file means defaults; a file that exists must parse and validate.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no rules file, using default values");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("invalid rules in {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.values.len() != 7 {
            bail!("expected 7 weekday values, found {}", self.values.len());
        }
        if self.wager_day > 6 {
            bail!("wager_day must be 0..=6, found {}", self.wager_day);
        }
        if self.values[self.wager_day] != 0 {
            bail!(
                "wager day carries base value {}, expected 0",
                self.values[self.wager_day]
            );
        }
        if let Some(negative) = self.values.iter().find(|value| **value < 0) {
            bail!("weekday values must be non-negative, found {negative}");
        }
        if let Some(huge) = self.values.iter().find(|value| **value > MAX_AMOUNT) {
            bail!("weekday values must not exceed {MAX_AMOUNT}, found {huge}");
        }
        if self.max_submissions_per_day == 0 {
            bail!("max_submissions_per_day must be at least 1");
        }
        Ok(())
    }

    pub fn day_index(date: NaiveDate) -> usize {
        date.weekday().num_days_from_monday() as usize
    }

    pub fn base_value(&self, date: NaiveDate) -> i64 {
        self.values[Self::day_index(date)]
    }

    pub fn is_wager_day(&self, date: NaiveDate) -> bool {
        Self::day_index(date) == self.wager_day
    }
}

/// Where the ledger lives. Checked in this order: local CSV, published CSV, Postgres.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSetting {
    CsvFile(PathBuf),
    CsvUrl(String),
    Postgres(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub ledger_csv: Option<PathBuf>,
    pub ledger_csv_url: Option<String>,
    pub form_url: Option<String>,
    pub form_fields: Option<String>,
    pub session_path: PathBuf,
    pub rules_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_url: non_empty_var("DATABASE_URL"),
            ledger_csv: non_empty_var("LEDGER_CSV").map(PathBuf::from),
            ledger_csv_url: non_empty_var("LEDGER_CSV_URL"),
            form_url: non_empty_var("LEDGER_FORM_URL"),
            form_fields: non_empty_var("LEDGER_FORM_FIELDS"),
            session_path: non_empty_var("SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_PATH)),
            rules_path: non_empty_var("GAME_RULES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_PATH)),
        }
    }

    pub fn backend(&self) -> anyhow::Result<BackendSetting> {
        if let Some(path) = &self.ledger_csv {
            return Ok(BackendSetting::CsvFile(path.clone()));
        }
        if let Some(url) = &self.ledger_csv_url {
            return Ok(BackendSetting::CsvUrl(url.clone()));
        }
        if let Some(url) = &self.database_url {
            return Ok(BackendSetting::Postgres(url.clone()));
        }
        bail!("no ledger configured: set LEDGER_CSV, LEDGER_CSV_URL or DATABASE_URL")
    }

    /// Form submission target for a published-CSV ledger, if configured.
    pub fn form_sink(&self) -> anyhow::Result<Option<FormSink>> {
        match (&self.form_url, &self.form_fields) {
            (Some(url), Some(fields)) => Ok(Some(FormSink::parse(url, fields)?)),
            (Some(_), None) => bail!("LEDGER_FORM_URL is set but LEDGER_FORM_FIELDS is not"),
            _ => Ok(None),
        }
    }

    pub fn postgres_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> AppConfig {
        AppConfig {
            database_url: None,
            ledger_csv: None,
            ledger_csv_url: None,
            form_url: None,
            form_fields: None,
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
        }
    }

    #[test]
    fn defaults_match_the_house_table() {
        let rules = GameRules::default();
        assert!(rules.validate().is_ok());
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(rules.base_value(tuesday), 600);
        assert!(!rules.is_wager_day(tuesday));
        assert!(rules.is_wager_day(sunday));
        assert_eq!(rules.base_value(sunday), 0);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let rules = GameRules::from_toml("max_submissions_per_day = 3\n").unwrap();
        assert_eq!(rules.max_submissions_per_day, 3);
        assert_eq!(rules.values, default_values());
    }

    #[test]
    fn rejects_wager_day_with_a_base_value() {
        let err = GameRules::from_toml("values = [0, 600, 1000, 400, 1200, 2000, 500]\nwager_day = 6\n")
            .unwrap_err();
        assert!(err.to_string().contains("wager day"));
    }

    #[test]
    fn rejects_values_beyond_the_amount_range() {
        let toml = format!("values = [200, 600, 1000, 400, 1200, {}, 0]\n", MAX_AMOUNT + 1);
        assert!(GameRules::from_toml(&toml).is_err());
    }

    #[test]
    fn rejects_short_tables() {
        assert!(GameRules::from_toml("values = [100, 200]\n").is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let rules = GameRules::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(rules, GameRules::default());
    }

    #[test]
    fn reads_rules_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "values = [100, 200, 300, 400, 500, 0, 600]").unwrap();
        writeln!(file, "wager_day = 5").unwrap();

        let rules = GameRules::load(&path).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        assert!(rules.is_wager_day(saturday));
    }

    #[test]
    fn form_sink_needs_field_ids() {
        let mut cfg = config();
        assert_eq!(cfg.form_sink().unwrap(), None);

        cfg.form_url = Some("https://forms.example.com/formResponse".to_string());
        assert!(cfg.form_sink().is_err());

        cfg.form_fields = Some("entry.1,entry.2,entry.3,entry.4,entry.5".to_string());
        let sink = cfg.form_sink().unwrap().unwrap();
        assert_eq!(sink.fields[3], "entry.4");
    }

    #[test]
    fn backend_precedence_prefers_local_csv() {
        let mut cfg = config();
        assert!(cfg.backend().is_err());

        cfg.database_url = Some("postgres://localhost/jeopardy".to_string());
        assert_eq!(
            cfg.backend().unwrap(),
            BackendSetting::Postgres("postgres://localhost/jeopardy".to_string())
        );

        cfg.ledger_csv_url = Some("https://example.com/pub?output=csv".to_string());
        assert!(matches!(cfg.backend().unwrap(), BackendSetting::CsvUrl(_)));

        cfg.ledger_csv = Some(PathBuf::from("scores.csv"));
        assert_eq!(
            cfg.backend().unwrap(),
            BackendSetting::CsvFile(PathBuf::from("scores.csv"))
        );
    }
}
