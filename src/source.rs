use std::fs::OpenOptions;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::config::BackendSetting;
use crate::db;
use crate::models::{RawEntry, Submission};

pub const CSV_HEADERS: [&str; 5] = ["User", "Date", "Day", "Result", "Amount"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Fresh,
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub rows: Vec<RawEntry>,
    pub status: SourceStatus,
}

impl LedgerSnapshot {
    pub fn fresh(rows: Vec<RawEntry>) -> Self {
        Self {
            rows,
            status: SourceStatus::Fresh,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            status: SourceStatus::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SourceStatus::Fresh
    }
}

/// A web form that accepts one submission per POST, keyed by form field ids
/// listed in `User,Date,Day,Result,Amount` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSink {
    pub url: String,
    pub fields: [String; 5],
}

impl FormSink {
    pub fn parse(url: &str, fields: &str) -> anyhow::Result<Self> {
        let ids: Vec<String> = fields
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let fields: [String; 5] = ids
            .try_into()
            .map_err(|ids: Vec<String>| anyhow::anyhow!("expected 5 form field ids, found {}", ids.len()))?;
        Ok(Self {
            url: url.to_string(),
            fields,
        })
    }

    fn payload(&self, row: &RawEntry) -> Vec<(String, String)> {
        let values = [&row.player, &row.date, &row.day, &row.result, &row.amount];
        self.fields
            .iter()
            .cloned()
            .zip(values.iter().map(|value| value.to_string()))
            .collect()
    }
}

/// Where raw rows come from and where new ones go. A failed fetch becomes an
/// unavailable snapshot with no rows.
pub enum LedgerBackend {
    CsvFile(PathBuf),
    CsvUrl {
        client: reqwest::Client,
        url: String,
        form: Option<FormSink>,
    },
    Postgres(PgPool),
}

impl LedgerBackend {
    pub async fn connect(setting: BackendSetting, form: Option<FormSink>) -> anyhow::Result<Self> {
        let backend = match setting {
            BackendSetting::CsvFile(path) => LedgerBackend::CsvFile(path),
            BackendSetting::CsvUrl(url) => LedgerBackend::CsvUrl {
                client: reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(15))
                    .build()?,
                url,
                form,
            },
            BackendSetting::Postgres(database_url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&database_url)
                    .await
                    .context("failed to connect to Postgres")?;
                LedgerBackend::Postgres(pool)
            }
        };
        Ok(backend)
    }

    pub fn describe(&self) -> String {
        match self {
            LedgerBackend::CsvFile(path) => format!("csv file {}", path.display()),
            LedgerBackend::CsvUrl { url, .. } => format!("published csv {url}"),
            LedgerBackend::Postgres(_) => "postgres".to_string(),
        }
    }

    /// Raw rows in arrival order.
    pub async fn fetch(&self) -> anyhow::Result<Vec<RawEntry>> {
        match self {
            LedgerBackend::CsvFile(path) => read_csv_file(path),
            LedgerBackend::CsvUrl { client, url, .. } => {
                let response = client
                    .get(cache_busted(url, Utc::now().timestamp()))
                    .send()
                    .await?
                    .error_for_status()?;
                let body = response.text().await?;
                read_rows(body.as_bytes())
            }
            LedgerBackend::Postgres(pool) => db::fetch_entries(pool).await,
        }
    }

    pub async fn load_snapshot(&self) -> LedgerSnapshot {
        match self.fetch().await {
            Ok(rows) => {
                debug!(source = %self.describe(), rows = rows.len(), "ledger fetched");
                LedgerSnapshot::fresh(rows)
            }
            Err(err) => {
                warn!(source = %self.describe(), error = %err, "ledger unavailable, treating as empty");
                LedgerSnapshot::unavailable(format!("{err:#}"))
            }
        }
    }

    pub async fn record(&self, submission: &Submission) -> anyhow::Result<()> {
        let row = submission.to_raw();
        match self {
            LedgerBackend::CsvFile(path) => append_csv_row(path, &row),
            LedgerBackend::CsvUrl { client, form, .. } => {
                let Some(form) = form else {
                    bail!("published csv ledger is read-only; set LEDGER_FORM_URL to submit");
                };
                client
                    .post(&form.url)
                    .form(&form.payload(&row))
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(())
            }
            LedgerBackend::Postgres(pool) => db::record_entry(pool, submission).await,
        }
    }

    /// Submission sink contract: success or failure, no retries.
    pub async fn submit(&self, submission: &Submission) -> bool {
        match self.record(submission).await {
            Ok(()) => {
                info!(
                    player = %submission.player,
                    date = %submission.date,
                    amount = submission.amount,
                    "submission recorded"
                );
                true
            }
            Err(err) => {
                warn!(source = %self.describe(), error = %err, "submission failed");
                false
            }
        }
    }
}

fn cache_busted(url: &str, stamp: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}t={stamp}")
}

pub fn read_csv_file(path: &Path) -> anyhow::Result<Vec<RawEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open ledger {}", path.display()))?;
    read_rows(file)
}

/// Reads ledger rows by header name. Headers are matched case-insensitively,
/// unknown columns are ignored and missing ones read as empty strings.
pub fn read_rows<R: Read>(reader: R) -> anyhow::Result<Vec<RawEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    };
    let columns: Vec<Option<usize>> = CSV_HEADERS.iter().map(|&name| column(name)).collect();
    if columns[0].is_none() || columns[1].is_none() {
        bail!("ledger is missing the User or Date column");
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                debug!(line, error = %err, "skipping unreadable ledger line");
                continue;
            }
        };
        let field = |index: usize| {
            columns[index]
                .and_then(|position| record.get(position))
                .unwrap_or_default()
                .to_string()
        };
        rows.push(RawEntry {
            player: field(0),
            date: field(1),
            day: field(2),
            result: field(3),
            amount: field(4),
        });
    }

    Ok(rows)
}

pub fn append_csv_row(path: &Path, row: &RawEntry) -> anyhow::Result<()> {
    let needs_header = std::fs::metadata(path).map(|meta| meta.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open ledger {} for append", path.display()))?;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(CSV_HEADERS)?;
    }
    writer.write_record([&row.player, &row.date, &row.day, &row.result, &row.amount])?;
    writer.flush()?;
    Ok(())
}
