use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use services_jeopardy::config::{AppConfig, GameRules};
use services_jeopardy::db;
use services_jeopardy::engine::Evaluation;
use services_jeopardy::models::{Choice, SubmissionRequest};
use services_jeopardy::report::{self, format_amount};
use services_jeopardy::scoring::{day_name, DAY_NAMES};
use services_jeopardy::session::SessionBuffer;
use services_jeopardy::source::{LedgerBackend, LedgerSnapshot};

#[derive(Parser)]
#[command(name = "jeopardy")]
#[command(about = "Score tracker and leaderboards for Services Jeopardy", long_about = None)]
struct Cli {
    /// Local CSV ledger, overrides LEDGER_CSV
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
    /// Published CSV ledger URL, overrides LEDGER_CSV_URL
    #[arg(long, global = true)]
    ledger_url: Option<String>,
    /// Weekday value table, overrides GAME_RULES_PATH
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    /// Session buffer file, overrides SESSION_PATH
    #[arg(long, global = true)]
    session: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres schema
    InitDb,
    /// Load a demo week into Postgres
    Seed,
    /// Copy a CSV ledger into Postgres
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Render every leaderboard as markdown
    Board {
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the week-to-date total and wager ceiling
    Wager {
        #[arg(long)]
        player: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Log a result for a day
    Submit {
        #[arg(long)]
        player: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum)]
        result: Choice,
        #[arg(long)]
        wager: Option<i64>,
    },
    /// List everyone who has logged a score
    Players,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(path) = cli.ledger {
        config.ledger_csv = Some(path);
    }
    if let Some(url) = cli.ledger_url {
        config.ledger_csv_url = Some(url);
    }
    if let Some(path) = cli.rules {
        config.rules_path = path;
    }
    if let Some(path) = cli.session {
        config.session_path = path;
    }
    let rules = GameRules::load(&config.rules_path)?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect_postgres(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect_postgres(&config).await?;
            let inserted = db::seed(&pool, &rules).await?;
            println!("Inserted {inserted} seed entries.");
        }
        Commands::Import { csv } => {
            let pool = connect_postgres(&config).await?;
            let summary = db::import_csv(&pool, &csv).await?;
            println!(
                "Inserted {} entries from {} ({} skipped).",
                summary.inserted,
                csv.display(),
                summary.skipped
            );
        }
        Commands::Board { as_of, out } => {
            let backend = connect_backend(&config).await?;
            let (snapshot, session) = load_cycle(&backend, &config.session_path).await?;
            let evaluation = Evaluation::from_snapshot(rules, &snapshot, &session);
            let boards = evaluation.leaderboards(as_of.unwrap_or_else(today));
            let report = report::build_report(&boards, &snapshot.status, session.len());

            match out {
                Some(path) => {
                    std::fs::write(&path, report)?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::Wager { player, date } => {
            let date = date.unwrap_or_else(today);
            let backend = connect_backend(&config).await?;
            let (snapshot, session) = load_cycle(&backend, &config.session_path).await?;
            let evaluation = Evaluation::from_snapshot(rules, &snapshot, &session);
            let player = player.trim();

            if !evaluation.rules().is_wager_day(date) {
                println!(
                    "{} is a {} worth {}; wagers are placed on {}.",
                    date,
                    day_name(date),
                    format_amount(evaluation.rules().base_value(date)),
                    DAY_NAMES[evaluation.rules().wager_day]
                );
                return Ok(());
            }

            println!(
                "Week total: {}",
                format_amount(evaluation.week_to_date_total(player, date))
            );
            println!(
                "Max wager: {}",
                format_amount(evaluation.wager_ceiling(player, date))
            );
        }
        Commands::Submit {
            player,
            date,
            result,
            wager,
        } => {
            let backend = connect_backend(&config).await?;
            let (snapshot, mut session) = load_cycle(&backend, &config.session_path).await?;
            if !snapshot.is_available() {
                println!("Could not read the ledger, so the edit limit cannot be checked; nothing was saved.");
                return Ok(());
            }
            let evaluation = Evaluation::from_snapshot(rules, &snapshot, &session);

            let decision = evaluation.decide(&SubmissionRequest {
                player,
                date: date.unwrap_or_else(today),
                choice: result,
                wager,
            });
            let submission = decision.submission;

            if !decision.allowed {
                let reason = decision
                    .reason
                    .map(|reason| reason.to_string())
                    .unwrap_or_else(|| "rejected".to_string());
                println!("Not saved: {reason}.");
                return Ok(());
            }

            if backend.submit(&submission).await {
                session.push(submission.to_raw(), &snapshot.rows, today());
                session.save(&config.session_path)?;
                println!(
                    "Saved {} on {} ({}): {} {}.",
                    submission.player,
                    submission.date,
                    submission.day,
                    submission.outcome,
                    format_amount(submission.amount)
                );
            } else {
                println!("Could not reach the ledger; nothing was saved.");
            }
        }
        Commands::Players => {
            let backend = connect_backend(&config).await?;
            let (snapshot, session) = load_cycle(&backend, &config.session_path).await?;
            let evaluation = Evaluation::from_snapshot(rules, &snapshot, &session);
            let players = evaluation.players();

            if players.is_empty() {
                println!("No players yet.");
            }
            for player in players {
                println!("- {player}");
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "services_jeopardy=info,jeopardy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Game days follow the players' wall clock, not UTC.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn connect_postgres(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(config.postgres_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn connect_backend(config: &AppConfig) -> anyhow::Result<LedgerBackend> {
    LedgerBackend::connect(config.backend()?, config.form_sink()?).await
}

/// Fetches the ledger and the session buffer, dropping buffered rows the
/// ledger already shows and rows that have waited too long.
async fn load_cycle(
    backend: &LedgerBackend,
    session_path: &Path,
) -> anyhow::Result<(LedgerSnapshot, SessionBuffer)> {
    let snapshot = backend.load_snapshot().await;
    let mut session = SessionBuffer::load(session_path)?;
    if session.is_empty() {
        return Ok((snapshot, session));
    }

    let mut dropped = session.prune_stale(today());
    if snapshot.is_available() {
        let visible = session.reconcile(&snapshot.rows);
        if visible > 0 {
            tracing::debug!(visible, "session rows now visible upstream");
        }
        dropped += visible;
    }
    if dropped > 0 {
        session.save(session_path)?;
    }

    Ok((snapshot, session))
}
