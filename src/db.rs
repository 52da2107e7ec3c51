use std::path::Path;

use anyhow::Context;
use chrono::{Duration, Local, NaiveDate};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::config::GameRules;
use crate::models::{Outcome, RawEntry, Submission};
use crate::normalize;
use crate::scoring::{self, day_name};
use crate::source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Loads last week's full round for three players so every board has data.
pub async fn seed(pool: &PgPool, rules: &GameRules) -> anyhow::Result<usize> {
    let today = Local::now().date_naive();
    let monday = scoring::week_start(today) - Duration::days(7);
    let entries = seed_entries(rules, monday);

    let mut inserted = 0usize;
    for (player, submission) in entries {
        let source_key = format!("seed-{}-{}", player.to_lowercase(), submission.date);
        inserted += insert_entry(pool, &submission, &source_key).await?;
    }
    Ok(inserted)
}

fn seed_entries(rules: &GameRules, monday: NaiveDate) -> Vec<(String, Submission)> {
    // 1 = correct, -1 = incorrect, 0 = pass, Monday through Saturday.
    let players: [(&str, [i64; 6], bool); 3] = [
        ("Avery", [1, -1, 1, -1, 1, 1], true),
        ("Jules", [1, 1, 0, 1, -1, 0], false),
        ("Kiara", [-1, 1, 1, 0, 0, -1], true),
    ];

    let mut entries = Vec::new();
    for (player, results, wins_wager) in players {
        let mut week_total = 0i64;
        for (offset, result) in results.iter().enumerate() {
            let date = monday + Duration::days(offset as i64);
            if rules.is_wager_day(date) {
                continue;
            }
            let outcome = match *result {
                1 => Outcome::Correct,
                -1 => Outcome::Incorrect,
                _ => Outcome::Pass,
            };
            let amount = outcome.signed_amount(rules.base_value(date));
            week_total += amount;
            entries.push((
                player.to_string(),
                Submission {
                    player: player.to_string(),
                    date,
                    day: day_name(date).to_string(),
                    outcome,
                    amount,
                },
            ));
        }

        let wager_date = monday + Duration::days(rules.wager_day as i64);
        let outcome = if wins_wager {
            Outcome::CorrectWager
        } else {
            Outcome::IncorrectWager
        };
        entries.push((
            player.to_string(),
            Submission {
                player: player.to_string(),
                date: wager_date,
                day: day_name(wager_date).to_string(),
                amount: outcome.signed_amount(week_total.abs() / 2),
                outcome,
            },
        ));
    }
    entries
}

pub async fn fetch_entries(pool: &PgPool) -> anyhow::Result<Vec<RawEntry>> {
    let records = sqlx::query(
        "SELECT player, entry_date, day_label, result, amount \
         FROM jeopardy.entries \
         ORDER BY seq",
    )
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(records.len());
    for row in records {
        let date: NaiveDate = row.get("entry_date");
        let amount: i64 = row.get("amount");
        entries.push(RawEntry {
            player: row.get("player"),
            date: date.format("%Y-%m-%d").to_string(),
            day: row.get("day_label"),
            result: row.get("result"),
            amount: amount.to_string(),
        });
    }

    Ok(entries)
}

pub async fn record_entry(pool: &PgPool, submission: &Submission) -> anyhow::Result<()> {
    let source_key = format!("submit-{}", Uuid::new_v4());
    insert_entry(pool, submission, &source_key).await?;
    Ok(())
}

async fn insert_entry(pool: &PgPool, submission: &Submission, source_key: &str) -> anyhow::Result<usize> {
    let result = sqlx::query(
        r#"
        INSERT INTO jeopardy.entries
        (id, player, entry_date, day_label, result, amount, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&submission.player)
    .bind(submission.date)
    .bind(&submission.day)
    .bind(submission.outcome.label())
    .bind(submission.amount)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}

/// Copies a CSV ledger into Postgres in file order. Rows that cannot be placed
/// on a date are skipped; re-importing the same file inserts nothing new.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<ImportSummary> {
    let rows = source::read_csv_file(csv_path)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;
    let file_key = csv_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "ledger".to_string());

    let mut summary = ImportSummary {
        inserted: 0,
        skipped: 0,
    };

    for (index, raw) in rows.iter().enumerate() {
        let entry = match normalize::normalize(raw) {
            Ok(entry) => entry,
            Err(rejection) => {
                debug!(row = index, %rejection, "skipping import row");
                summary.skipped += 1;
                continue;
            }
        };

        let day = if raw.day.trim().is_empty() {
            day_name(entry.date).to_string()
        } else {
            raw.day.trim().to_string()
        };
        let submission = Submission {
            player: entry.player,
            date: entry.date,
            day,
            outcome: entry.outcome,
            amount: entry.amount,
        };

        let source_key = format!("import-{file_key}-{index}");
        summary.inserted += insert_entry(pool, &submission, &source_key).await?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::reduce;
    use crate::normalize::normalize_all;

    #[test]
    fn seed_week_is_consistent_with_the_rules() {
        let rules = GameRules::default();
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let entries = seed_entries(&rules, monday);
        assert_eq!(entries.len(), 21);

        let raws: Vec<RawEntry> = entries.iter().map(|(_, s)| s.to_raw()).collect();
        let reduction = reduce(&normalize_all(&raws));
        assert_eq!(reduction.canonical().len(), 21);

        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let avery_wager = entries
            .iter()
            .find(|(player, s)| player == "Avery" && s.date == sunday)
            .map(|(_, s)| s.amount)
            .unwrap();
        let ceiling = scoring::wager_ceiling("Avery", sunday, reduction.canonical());
        assert!(avery_wager.abs() <= ceiling);
    }
}
