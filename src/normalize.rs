use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::models::{Entry, Outcome, RawEntry};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("player name is empty")]
    EmptyPlayer,
    #[error("unparseable date '{raw}'")]
    UnparseableDate { raw: String },
}

/// Largest magnitude a single ledger amount may carry. Sums of many rows stay
/// far inside `i64`.
pub const MAX_AMOUNT: i64 = i32::MAX as i64;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

pub fn normalize(raw: &RawEntry) -> Result<Entry, Rejection> {
    let player = raw.player.trim();
    if player.is_empty() {
        return Err(Rejection::EmptyPlayer);
    }

    let date = parse_date(&raw.date).ok_or_else(|| Rejection::UnparseableDate {
        raw: raw.date.clone(),
    })?;
    let outcome = Outcome::from_label(raw.result.trim());
    let amount = outcome.signed_amount(parse_amount(&raw.amount));

    Ok(Entry {
        player: player.to_string(),
        date,
        outcome,
        amount,
    })
}

/// Normalizes every row, dropping the ones that cannot be placed on a date.
pub fn normalize_all(raws: &[RawEntry]) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(raws.len());
    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw) {
            Ok(entry) => entries.push(entry),
            Err(rejection) => debug!(row = index, %rejection, "dropping ledger row"),
        }
    }
    entries
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|datetime| datetime.date())
        })
}

/// Lenient amount parsing. Anything unreadable scores as zero; anything huge
/// is clamped to `MAX_AMOUNT`.
pub fn parse_amount(value: &str) -> i64 {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    if let Ok(whole) = cleaned.parse::<i64>() {
        return whole.clamp(-MAX_AMOUNT, MAX_AMOUNT);
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            value.round().clamp(-MAX_AMOUNT as f64, MAX_AMOUNT as f64) as i64
        }
        _ => 0,
    }
}
