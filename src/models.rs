use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A row exactly as the ledger source hands it over. Nothing here is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(rename = "User")]
    pub player: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Day")]
    pub day: String,
    #[serde(rename = "Result")]
    pub result: String,
    #[serde(rename = "Amount")]
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    Correct,
    Incorrect,
    Pass,
    CorrectWager,
    IncorrectWager,
    /// Label we do not know. Carried through but never scored.
    Unrecognized(String),
}

impl Outcome {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Correct" => Outcome::Correct,
            "Incorrect" => Outcome::Incorrect,
            "Pass" => Outcome::Pass,
            "Correct (Wager)" => Outcome::CorrectWager,
            "Incorrect (Wager)" => Outcome::IncorrectWager,
            other => Outcome::Unrecognized(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Outcome::Correct => "Correct",
            Outcome::Incorrect => "Incorrect",
            Outcome::Pass => "Pass",
            Outcome::CorrectWager => "Correct (Wager)",
            Outcome::IncorrectWager => "Incorrect (Wager)",
            Outcome::Unrecognized(label) => label,
        }
    }

    /// Forces `amount` onto the sign this outcome implies.
    pub fn signed_amount(&self, amount: i64) -> i64 {
        match self {
            Outcome::Correct | Outcome::CorrectWager => amount.saturating_abs(),
            Outcome::Incorrect | Outcome::IncorrectWager => amount.saturating_abs().saturating_neg(),
            Outcome::Pass => 0,
            Outcome::Unrecognized(_) => amount,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub player: String,
    pub date: NaiveDate,
    pub outcome: Outcome,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub player: String,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCell {
    Win,
    Loss,
    Pass,
    /// No entry for that day. Distinct from a logged pass.
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyGridRow {
    pub player: String,
    /// Monday-first.
    pub days: [GridCell; 7],
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthCell {
    Amount(i64),
    NotOccurred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnualPivotRow {
    pub player: String,
    /// January-first.
    pub months: [MonthCell; 12],
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboards {
    pub as_of: NaiveDate,
    pub week_start: NaiveDate,
    pub weekly_grid: Vec<WeeklyGridRow>,
    pub weekly_totals: Vec<LeaderboardRow>,
    pub monthly_totals: Vec<LeaderboardRow>,
    pub annual_pivot: Vec<AnnualPivotRow>,
    pub all_time_totals: Vec<LeaderboardRow>,
}

/// What the player picked in the submission form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Choice {
    Correct,
    Incorrect,
    Pass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub player: String,
    pub date: NaiveDate,
    pub choice: Choice,
    pub wager: Option<i64>,
}

/// A validated tuple ready for the submission sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub player: String,
    pub date: NaiveDate,
    pub day: String,
    pub outcome: Outcome,
    pub amount: i64,
}

impl Submission {
    pub fn to_raw(&self) -> RawEntry {
        RawEntry {
            player: self.player.clone(),
            date: self.date.format("%Y-%m-%d").to_string(),
            day: self.day.clone(),
            result: self.outcome.label().to_string(),
            amount: self.amount.to_string(),
        }
    }
}
