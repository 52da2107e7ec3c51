use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use crate::config::GameRules;
use crate::models::{
    AnnualPivotRow, Entry, GridCell, LeaderboardRow, Leaderboards, MonthCell, Outcome,
    WeeklyGridRow,
};
use crate::scoring::week_start;

/// Every view at once, recomputed from the canonical ledger.
pub fn aggregate(canonical: &[Entry], as_of: NaiveDate) -> Leaderboards {
    let week_from = week_start(as_of);
    let month_from = as_of.with_day(1).unwrap_or(as_of);
    let year_from = NaiveDate::from_ymd_opt(as_of.year(), 1, 1).unwrap_or(as_of);

    let this_week = window(canonical, week_from, as_of);
    let this_month = window(canonical, month_from, as_of);
    let this_year = window(canonical, year_from, as_of);

    Leaderboards {
        as_of,
        week_start: week_from,
        weekly_grid: weekly_grid(&this_week),
        weekly_totals: totals(this_week.iter().copied()),
        monthly_totals: totals(this_month.iter().copied()),
        annual_pivot: annual_pivot(&this_year, as_of),
        all_time_totals: totals(canonical.iter()),
    }
}

fn window(canonical: &[Entry], from: NaiveDate, to: NaiveDate) -> Vec<&Entry> {
    canonical
        .iter()
        .filter(|entry| entry.date >= from && entry.date <= to)
        .collect()
}

/// Sums per player, highest first. Equal totals fall back to player name.
pub fn totals<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Vec<LeaderboardRow> {
    let mut sums: HashMap<&str, i64> = HashMap::new();
    for entry in entries {
        let sum = sums.entry(entry.player.as_str()).or_insert(0);
        *sum = sum.saturating_add(entry.amount);
    }

    let mut rows: Vec<LeaderboardRow> = sums
        .into_iter()
        .map(|(player, total)| LeaderboardRow {
            player: player.to_string(),
            total,
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.player.cmp(&b.player)));
    rows
}

pub fn grid_cell(outcome: &Outcome) -> GridCell {
    match outcome {
        Outcome::Correct | Outcome::CorrectWager => GridCell::Win,
        Outcome::Incorrect | Outcome::IncorrectWager => GridCell::Loss,
        // Unknown labels are inert: the player showed up but nothing was scored.
        Outcome::Pass | Outcome::Unrecognized(_) => GridCell::Pass,
    }
}

fn weekly_grid(week: &[&Entry]) -> Vec<WeeklyGridRow> {
    let mut rows: HashMap<&str, WeeklyGridRow> = HashMap::new();
    for entry in week {
        let row = rows
            .entry(entry.player.as_str())
            .or_insert_with(|| WeeklyGridRow {
                player: entry.player.clone(),
                days: [GridCell::Absent; 7],
                total: 0,
            });
        row.days[GameRules::day_index(entry.date)] = grid_cell(&entry.outcome);
        row.total = row.total.saturating_add(entry.amount);
    }

    let mut rows: Vec<WeeklyGridRow> = rows.into_values().collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.player.cmp(&b.player)));
    rows
}

fn annual_pivot(year: &[&Entry], as_of: NaiveDate) -> Vec<AnnualPivotRow> {
    let elapsed = as_of.month0() as usize;
    let blank = || {
        let mut months = [MonthCell::NotOccurred; 12];
        for cell in months.iter_mut().take(elapsed + 1) {
            *cell = MonthCell::Amount(0);
        }
        months
    };

    let mut rows: HashMap<&str, AnnualPivotRow> = HashMap::new();
    for entry in year {
        let row = rows
            .entry(entry.player.as_str())
            .or_insert_with(|| AnnualPivotRow {
                player: entry.player.clone(),
                months: blank(),
                total: 0,
            });
        if let MonthCell::Amount(sum) = &mut row.months[entry.date.month0() as usize] {
            *sum = sum.saturating_add(entry.amount);
        }
        row.total = row.total.saturating_add(entry.amount);
    }

    let mut rows: Vec<AnnualPivotRow> = rows.into_values().collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.player.cmp(&b.player)));
    rows
}
