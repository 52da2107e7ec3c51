use std::fmt::Write;

use crate::models::{
    AnnualPivotRow, GridCell, LeaderboardRow, Leaderboards, MonthCell, WeeklyGridRow,
};
use crate::source::SourceStatus;

const DAY_HEADERS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTH_HEADERS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `$1,200` and `-$600`.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if amount < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

fn cell_symbol(cell: GridCell) -> &'static str {
    match cell {
        GridCell::Win => "✅",
        GridCell::Loss => "❌",
        GridCell::Pass => "➖",
        GridCell::Absent => " ",
    }
}

pub fn build_report(boards: &Leaderboards, status: &SourceStatus, pending: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Services Jeopardy Leaderboard");
    let _ = writeln!(
        output,
        "Standings as of {} (week of {})",
        boards.as_of, boards.week_start
    );

    if let SourceStatus::Unavailable { reason } = status {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> Ledger unavailable ({reason}). Only scores recorded in this session are shown."
        );
    }
    if pending > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> {pending} score(s) recorded here are still waiting to appear upstream."
        );
    }

    if boards.all_time_totals.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No scores recorded yet.");
        return output;
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## This Week");
    write_grid(&mut output, &boards.weekly_grid);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Totals");
    write_totals(&mut output, &boards.weekly_totals, "No scores this week yet.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Totals");
    write_totals(&mut output, &boards.monthly_totals, "No scores this month yet.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## This Year");
    write_pivot(&mut output, &boards.annual_pivot);

    let _ = writeln!(output);
    let _ = writeln!(output, "## All Time");
    write_totals(&mut output, &boards.all_time_totals, "No scores recorded yet.");

    output
}

fn write_grid(output: &mut String, rows: &[WeeklyGridRow]) {
    // Columns are always all seven days, even on an empty week.
    let _ = writeln!(output, "| Player | {} | Total |", DAY_HEADERS.join(" | "));
    let _ = writeln!(output, "|---|{}---|", "---|".repeat(DAY_HEADERS.len()));
    for row in rows {
        let cells: Vec<&str> = row.days.iter().map(|cell| cell_symbol(*cell)).collect();
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            row.player,
            cells.join(" | "),
            format_amount(row.total)
        );
    }
    if rows.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No scores this week yet.");
    }
}

fn write_totals(output: &mut String, rows: &[LeaderboardRow], empty: &str) {
    if rows.is_empty() {
        let _ = writeln!(output, "{empty}");
        return;
    }
    let _ = writeln!(output, "| Rank | Player | Total |");
    let _ = writeln!(output, "|---|---|---|");
    for (rank, row) in rows.iter().enumerate() {
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            rank + 1,
            row.player,
            format_amount(row.total)
        );
    }
}

fn write_pivot(output: &mut String, rows: &[AnnualPivotRow]) {
    if rows.is_empty() {
        let _ = writeln!(output, "No scores this year yet.");
        return;
    }
    let _ = writeln!(output, "| Player | {} | Total |", MONTH_HEADERS.join(" | "));
    let _ = writeln!(output, "|---|{}---|", "---|".repeat(MONTH_HEADERS.len()));
    for row in rows {
        let cells: Vec<String> = row
            .months
            .iter()
            .map(|cell| match cell {
                MonthCell::Amount(amount) => format_amount(*amount),
                MonthCell::NotOccurred => "—".to_string(),
            })
            .collect();
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            row.player,
            cells.join(" | "),
            format_amount(row.total)
        );
    }
}
