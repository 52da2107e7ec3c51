use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::config::GameRules;
use crate::ledger::Reduction;
use crate::models::{Choice, Entry, Outcome, Submission, SubmissionRequest};

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("player name is empty")]
    EmptyPlayer,
    #[error("edit limit reached")]
    EditLimitReached,
    #[error("a wager is required on the wager day")]
    WagerRequired,
    #[error("wager {wager} must not be negative")]
    NegativeWager { wager: i64 },
    #[error("wager {wager} exceeds ceiling {ceiling}")]
    WagerExceedsCeiling { wager: i64, ceiling: i64 },
    #[error("pass is not an option on the wager day")]
    PassNotAllowedOnWagerDay,
}

/// Outcome of running a submission through the rules. Rejections still carry
/// the tuple that would have been recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub submission: Submission,
    pub allowed: bool,
    pub reason: Option<RejectReason>,
}

impl Decision {
    fn allow(submission: Submission) -> Self {
        Self {
            submission,
            allowed: true,
            reason: None,
        }
    }

    fn reject(submission: Submission, reason: RejectReason) -> Self {
        Self {
            submission,
            allowed: false,
            reason: Some(reason),
        }
    }
}

pub fn day_name(date: NaiveDate) -> &'static str {
    DAY_NAMES[GameRules::day_index(date)]
}

/// Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(GameRules::day_index(date) as i64)
}

/// Canonical total for the player from the start of the week up to, not
/// including, `date`.
pub fn week_to_date_total(player: &str, date: NaiveDate, canonical: &[Entry]) -> i64 {
    let start = week_start(date);
    canonical
        .iter()
        .filter(|entry| entry.player == player && entry.date >= start && entry.date < date)
        .fold(0i64, |total, entry| total.saturating_add(entry.amount))
}

pub fn wager_ceiling(player: &str, date: NaiveDate, canonical: &[Entry]) -> i64 {
    week_to_date_total(player, date, canonical).saturating_abs()
}

pub fn compute_submission(
    rules: &GameRules,
    request: &SubmissionRequest,
    reduction: &Reduction,
) -> Decision {
    let player = request.player.trim();
    let date = request.date;
    let wager_day = rules.is_wager_day(date);

    let mut submission = Submission {
        player: player.to_string(),
        date,
        day: day_name(date).to_string(),
        outcome: outcome_for(request.choice, wager_day),
        amount: 0,
    };

    if player.is_empty() {
        return Decision::reject(submission, RejectReason::EmptyPlayer);
    }

    let prior = reduction.submission_count(player, date);
    if prior >= rules.max_submissions_per_day {
        debug!(player, %date, prior, "edit limit reached");
        return Decision::reject(submission, RejectReason::EditLimitReached);
    }

    if !wager_day {
        if request.wager.is_some() {
            debug!(player, %date, "ignoring wager on a fixed-value day");
        }
        let base = rules.base_value(date);
        submission.amount = match request.choice {
            Choice::Correct => base,
            Choice::Incorrect => -base,
            Choice::Pass => 0,
        };
        return Decision::allow(submission);
    }

    if request.choice == Choice::Pass {
        return Decision::reject(submission, RejectReason::PassNotAllowedOnWagerDay);
    }
    let Some(wager) = request.wager else {
        return Decision::reject(submission, RejectReason::WagerRequired);
    };
    if wager < 0 {
        return Decision::reject(submission, RejectReason::NegativeWager { wager });
    }

    let ceiling = wager_ceiling(player, date, reduction.canonical());
    if wager > ceiling {
        return Decision::reject(submission, RejectReason::WagerExceedsCeiling { wager, ceiling });
    }

    submission.amount = submission.outcome.signed_amount(wager);
    Decision::allow(submission)
}

fn outcome_for(choice: Choice, wager_day: bool) -> Outcome {
    match (choice, wager_day) {
        (Choice::Correct, false) => Outcome::Correct,
        (Choice::Incorrect, false) => Outcome::Incorrect,
        (Choice::Correct, true) => Outcome::CorrectWager,
        (Choice::Incorrect, true) => Outcome::IncorrectWager,
        (Choice::Pass, _) => Outcome::Pass,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::reduce;

    fn day(d: u32) -> NaiveDate {
        // 2024-01-01 is a Monday.
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn entry(player: &str, date: NaiveDate, amount: i64) -> Entry {
        let outcome = if amount > 0 {
            Outcome::Correct
        } else if amount < 0 {
            Outcome::Incorrect
        } else {
            Outcome::Pass
        };
        Entry {
            player: player.to_string(),
            date,
            outcome,
            amount,
        }
    }

    fn request(player: &str, date: NaiveDate, choice: Choice, wager: Option<i64>) -> SubmissionRequest {
        SubmissionRequest {
            player: player.to_string(),
            date,
            choice,
            wager,
        }
    }

    fn alice_week() -> Vec<Entry> {
        [200, -600, 1000, -400, 1200, 2000]
            .iter()
            .enumerate()
            .map(|(offset, amount)| entry("Alice", day(1 + offset as u32), *amount))
            .collect()
    }

    #[test]
    fn week_starts_on_monday() {
        assert_eq!(week_start(day(1)), day(1));
        assert_eq!(week_start(day(7)), day(1));
        assert_eq!(week_start(day(8)), day(8));
        assert_eq!(day_name(day(7)), "Sunday");
    }

    #[test]
    fn fixed_day_values() {
        let rules = GameRules::default();
        let reduction = reduce(&[]);
        let tuesday = day(2);

        let win = compute_submission(&rules, &request("Alice", tuesday, Choice::Correct, None), &reduction);
        let loss = compute_submission(&rules, &request("Alice", tuesday, Choice::Incorrect, None), &reduction);
        let pass = compute_submission(&rules, &request("Alice", tuesday, Choice::Pass, None), &reduction);

        assert!(win.allowed && loss.allowed && pass.allowed);
        assert_eq!(win.submission.amount, 600);
        assert_eq!(loss.submission.amount, -600);
        assert_eq!(pass.submission.amount, 0);
        assert_eq!(loss.submission.outcome, Outcome::Incorrect);
        assert_eq!(win.submission.day, "Tuesday");
    }

    #[test]
    fn one_edit_then_locked() {
        let rules = GameRules::default();
        let req = request("Alice", day(3), Choice::Correct, None);

        let fresh = reduce(&[]);
        assert!(compute_submission(&rules, &req, &fresh).allowed);

        let once = reduce(&[entry("Alice", day(3), 1000)]);
        assert!(compute_submission(&rules, &req, &once).allowed);

        let twice = reduce(&[entry("Alice", day(3), 1000), entry("Alice", day(3), -1000)]);
        let decision = compute_submission(&rules, &req, &twice);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(RejectReason::EditLimitReached));
        assert_eq!(decision.reason.unwrap().to_string(), "edit limit reached");
    }

    #[test]
    fn wager_ceiling_is_week_to_date_total() {
        let rules = GameRules::default();
        let reduction = reduce(&alice_week());
        let sunday = day(7);

        assert_eq!(wager_ceiling("Alice", sunday, reduction.canonical()), 3400);

        let too_much = compute_submission(&rules, &request("Alice", sunday, Choice::Correct, Some(3500)), &reduction);
        assert_eq!(
            too_much.reason,
            Some(RejectReason::WagerExceedsCeiling {
                wager: 3500,
                ceiling: 3400
            })
        );

        let all_in = compute_submission(&rules, &request("Alice", sunday, Choice::Incorrect, Some(3400)), &reduction);
        assert!(all_in.allowed);
        assert_eq!(all_in.submission.amount, -3400);
        assert_eq!(all_in.submission.outcome, Outcome::IncorrectWager);
    }

    #[test]
    fn ceiling_uses_canonical_entries_only() {
        let mut ledger = alice_week();
        // Monday edited from +200 to -200.
        ledger.push(entry("Alice", day(1), -200));
        let reduction = reduce(&ledger);
        assert_eq!(wager_ceiling("Alice", day(7), reduction.canonical()), 3000);
    }

    #[test]
    fn negative_week_still_gives_a_positive_ceiling() {
        let reduction = reduce(&[entry("Bo", day(2), -600), entry("Bo", day(3), -1000)]);
        assert_eq!(wager_ceiling("Bo", day(7), reduction.canonical()), 1600);
    }

    #[test]
    fn ceiling_ignores_previous_week_and_other_players() {
        let ledger = vec![
            entry("Bo", NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), 5000),
            entry("Cy", day(2), 600),
        ];
        let reduction = reduce(&ledger);
        assert_eq!(wager_ceiling("Bo", day(7), reduction.canonical()), 0);

        let rules = GameRules::default();
        let zero = compute_submission(&rules, &request("Bo", day(7), Choice::Correct, Some(0)), &reduction);
        assert!(zero.allowed);
        assert_eq!(zero.submission.amount, 0);

        let one = compute_submission(&rules, &request("Bo", day(7), Choice::Correct, Some(1)), &reduction);
        assert!(!one.allowed);
    }

    #[test]
    fn extreme_week_totals_do_not_overflow() {
        let reduction = reduce(&[entry("Bo", day(1), i64::MIN), entry("Bo", day(2), -600)]);
        assert_eq!(week_to_date_total("Bo", day(7), reduction.canonical()), i64::MIN);
        assert_eq!(wager_ceiling("Bo", day(7), reduction.canonical()), i64::MAX);
    }

    #[test]
    fn wager_day_validation() {
        let rules = GameRules::default();
        let reduction = reduce(&alice_week());
        let sunday = day(7);

        let missing = compute_submission(&rules, &request("Alice", sunday, Choice::Correct, None), &reduction);
        assert_eq!(missing.reason, Some(RejectReason::WagerRequired));

        let negative = compute_submission(&rules, &request("Alice", sunday, Choice::Correct, Some(-5)), &reduction);
        assert_eq!(negative.reason, Some(RejectReason::NegativeWager { wager: -5 }));

        let pass = compute_submission(&rules, &request("Alice", sunday, Choice::Pass, Some(0)), &reduction);
        assert_eq!(pass.reason, Some(RejectReason::PassNotAllowedOnWagerDay));
    }

    #[test]
    fn blank_player_rejected_first() {
        let rules = GameRules::default();
        let reduction = reduce(&[entry("", day(2), 600), entry("", day(2), 600)]);
        let decision = compute_submission(&rules, &request("  ", day(2), Choice::Correct, None), &reduction);
        assert_eq!(decision.reason, Some(RejectReason::EmptyPlayer));
    }
}
