use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::Entry;

/// Collapsed view of a ledger: one entry per (player, date), plus how many raw
/// submissions each key received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
    canonical: Vec<Entry>,
    counts: HashMap<(String, NaiveDate), usize>,
}

impl Reduction {
    /// Canonical entries, ordered by the arrival of each key's winning entry.
    pub fn canonical(&self) -> &[Entry] {
        &self.canonical
    }

    pub fn into_canonical(self) -> Vec<Entry> {
        self.canonical
    }

    /// Raw submission count for a key. Zero when the player never logged that day.
    pub fn submission_count(&self, player: &str, date: NaiveDate) -> usize {
        self.counts
            .get(&(player.to_string(), date))
            .copied()
            .unwrap_or(0)
    }
}

/// Last write wins per (player, date).
pub fn reduce(entries: &[Entry]) -> Reduction {
    let mut latest: HashMap<(String, NaiveDate), usize> = HashMap::new();
    let mut counts: HashMap<(String, NaiveDate), usize> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let key = (entry.player.clone(), entry.date);
        *counts.entry(key.clone()).or_insert(0) += 1;
        latest.insert(key, index);
    }

    let mut winners: Vec<usize> = latest.into_values().collect();
    winners.sort_unstable();

    Reduction {
        canonical: winners.into_iter().map(|index| entries[index].clone()).collect(),
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn entry(player: &str, date: NaiveDate, outcome: Outcome, amount: i64) -> Entry {
        Entry {
            player: player.to_string(),
            date,
            outcome,
            amount,
        }
    }

    #[test]
    fn later_submission_overwrites_earlier() {
        let ledger = vec![
            entry("Alice", day(1), Outcome::Correct, 200),
            entry("Alice", day(1), Outcome::Incorrect, -200),
        ];
        let reduced = reduce(&ledger);
        assert_eq!(reduced.canonical().len(), 1);
        assert_eq!(reduced.canonical()[0].amount, -200);
        assert_eq!(reduced.submission_count("Alice", day(1)), 2);
    }

    #[test]
    fn distinct_keys_survive_in_arrival_order() {
        let ledger = vec![
            entry("Alice", day(1), Outcome::Correct, 200),
            entry("Bo", day(1), Outcome::Pass, 0),
            entry("Alice", day(2), Outcome::Correct, 600),
            entry("Alice", day(1), Outcome::Pass, 0),
        ];
        let reduced = reduce(&ledger);
        let keys: Vec<(&str, NaiveDate)> = reduced
            .canonical()
            .iter()
            .map(|e| (e.player.as_str(), e.date))
            .collect();
        assert_eq!(keys, vec![("Bo", day(1)), ("Alice", day(2)), ("Alice", day(1))]);
    }

    #[test]
    fn reducing_twice_changes_nothing() {
        let ledger = vec![
            entry("Alice", day(1), Outcome::Correct, 200),
            entry("Bo", day(2), Outcome::Incorrect, -600),
            entry("Alice", day(1), Outcome::Incorrect, -200),
            entry("Bo", day(2), Outcome::Correct, 600),
            entry("Cy", day(3), Outcome::Pass, 0),
        ];
        let once = reduce(&ledger);
        let twice = reduce(once.canonical());
        assert_eq!(once.canonical(), twice.canonical());
    }

    #[test]
    fn unknown_key_counts_zero() {
        let reduced = reduce(&[]);
        assert!(reduced.canonical().is_empty());
        assert_eq!(reduced.submission_count("Nobody", day(5)), 0);
    }
}
