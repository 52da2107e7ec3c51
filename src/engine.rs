use chrono::NaiveDate;

use crate::config::GameRules;
use crate::leaderboard;
use crate::ledger::{self, Reduction};
use crate::models::{Entry, Leaderboards, RawEntry, SubmissionRequest};
use crate::normalize;
use crate::scoring::{self, Decision};
use crate::session::SessionBuffer;
use crate::source::LedgerSnapshot;

/// One evaluation cycle: raw rows in, canonical ledger and decisions out.
/// Built fresh from a snapshot every time.
#[derive(Debug, Clone)]
pub struct Evaluation {
    rules: GameRules,
    ledger: Vec<Entry>,
    reduction: Reduction,
}

impl Evaluation {
    pub fn build(rules: GameRules, rows: &[RawEntry]) -> Self {
        let ledger = normalize::normalize_all(rows);
        let reduction = ledger::reduce(&ledger);
        tracing::debug!(
            rows = rows.len(),
            entries = ledger.len(),
            canonical = reduction.canonical().len(),
            "ledger evaluated"
        );
        Self {
            rules,
            ledger,
            reduction,
        }
    }

    /// Snapshot rows followed by the session's own rows.
    pub fn from_snapshot(rules: GameRules, snapshot: &LedgerSnapshot, session: &SessionBuffer) -> Self {
        let rows = session.merge_into(snapshot.rows.clone());
        Self::build(rules, &rows)
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn ledger(&self) -> &[Entry] {
        &self.ledger
    }

    pub fn canonical(&self) -> &[Entry] {
        self.reduction.canonical()
    }

    pub fn submission_count(&self, player: &str, date: NaiveDate) -> usize {
        self.reduction.submission_count(player, date)
    }

    pub fn week_to_date_total(&self, player: &str, date: NaiveDate) -> i64 {
        scoring::week_to_date_total(player, date, self.canonical())
    }

    pub fn wager_ceiling(&self, player: &str, date: NaiveDate) -> i64 {
        scoring::wager_ceiling(player, date, self.canonical())
    }

    pub fn decide(&self, request: &SubmissionRequest) -> Decision {
        scoring::compute_submission(&self.rules, request, &self.reduction)
    }

    pub fn leaderboards(&self, as_of: NaiveDate) -> Leaderboards {
        leaderboard::aggregate(self.canonical(), as_of)
    }

    /// Everyone who has ever logged a score, sorted.
    pub fn players(&self) -> Vec<String> {
        let mut players: Vec<String> = self.ledger.iter().map(|entry| entry.player.clone()).collect();
        players.sort();
        players.dedup();
        players
    }
}
