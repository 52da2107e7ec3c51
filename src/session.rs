use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::RawEntry;
use crate::normalize::parse_date;

/// Buffered rows older than this are assumed lost upstream and dropped.
pub const STALE_AFTER_DAYS: i64 = 7;

/// A row recorded from this machine, waiting to show up upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRow {
    #[serde(flatten)]
    pub row: RawEntry,
    /// Upstream rows for the same player and day that must exist before this
    /// one is considered propagated.
    pub visible_at: usize,
    pub recorded_on: NaiveDate,
}

/// Rows recorded from this machine that the upstream ledger may not show yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBuffer {
    pub entries: Vec<PendingRow>,
}

impl SessionBuffer {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("session file {} is not valid JSON", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write session file {}", path.display()))
    }

    /// Buffers `row`, remembering how many rows for its player and day the
    /// upstream ledger must carry before this one counts as propagated.
    pub fn push(&mut self, row: RawEntry, upstream: &[RawEntry], today: NaiveDate) {
        let visible_at = match row_key(&row) {
            Some(key) => {
                let seen = count_for(upstream, &key);
                let queued = self
                    .entries
                    .iter()
                    .filter(|pending| row_key(&pending.row).as_ref() == Some(&key))
                    .map(|pending| pending.visible_at)
                    .max()
                    .unwrap_or(0);
                seen.max(queued) + 1
            }
            None => 1,
        };

        self.entries.push(PendingRow {
            row,
            visible_at,
            recorded_on: today,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops buffered rows the upstream ledger now carries. Rows are matched
    /// by player and calendar day, whatever date format upstream uses.
    /// Returns how many were dropped.
    pub fn reconcile(&mut self, upstream: &[RawEntry]) -> usize {
        let mut counts: HashMap<(String, NaiveDate), usize> = HashMap::new();
        for key in upstream.iter().filter_map(row_key) {
            *counts.entry(key).or_insert(0) += 1;
        }

        let before = self.entries.len();
        self.entries.retain(|pending| match row_key(&pending.row) {
            Some(key) => counts.get(&key).copied().unwrap_or(0) < pending.visible_at,
            // Never scores, so there is nothing to wait for.
            None => false,
        });
        before - self.entries.len()
    }

    /// Forgets rows buffered more than `STALE_AFTER_DAYS` ago. Returns how
    /// many were dropped.
    pub fn prune_stale(&mut self, today: NaiveDate) -> usize {
        let cutoff = today - Duration::days(STALE_AFTER_DAYS);
        let before = self.entries.len();
        self.entries.retain(|pending| {
            if pending.recorded_on >= cutoff {
                return true;
            }
            warn!(
                player = %pending.row.player,
                date = %pending.row.date,
                recorded_on = %pending.recorded_on,
                "buffered row never appeared upstream; dropping it"
            );
            false
        });
        before - self.entries.len()
    }

    /// Upstream rows first, then this session's rows in submission order.
    pub fn merge_into(&self, mut upstream: Vec<RawEntry>) -> Vec<RawEntry> {
        upstream.extend(self.entries.iter().map(|pending| pending.row.clone()));
        upstream
    }
}

fn row_key(row: &RawEntry) -> Option<(String, NaiveDate)> {
    let player = row.player.trim();
    if player.is_empty() {
        return None;
    }
    parse_date(&row.date).map(|date| (player.to_string(), date))
}

fn count_for(rows: &[RawEntry], key: &(String, NaiveDate)) -> usize {
    rows.iter()
        .filter(|row| row_key(row).as_ref() == Some(key))
        .count()
}
