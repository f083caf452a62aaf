//! Ranked-signal schedule keyed by trade date.
//!
//! Signal rows carry `(date, symbol, rank)`. For each rebalance date the
//! schedule keeps two views of the same ranking:
//! - the **entry window** (`rank ≤ top_n`): rank-ordered candidates to buy
//! - the **extended window** (`rank ≤ top_n + exit_buffer`): ranks used only
//!   to decide whether an already-held symbol should be sold

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One parsed row of the signals file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub rank: u32,
}

impl SignalRow {
    pub fn new(date: NaiveDate, symbol: impl Into<String>, rank: u32) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            rank,
        }
    }
}

/// An entry candidate on a rebalance date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub symbol: String,
    pub entry_rank: u32,
}

/// Everything the rebalance engine needs to know about one rebalance date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebalanceSlate {
    entries: Vec<ScheduleEntry>,
    window_ranks: HashMap<String, u32>,
}

impl RebalanceSlate {
    /// Entry candidates, best rank first, at most `top_n` long.
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn is_target(&self, symbol: &str) -> bool {
        self.entries.iter().any(|e| e.symbol == symbol)
    }

    /// Rank inside the extended window; `None` means outside it.
    pub fn exit_rank(&self, symbol: &str) -> Option<u32> {
        self.window_ranks.get(symbol).copied()
    }

    pub fn present_in_extended_window(&self, symbol: &str) -> bool {
        self.window_ranks.contains_key(symbol)
    }

    fn from_rows(rows: &[&SignalRow], top_n: usize, window: usize) -> Option<Self> {
        let mut ranked: Vec<&SignalRow> = rows
            .iter()
            .copied()
            .filter(|r| r.rank >= 1 && r.rank as usize <= window)
            .collect();
        ranked.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.symbol.cmp(&b.symbol)));

        let mut window_ranks = HashMap::new();
        let mut entries = Vec::new();
        for row in ranked {
            if window_ranks.contains_key(&row.symbol) {
                continue;
            }
            window_ranks.insert(row.symbol.clone(), row.rank);
            if row.rank as usize <= top_n && entries.len() < top_n {
                entries.push(ScheduleEntry {
                    symbol: row.symbol.clone(),
                    entry_rank: row.rank,
                });
            }
        }

        (!window_ranks.is_empty()).then_some(Self {
            entries,
            window_ranks,
        })
    }
}

/// Rebalance slates keyed by the date trades execute.
#[derive(Debug, Clone, Default)]
pub struct SignalSchedule {
    top_n: usize,
    exit_buffer: usize,
    slates: BTreeMap<NaiveDate, RebalanceSlate>,
}

impl SignalSchedule {
    /// Build a schedule whose row dates are already trade dates.
    pub fn new(rows: &[SignalRow], top_n: usize, exit_buffer: usize) -> Self {
        Self::build(rows, top_n, exit_buffer, Some)
    }

    /// Build a schedule from signal dates, moving each onto the calendar with
    /// [`map_signal_to_trade`]. Signal dates with no match are dropped; when
    /// several map to the same trade date the latest signal wins.
    pub fn mapped_to_calendar(
        rows: &[SignalRow],
        calendar: &[NaiveDate],
        top_n: usize,
        exit_buffer: usize,
    ) -> Self {
        Self::build(rows, top_n, exit_buffer, |date| {
            map_signal_to_trade(date, calendar)
        })
    }

    fn build(
        rows: &[SignalRow],
        top_n: usize,
        exit_buffer: usize,
        to_trade_date: impl Fn(NaiveDate) -> Option<NaiveDate>,
    ) -> Self {
        let window = top_n + exit_buffer;
        let mut by_signal_date: BTreeMap<NaiveDate, Vec<&SignalRow>> = BTreeMap::new();
        for row in rows {
            by_signal_date.entry(row.date).or_default().push(row);
        }

        let mut slates = BTreeMap::new();
        for (signal_date, group) in &by_signal_date {
            let Some(trade_date) = to_trade_date(*signal_date) else {
                continue;
            };
            if let Some(slate) = RebalanceSlate::from_rows(group, top_n, window) {
                slates.insert(trade_date, slate);
            }
        }

        Self {
            top_n,
            exit_buffer,
            slates,
        }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn exit_buffer(&self) -> usize {
        self.exit_buffer
    }

    pub fn slate(&self, date: NaiveDate) -> Option<&RebalanceSlate> {
        self.slates.get(&date)
    }

    pub fn is_rebalance_date(&self, date: NaiveDate) -> bool {
        self.slates.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.slates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slates.is_empty()
    }
}

/// Pick the trading day a signal computed on `signal_date` executes on.
///
/// Prefers the next calendar day; otherwise falls back to the signal date
/// itself, then up to two days earlier. `calendar` must be sorted.
pub fn map_signal_to_trade(signal_date: NaiveDate, calendar: &[NaiveDate]) -> Option<NaiveDate> {
    [1, 0, -1, -2]
        .into_iter()
        .map(|offset| signal_date + Duration::days(offset))
        .find(|candidate| calendar.binary_search(candidate).is_ok())
}

/// Outcome of checking a signals file before a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check per-date structure of signal rows against the window they were built for.
pub fn validate_signals(rows: &[SignalRow], window: usize) -> ValidationReport {
    let mut by_date: BTreeMap<NaiveDate, Vec<&SignalRow>> = BTreeMap::new();
    for row in rows {
        by_date.entry(row.date).or_default().push(row);
    }

    let mut report = ValidationReport::default();
    for (date, group) in &by_date {
        if group.len() > window {
            report
                .errors
                .push(format!("{date}: has {} entries > top_n ({window})", group.len()));
        } else if group.len() < window {
            report
                .warnings
                .push(format!("{date}: only {} entries (window {window})", group.len()));
        }

        let mut seen = HashSet::new();
        if group.iter().any(|r| !seen.insert(r.symbol.as_str())) {
            report.errors.push(format!("{date}: duplicate symbols detected"));
        }

        let zero_ranks = group.iter().filter(|r| r.rank == 0).count();
        if zero_ranks > 0 {
            report
                .errors
                .push(format!("{date}: {zero_ranks} rows with rank 0 (ranks start at 1)"));
        }
    }
    report
}
