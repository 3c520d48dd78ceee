use {
    chrono::{DateTime, Utc},
    std::collections::BTreeMap,
    strum_macros::Display,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    Backfilling,
    Realtime,
}

/// Scheduler bookkeeping. Created at worker start, never persisted.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub phase: Phase,

    /// Start of the next window shared by all symbols.
    pub cursor: DateTime<Utc>,

    /// Last boundary confirmed closed by realtime polling.
    pub last_realtime_boundary: Option<DateTime<Utc>>,

    /// Symbols whose own cursor is behind `cursor` (failed fetch, failed write,
    /// capped request or a trimmed closed candle). Everything else starts at the
    /// window start.
    pub lagging: BTreeMap<String, DateTime<Utc>>,
}

impl SchedulerState {
    pub fn new(resume: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Backfilling,
            cursor: resume,
            last_realtime_boundary: None,
            lagging: BTreeMap::new(),
        }
    }

    /// Where `symbol` must start fetching for a window beginning at `window_start`.
    pub fn symbol_cursor(&self, symbol: &str, window_start: DateTime<Utc>) -> DateTime<Utc> {
        self.lagging
            .get(symbol)
            .copied()
            .map_or(window_start, |lag| lag.min(window_start))
    }

    /// Records that `symbol` must resume at `next`. Catching up with the shared
    /// cursor (`advance_to`) clears the entry.
    pub fn set_symbol_cursor(
        &mut self,
        symbol: &str,
        next: DateTime<Utc>,
        advance_to: DateTime<Utc>,
    ) {
        if next >= advance_to {
            self.lagging.remove(symbol);
        } else {
            self.lagging.insert(symbol.to_string(), next);
        }
    }

    pub fn enter_realtime(&mut self, boundary: DateTime<Utc>) {
        self.phase = Phase::Realtime;
        self.cursor = boundary;
        self.last_realtime_boundary = Some(boundary);
    }
}
