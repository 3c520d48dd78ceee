use {
    crate::utils::{format_instant, to_epoch_ms},
    chrono::{DateTime, TimeDelta, Utc},
};

/// Half-open request window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Builds a window, collapsing it to empty when `end` precedes `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn span(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn start_ms(&self) -> i64 {
        to_epoch_ms(self.start)
    }

    /// Exchange end times are inclusive, so the last millisecond inside the window.
    pub fn inclusive_end_ms(&self) -> i64 {
        to_epoch_ms(self.end) - 1
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "[{} -> {})",
            format_instant(self.start),
            format_instant(self.end)
        )
    }
}
