use chrono::{DateTime, Utc};

// One closed (or, before trimming, possibly open) OHLCV interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,

    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,

    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Candle {
            open_time,
            open_price: open,
            high_price: high,
            low_price: low,
            close_price: close,
            volume,
        }
    }
}

/// Candles of a single symbol in exchange response order (ascending open time).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleBatch {
    candles: Vec<Candle>,
}

impl CandleBatch {
    pub fn push(&mut self, candle: Candle) {
        self.candles.push(candle);
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn first_open_time(&self) -> Option<DateTime<Utc>> {
        self.candles.first().map(|c| c.open_time)
    }

    pub fn last_open_time(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.open_time)
    }

    /// Realtime completeness filter.
    ///
    /// The last row is unconfirmed whenever the batch has more than one row, and
    /// nothing opening at or after `boundary` has closed yet. Returns the open time
    /// of the earliest removed candle, which is where this symbol must resume.
    pub fn trim_unconfirmed(&mut self, boundary: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut earliest_dropped = None;
        if self.candles.len() > 1 {
            earliest_dropped = self.candles.pop().map(|c| c.open_time);
        }
        while let Some(last) = self.candles.last() {
            if last.open_time < boundary {
                break;
            }
            earliest_dropped = Some(last.open_time);
            self.candles.pop();
        }
        earliest_dropped
    }
}

impl From<Vec<Candle>> for CandleBatch {
    fn from(candles: Vec<Candle>) -> Self {
        Self { candles }
    }
}

impl IntoIterator for CandleBatch {
    type Item = Candle;
    type IntoIter = std::vec::IntoIter<Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.into_iter()
    }
}
