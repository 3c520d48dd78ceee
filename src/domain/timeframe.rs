use {
    crate::utils::TimeUtils,
    chrono::{DateTime, TimeDelta, Utc},
    serde::{Deserialize, Serialize},
    strum::IntoEnumIterator,
    strum_macros::{Display, EnumIter},
};

/// Label used whenever a configured timeframe cannot be understood.
pub const DEFAULT_TIMEFRAME: &str = "1Min";

/// Monday 1970-01-05T00:00:00Z. Exchange weekly candles open on Mondays.
const FIRST_MONDAY_EPOCH_S: i64 = 4 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl TimeUnit {
    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::iter().find(|unit| unit.suffix() == suffix)
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Minute => "Min",
            Self::Hour => "H",
            Self::Day => "D",
            Self::Week => "W",
        }
    }

    /// Binance interval suffix.
    fn exchange_suffix(self) -> &'static str {
        match self {
            Self::Minute => "m",
            Self::Hour => "h",
            Self::Day => "d",
            Self::Week => "w",
        }
    }

    fn millis(self) -> i64 {
        match self {
            Self::Minute => TimeUtils::MS_IN_MIN,
            Self::Hour => TimeUtils::MS_IN_H,
            Self::Day => TimeUtils::MS_IN_D,
            Self::Week => TimeUtils::MS_IN_W,
        }
    }
}

/// A candle width such as `1Min`, `5Min`, `1H` or `1D`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timeframe {
    count: u32,
    unit: TimeUnit,
}

impl Timeframe {
    pub fn new(count: u32, unit: TimeUnit) -> Self {
        Self {
            count: count.max(1),
            unit,
        }
    }

    /// Parses a label made of a numeric prefix and a unit suffix.
    ///
    /// Never fails: an unknown suffix logs a warning and yields `1Min`, a missing
    /// or zero prefix counts as 1.
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
        let letters: String = label.chars().filter(|c| c.is_ascii_alphabetic()).collect();

        let Some(unit) = TimeUnit::from_suffix(&letters) else {
            log::warn!(
                "Timeframe '{}' has unknown unit '{}'. Falling back to '{}'.",
                label,
                letters,
                DEFAULT_TIMEFRAME
            );
            return Self::default();
        };

        let count = if digits.is_empty() {
            1
        } else {
            match digits.parse::<u32>() {
                Ok(n) => n,
                Err(_) => {
                    log::warn!(
                        "Timeframe '{}' has an out of range count. Falling back to '{}'.",
                        label,
                        DEFAULT_TIMEFRAME
                    );
                    return Self::default();
                }
            }
        };

        Self::new(count, unit)
    }

    /// Canonical label, also used as the storage bucket's timeframe component.
    pub fn label(&self) -> String {
        format!("{}{}", self.count, self.unit.suffix())
    }

    /// Exchange interval token, e.g. `5Min` -> `5m`.
    pub fn interval_token(&self) -> String {
        format!("{}{}", self.count, self.unit.exchange_suffix())
    }

    pub fn duration_ms(&self) -> i64 {
        i64::from(self.count) * self.unit.millis()
    }

    pub fn duration(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.duration_ms())
    }

    /// Width of `candles` consecutive intervals, `None` when chrono cannot represent it.
    pub fn span_of(&self, candles: i64) -> Option<TimeDelta> {
        self.duration_ms()
            .checked_mul(candles)
            .and_then(TimeDelta::try_milliseconds)
    }

    /// Start of the interval containing `instant`.
    ///
    /// For a single minute, hour or day this is plain calendar truncation in UTC.
    /// Multiples are aligned on the epoch, weeks on the first Monday of the epoch.
    pub fn truncate(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let width_s = self.duration_ms() / TimeUtils::MS_IN_S;
        let origin_s = match self.unit {
            TimeUnit::Week => FIRST_MONDAY_EPOCH_S,
            _ => 0,
        };
        let offset = instant.timestamp() - origin_s;
        let floored = offset.div_euclid(width_s) * width_s + origin_s;
        DateTime::from_timestamp(floored, 0).unwrap_or(instant)
    }

    /// Whether `instant` already sits on an interval boundary.
    pub fn is_aligned(&self, instant: DateTime<Utc>) -> bool {
        self.truncate(instant) == instant
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::new(1, TimeUnit::Minute)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
