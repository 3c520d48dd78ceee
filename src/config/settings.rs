//! Feeder configuration: the JSON file shape and its validated, typed form.

use {
    crate::domain::{DEFAULT_TIMEFRAME, FeedError, Timeframe},
    anyhow::{Context, Result},
    chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc},
    chrono_tz::Tz,
    serde::{Deserialize, Serialize},
    std::{path::Path, time::Duration},
    strum_macros::Display,
};

/// Candles requested per backfill window, in timeframe units.
pub const BACKFILL_WINDOW_CANDLES: i64 = 300;

const QUERY_START_LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const QUERY_START_DATE_LAYOUT: &str = "%Y-%m-%d";

/// What the normalizer does with a row whose numeric field will not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    /// Drop the offending row and keep the rest of the batch.
    #[default]
    #[strum(to_string = "discard_row")]
    DiscardRow,
    /// Stop the worker on the first failure.
    #[strum(to_string = "abort_worker")]
    AbortWorker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause after a failed fetch before moving on (or polling again).
    pub error_backoff_secs: u64,
    /// Pause between two realtime polls that did not see the boundary yet.
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            error_backoff_secs: 60,
            poll_interval_ms: 1000,
        }
    }
}

/// Configuration file contents, every field optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    pub symbols: Vec<String>,
    pub base_currency: String,
    pub query_start: Option<String>,
    pub base_timeframe: String,
    pub timezone: String,
    pub exchange: String,
    pub db_path: String,
    pub parse_policy: ParsePolicy,
    pub fetch_concurrency: usize,
    pub timing: TimingConfig,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            base_currency: "BNB".to_string(),
            query_start: None,
            base_timeframe: DEFAULT_TIMEFRAME.to_string(),
            timezone: "UTC".to_string(),
            exchange: "BINANCE".to_string(),
            db_path: "candles.sqlite".to_string(),
            parse_policy: ParsePolicy::default(),
            fetch_concurrency: 1,
            timing: TimingConfig::default(),
        }
    }
}

impl FeederConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Validates everything once and produces the settings the worker runs on.
    pub fn resolve(&self) -> Result<FeederSettings, FeedError> {
        let base_currency = self.base_currency.trim().to_uppercase();
        if base_currency.is_empty() {
            return Err(FeedError::Config("base_currency must not be empty".into()));
        }
        if self.exchange.trim().is_empty() {
            return Err(FeedError::Config("exchange must not be empty".into()));
        }

        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|_| FeedError::Config(format!("unknown timezone '{}'", self.timezone)))?;

        let query_start = match self.query_start.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_query_start(raw, timezone)?),
        };

        let timeframe = Timeframe::parse(&self.base_timeframe);
        if timeframe.span_of(BACKFILL_WINDOW_CANDLES).is_none() {
            return Err(FeedError::Config(format!(
                "timeframe {} is too wide for a {}-candle backfill window",
                timeframe, BACKFILL_WINDOW_CANDLES
            )));
        }

        let symbols = self
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(FeederSettings {
            symbols,
            base_currency,
            query_start,
            timeframe,
            exchange: self.exchange.trim().to_uppercase(),
            db_path: self.db_path.clone(),
            parse_policy: self.parse_policy,
            fetch_concurrency: self.fetch_concurrency.max(1),
            error_backoff: Duration::from_secs(self.timing.error_backoff_secs),
            poll_interval: Duration::from_millis(self.timing.poll_interval_ms),
        })
    }
}

/// Validated settings, consumed at construction and never re-read.
#[derive(Debug, Clone, PartialEq)]
pub struct FeederSettings {
    /// Configured base assets; empty means "discover from the exchange".
    pub symbols: Vec<String>,
    pub base_currency: String,
    pub query_start: Option<DateTime<Utc>>,
    pub timeframe: Timeframe,
    pub exchange: String,
    pub db_path: String,
    pub parse_policy: ParsePolicy,
    pub fetch_concurrency: usize,
    pub error_backoff: Duration,
    pub poll_interval: Duration,
}

/// Reads `query_start` in any accepted layout as wall-clock time in `timezone`.
pub fn parse_query_start(raw: &str, timezone: Tz) -> Result<DateTime<Utc>, FeedError> {
    let naive = QUERY_START_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, QUERY_START_DATE_LAYOUT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| FeedError::Config(format!("unrecognised query_start '{}'", raw)))?;

    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            FeedError::Config(format!(
                "query_start '{}' does not exist in timezone {}",
                raw, timezone
            ))
        })
}
