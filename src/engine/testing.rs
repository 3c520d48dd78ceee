//! In-memory collaborators for driving the scheduler in tests.

use {
    crate::{
        data::{CandleSource, ColumnBatch, RawKline, SeriesStore},
        domain::{BucketKey, Candle},
        utils::Clock,
    },
    anyhow::{Result, anyhow},
    async_trait::async_trait,
    chrono::{DateTime, TimeDelta, Utc},
    std::{
        collections::{BTreeMap, HashMap, HashSet},
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    },
};

/// Clock whose sleeps move time forward instantly (or never return when frozen).
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    frozen: AtomicBool,
    pub sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            frozen: AtomicBool::new(false),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        if self.frozen.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.sleeps.lock().unwrap().push(duration);
        let step = TimeDelta::from_std(duration).unwrap();
        *self.now.lock().unwrap() += step;
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceCall {
    pub market: String,
    pub start_ms: i64,
    pub end_ms: Option<i64>,
}

/// Exchange stand-in: one candle per interval for every market, published
/// `publish_delay` after it opens (the open candle is visible, like on Binance).
pub struct SyntheticSource {
    clock: Arc<ManualClock>,
    step_ms: i64,
    publish_delay: TimeDelta,
    page_limit: u32,
    failures: Mutex<HashMap<String, usize>>,
    latency: Mutex<HashMap<String, usize>>,
    corrupt: Mutex<HashSet<(String, i64)>>,
    pub calls: Mutex<Vec<SourceCall>>,
    /// Markets in the order their requests finished.
    pub completed: Mutex<Vec<String>>,
}

impl SyntheticSource {
    pub fn new(clock: Arc<ManualClock>, step: TimeDelta) -> Self {
        Self {
            clock,
            step_ms: step.num_milliseconds(),
            publish_delay: TimeDelta::zero(),
            page_limit: 1000,
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(HashMap::new()),
            corrupt: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_publish_delay(mut self, delay: TimeDelta) -> Self {
        self.publish_delay = delay;
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    /// Next `times` calls for `market` fail with a transport error.
    pub fn fail(&self, market: &str, times: usize) {
        self.failures.lock().unwrap().insert(market.to_string(), times);
    }

    /// Requests for `market` yield to the runtime `polls` times before answering.
    pub fn slow_down(&self, market: &str, polls: usize) {
        self.latency.lock().unwrap().insert(market.to_string(), polls);
    }

    /// The row of `market` opening at `open_ms` carries an unparseable volume.
    pub fn corrupt(&self, market: &str, open_ms: i64) {
        self.corrupt
            .lock()
            .unwrap()
            .insert((market.to_string(), open_ms));
    }

    pub fn calls_for(&self, market: &str) -> Vec<SourceCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.market == market)
            .cloned()
            .collect()
    }

    pub fn open_ended_calls(&self) -> Vec<SourceCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.end_ms.is_none())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CandleSource for SyntheticSource {
    async fn fetch_candles(
        &self,
        market: &str,
        _interval: &str,
        start_ms: i64,
        end_ms: Option<i64>,
        limit: u32,
    ) -> Result<Vec<RawKline>> {
        self.calls.lock().unwrap().push(SourceCall {
            market: market.to_string(),
            start_ms,
            end_ms,
        });

        let polls = self.latency.lock().unwrap().get(market).copied().unwrap_or(0);
        for _ in 0..polls {
            tokio::task::yield_now().await;
        }
        self.completed.lock().unwrap().push(market.to_string());

        if let Some(left) = self.failures.lock().unwrap().get_mut(market)
            && *left > 0
        {
            *left -= 1;
            return Err(anyhow!("connection reset by peer"));
        }

        let visible_until =
            (self.clock.now() - self.publish_delay).timestamp_millis();
        let last = end_ms.unwrap_or(i64::MAX).min(visible_until);
        let limit = limit.min(self.page_limit) as usize;
        let corrupt = self.corrupt.lock().unwrap();

        let mut rows = Vec::new();
        let mut t = start_ms.div_euclid(self.step_ms) * self.step_ms;
        if t < start_ms {
            t += self.step_ms;
        }
        while t <= last && rows.len() < limit {
            let volume = if corrupt.contains(&(market.to_string(), t)) {
                "12..5".to_string()
            } else {
                "100.0".to_string()
            };
            rows.push(RawKline {
                open_time_ms: t,
                open: "1.0".into(),
                high: "2.0".into(),
                low: "0.5".into(),
                close: format!("{}", t / 1000),
                volume,
            });
            t += self.step_ms;
        }
        Ok(rows)
    }

    fn page_limit(&self) -> u32 {
        self.page_limit
    }
}

/// Series store kept in a map of bucket -> epoch -> candle.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<String, BTreeMap<i64, Candle>>>,
    failing: Mutex<HashSet<String>>,
    /// Symbols of successful writes, in call order.
    pub writes: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn fail_writes_for(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn epochs(&self, key: &BucketKey) -> Vec<i64> {
        self.rows
            .lock()
            .unwrap()
            .get(&key.to_string())
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn seed(&self, key: &BucketKey, open_time: DateTime<Utc>) {
        self.rows
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .insert(
                open_time.timestamp(),
                Candle::new(open_time, 1.0, 1.0, 1.0, 1.0, 1.0),
            );
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn last_row(&self, key: &BucketKey) -> Result<Option<Candle>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&key.to_string())
            .and_then(|m| m.values().next_back().cloned()))
    }

    async fn write_batch(
        &self,
        key: &BucketKey,
        columns: &ColumnBatch,
        overwrite: bool,
    ) -> Result<u64> {
        columns.validate()?;
        if self.failing.lock().unwrap().contains(&key.symbol) {
            return Err(anyhow!("disk full"));
        }
        self.writes.lock().unwrap().push(key.symbol.clone());
        let mut rows = self.rows.lock().unwrap();
        let bucket = rows.entry(key.to_string()).or_default();
        for i in 0..columns.len() {
            let epoch = columns.epoch[i];
            if !overwrite && bucket.contains_key(&epoch) {
                continue;
            }
            let open_time = DateTime::from_timestamp(epoch, 0).unwrap();
            bucket.insert(
                epoch,
                Candle::new(
                    open_time,
                    columns.open[i],
                    columns.high[i],
                    columns.low[i],
                    columns.close[i],
                    columns.volume[i],
                ),
            );
        }
        Ok(columns.len() as u64)
    }
}
