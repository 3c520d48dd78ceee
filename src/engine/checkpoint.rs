use {
    crate::{
        data::SeriesStore,
        domain::{BucketKey, Pair, Timeframe},
    },
    chrono::{DateTime, Utc},
    std::sync::Arc,
};

/// Reads where each symbol's stored history ends.
pub struct CheckpointReader {
    store: Arc<dyn SeriesStore>,
    exchange: String,
    quote: String,
    timeframe: Timeframe,
}

impl CheckpointReader {
    pub fn new(
        store: Arc<dyn SeriesStore>,
        exchange: &str,
        quote: &str,
        timeframe: &Timeframe,
    ) -> Self {
        Self {
            store,
            exchange: exchange.to_string(),
            quote: quote.to_string(),
            timeframe: timeframe.clone(),
        }
    }

    /// Open time of the last stored candle; `None` for an empty bucket or a failed query.
    pub async fn last_timestamp(&self, symbol: &str) -> Option<DateTime<Utc>> {
        let pair = Pair::new(symbol, self.quote.as_str());
        let key = BucketKey::ohlcv(&self.exchange, &pair, &self.timeframe);
        match self.store.last_row(&key).await {
            Ok(row) => row.map(|c| c.open_time),
            Err(e) => {
                log::warn!("Could not read checkpoint of {}: {:#}", key, e);
                None
            }
        }
    }

    pub async fn collect(&self, symbols: &[String]) -> Vec<(String, Option<DateTime<Utc>>)> {
        let mut checkpoints = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let last = self.last_timestamp(symbol).await;
            log::info!("lastTimestamp for {} = {:?}", symbol, last);
            checkpoints.push((symbol.clone(), last));
        }
        checkpoints
    }
}

/// Where ingestion (re)starts, aligned to the timeframe grid.
///
/// An explicit start wins; otherwise the earliest existing checkpoint, so no
/// symbol's history is skipped; otherwise one interval before `now`.
pub fn resume_point(
    query_start: Option<DateTime<Utc>>,
    checkpoints: &[(String, Option<DateTime<Utc>>)],
    now: DateTime<Utc>,
    timeframe: &Timeframe,
) -> DateTime<Utc> {
    let earliest_checkpoint = checkpoints.iter().filter_map(|(_, t)| *t).min();
    let start = query_start
        .or(earliest_checkpoint)
        .unwrap_or_else(|| now - timeframe.duration());
    timeframe.truncate(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::ColumnBatch,
        domain::Candle,
    };
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone};

    fn utc(h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, h, mi, s).unwrap()
    }

    fn checkpoints(list: &[(&str, Option<DateTime<Utc>>)]) -> Vec<(String, Option<DateTime<Utc>>)> {
        list.iter().map(|(s, t)| (s.to_string(), *t)).collect()
    }

    #[test]
    fn earliest_checkpoint_wins() {
        let tf = Timeframe::default();
        let cps = checkpoints(&[("B", Some(utc(9, 30, 0))), ("A", Some(utc(8, 15, 0))), ("C", None)]);
        assert_eq!(resume_point(None, &cps, utc(12, 0, 0), &tf), utc(8, 15, 0));
    }

    #[test]
    fn configured_start_overrides_checkpoints() {
        let tf = Timeframe::default();
        let cps = checkpoints(&[("A", Some(utc(8, 15, 0)))]);
        let start = utc(1, 0, 0);
        assert_eq!(resume_point(Some(start), &cps, utc(12, 0, 0), &tf), start);
    }

    #[test]
    fn without_history_start_one_interval_back() {
        let tf = Timeframe::parse("1H");
        let cps = checkpoints(&[("A", None), ("B", None)]);
        let now = utc(12, 34, 56);
        assert_eq!(resume_point(None, &cps, now, &tf), utc(11, 0, 0));
        assert_eq!(resume_point(None, &[], now, &tf), utc(11, 0, 0));
    }

    struct FlakyStore;

    #[async_trait]
    impl SeriesStore for FlakyStore {
        async fn last_row(&self, key: &BucketKey) -> Result<Option<Candle>> {
            match key.symbol.as_str() {
                "EOS" => Ok(Some(Candle::new(
                    utc(7, 0, 0) + TimeDelta::minutes(1),
                    1.0,
                    1.0,
                    1.0,
                    1.0,
                    1.0,
                ))),
                "TRX" => Ok(None),
                _ => Err(anyhow!("database is locked")),
            }
        }

        async fn write_batch(&self, _: &BucketKey, _: &ColumnBatch, _: bool) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn failed_or_empty_buckets_read_as_no_checkpoint() {
        let reader = CheckpointReader::new(Arc::new(FlakyStore), "BINANCE", "BNB", &Timeframe::default());
        let symbols = vec!["EOS".to_string(), "TRX".to_string(), "XRP".to_string()];

        let cps = reader.collect(&symbols).await;
        assert_eq!(cps[0].1, Some(utc(7, 1, 0)));
        assert_eq!(cps[1].1, None);
        assert_eq!(cps[2].1, None);
    }
}
