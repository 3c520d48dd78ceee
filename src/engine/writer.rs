use {
    crate::{
        data::{ColumnBatch, SeriesStore},
        domain::{BucketKey, CandleBatch, FeedError, Pair, Timeframe},
    },
    std::sync::Arc,
};

/// Turns a symbol's candle batch into one column write.
pub struct BatchWriter {
    store: Arc<dyn SeriesStore>,
    exchange: String,
    quote: String,
    timeframe: Timeframe,
}

impl BatchWriter {
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

    pub fn bucket(&self, symbol: &str) -> BucketKey {
        let pair = Pair::new(symbol, self.quote.as_str());
        BucketKey::ohlcv(&self.exchange, &pair, &self.timeframe)
    }

    /// Writes the batch (replacing rows with the same epoch). Empty batches are a no-op.
    pub async fn write(&self, symbol: &str, batch: &CandleBatch) -> Result<u64, FeedError> {
        if batch.is_empty() {
            log::debug!("{}: nothing to write", symbol);
            return Ok(0);
        }

        let key = self.bucket(symbol);
        log::debug!(
            "{}: writing {} rows {:?}..={:?}",
            key,
            batch.len(),
            batch.first_open_time(),
            batch.last_open_time()
        );
        let columns = ColumnBatch::from(batch);
        self.store
            .write_batch(&key, &columns, true)
            .await
            .map_err(|e| FeedError::Store(format!("{}: {:#}", key, e)))
    }
}
