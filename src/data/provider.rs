use anyhow::Result;
use async_trait::async_trait;
use binance_sdk::spot::rest_api::RestApi;

use crate::config::BINANCE;
use crate::data::{
    GlobalRateLimiter, RawKline,
    bn_kline::{configure_binance_client, fetch_raw_klines, klines_params, try_interval_from_token},
};

/// Where candles come from.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Rows for `market` with open time in `[start_ms, end_ms]`, oldest first.
    ///
    /// Without `end_ms` the source returns up to `limit` rows from `start_ms` onwards.
    async fn fetch_candles(
        &self,
        market: &str,
        interval: &str,
        start_ms: i64,
        end_ms: Option<i64>,
        limit: u32,
    ) -> Result<Vec<RawKline>>;

    /// Whether the source can serve candles of this interval token at all.
    fn supports_interval(&self, _interval: &str) -> bool {
        true
    }

    /// Most rows one call may return.
    fn page_limit(&self) -> u32 {
        BINANCE.limits.klines_limit as u32
    }
}

pub struct BinanceProvider {
    client: RestApi,
    limiter: GlobalRateLimiter,
}

impl BinanceProvider {
    pub fn new(limiter: GlobalRateLimiter) -> Result<Self> {
        Ok(Self {
            client: configure_binance_client()?,
            limiter,
        })
    }
}

#[async_trait]
impl CandleSource for BinanceProvider {
    async fn fetch_candles(
        &self,
        market: &str,
        interval: &str,
        start_ms: i64,
        end_ms: Option<i64>,
        limit: u32,
    ) -> Result<Vec<RawKline>> {
        let params = klines_params(market, interval, start_ms, end_ms, limit)?;
        self.limiter
            .acquire(BINANCE.limits.kline_call_weight, market)
            .await;
        fetch_raw_klines(&self.client, params, market).await
    }

    fn supports_interval(&self, interval: &str) -> bool {
        try_interval_from_token(interval).is_ok()
    }
}
