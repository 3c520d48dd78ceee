pub struct BinanceApiConfig {
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for BinanceApiConfig {
    fn default() -> Self {
        Self {
            timeout_ms: BINANCE.client.timeout_ms,
            retries: BINANCE.client.retries,
            backoff_ms: BINANCE.client.backoff_ms,
        }
    }
}

/// REST constraints: klines page size, weight budget and call costs.
pub struct RestLimits {
    pub klines_limit: i32,
    pub weight_limit_minute: u32,
    pub kline_call_weight: u32,
    pub exchange_info_weight: u32,
}

pub struct ClientDefaults {
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

pub struct BinanceConfig {
    pub limits: RestLimits,
    pub client: ClientDefaults,
    /// Symbols used when exchange metadata cannot be fetched.
    pub fallback_symbols: &'static [&'static str],
    /// Status string of instruments that can be traded right now.
    pub trading_status: &'static str,
    /// Interval of the single validation fetch done per discovered symbol.
    pub validation_interval: &'static str,
}

pub const BINANCE: BinanceConfig = BinanceConfig {
    limits: RestLimits {
        klines_limit: 1000,
        weight_limit_minute: 6000,
        kline_call_weight: 2,
        exchange_info_weight: 20,
    },
    client: ClientDefaults {
        // SDK level retries stay off: the scheduler owns retry timing.
        timeout_ms: 10_000,
        retries: 0,
        backoff_ms: 1000,
    },
    fallback_symbols: &[
        "EOS", "TRX", "ONT", "XRP", "ADA", "LTC", "BCC", "TUSD", "IOTA", "ETC", "ICX", "NEO",
        "XLM", "QTUM",
    ],
    trading_status: "TRADING",
    validation_interval: "1m",
};
