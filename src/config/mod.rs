//! Configuration module for the candle feeder.

mod binance;
mod settings;

pub use binance::{BINANCE, BinanceApiConfig};
pub use settings::{
    BACKFILL_WINDOW_CANDLES, FeederConfig, FeederSettings, ParsePolicy, TimingConfig,
    parse_query_start,
};
