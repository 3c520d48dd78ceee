mod bn_kline;
pub mod catalog;
mod provider;
mod rate_limiter;
pub mod storage;

pub use {
    bn_kline::{BNKlineError, RawKline, try_interval_from_token},
    catalog::{BinanceCatalog, InstrumentInfo, SymbolCatalog, resolve_symbols, trading_bases},
    provider::{BinanceProvider, CandleSource},
    rate_limiter::GlobalRateLimiter,
    storage::{ColumnBatch, SeriesStore, SqliteStorage},
};
