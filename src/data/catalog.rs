use {
    crate::{
        config::{BINANCE, FeederSettings},
        data::{
            CandleSource, GlobalRateLimiter,
            bn_kline::{configure_binance_client, fetch_exchange_instruments},
        },
        domain::{FeedError, Pair},
        utils::{TimeUtils, to_epoch_ms},
    },
    anyhow::Result,
    async_trait::async_trait,
    binance_sdk::spot::rest_api::RestApi,
    chrono::{DateTime, Utc},
    std::collections::HashSet,
};

/// One listed instrument from exchange metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub status: String,
}

#[async_trait]
pub trait SymbolCatalog: Send + Sync {
    async fn list_instruments(&self) -> Result<Vec<InstrumentInfo>>;
}

pub struct BinanceCatalog {
    client: RestApi,
    limiter: GlobalRateLimiter,
}

impl BinanceCatalog {
    pub fn new(limiter: GlobalRateLimiter) -> Result<Self> {
        Ok(Self {
            client: configure_binance_client()?,
            limiter,
        })
    }
}

#[async_trait]
impl SymbolCatalog for BinanceCatalog {
    async fn list_instruments(&self) -> Result<Vec<InstrumentInfo>> {
        self.limiter
            .acquire(BINANCE.limits.exchange_info_weight, "exchangeInfo")
            .await;
        fetch_exchange_instruments(&self.client).await
    }
}

/// Base assets quoted in `quote` that are currently trading.
///
/// Duplicated base assets keep the status of their first listing.
pub fn trading_bases(instruments: &[InstrumentInfo], quote: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    instruments
        .iter()
        .filter(|info| info.quote_asset == quote)
        .filter(|info| seen.insert(info.base_asset.as_str()))
        .filter(|info| info.status == BINANCE.trading_status)
        .map(|info| info.base_asset.clone())
        .collect()
}

/// Resolves the symbols the worker ingests.
///
/// Configured symbols are used verbatim. Otherwise instruments are discovered
/// (or the fixed fallback list is used when metadata is unavailable) and each
/// candidate must survive one trial fetch.
pub async fn resolve_symbols(
    settings: &FeederSettings,
    catalog: &dyn SymbolCatalog,
    source: &dyn CandleSource,
    now: DateTime<Utc>,
) -> Result<Vec<String>, FeedError> {
    if !settings.symbols.is_empty() {
        return Ok(settings.symbols.clone());
    }

    let candidates = match catalog.list_instruments().await {
        Ok(instruments) => trading_bases(&instruments, &settings.base_currency),
        Err(e) => {
            let err = FeedError::CatalogUnavailable(format!("{:#}", e));
            log::error!("{}. Using the fallback symbol list.", err);
            BINANCE
                .fallback_symbols
                .iter()
                .map(|s| s.to_string())
                .collect()
        }
    };

    let trial_start_ms = to_epoch_ms(now) - TimeUtils::MS_IN_MIN;
    let mut valid = Vec::with_capacity(candidates.len());
    for base in candidates {
        let pair = Pair::new(base.as_str(), settings.base_currency.as_str());
        match source
            .fetch_candles(
                &pair.bn_name(),
                BINANCE.validation_interval,
                trial_start_ms,
                None,
                1,
            )
            .await
        {
            Ok(_) => valid.push(base),
            Err(e) => log::info!("Dropping {}: trial fetch failed: {:#}", pair, e),
        }
    }

    if valid.is_empty() {
        return Err(FeedError::Config(format!(
            "no tradable symbols quoted in {}",
            settings.base_currency
        )));
    }
    log::info!("Resolved {} symbols: {:?}", valid.len(), valid);
    Ok(valid)
}
