//! Command handlers behind the binary.

use {
    crate::{
        Cli, Command,
        config::{BINANCE, FeederConfig, FeederSettings},
        data::{
            BinanceCatalog, BinanceProvider, CandleSource, GlobalRateLimiter, SeriesStore,
            SqliteStorage, resolve_symbols,
        },
        domain::{BucketKey, Candle, Pair},
        engine::{Feeder, Shutdown},
        utils::{Clock, SystemClock, format_instant},
    },
    anyhow::{Context, Result},
    std::{path::Path, sync::Arc},
    tabled::{Table, Tabled, settings::Style},
};

#[derive(Tabled)]
struct SymbolRow {
    symbol: String,
    market: String,
    bucket: String,
}

#[derive(Tabled)]
struct CandleRow {
    #[tabled(rename = "open time")]
    open_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<&Candle> for CandleRow {
    fn from(c: &Candle) -> Self {
        Self {
            open_time: format_instant(c.open_time),
            open: c.open_price,
            high: c.high_price,
            low: c.low_price,
            close: c.close_price,
            volume: c.volume,
        }
    }
}

/// Dispatches the parsed command line. `shutdown` only matters for `run`.
pub async fn run_app(cli: Cli, shutdown: Shutdown) -> Result<()> {
    let settings = load_settings(&cli)?;
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => ingest(settings, shutdown).await,
        Command::Symbols => print_symbols(&settings).await,
        Command::Tail { symbol, limit } => print_tail(&settings, &symbol, limit).await,
    }
}

fn load_settings(cli: &Cli) -> Result<FeederSettings> {
    let mut config = if cli.config.exists() {
        FeederConfig::load(&cli.config)?
    } else {
        log::warn!(
            "Config file {} not found. Using defaults.",
            cli.config.display()
        );
        FeederConfig::default()
    };
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    Ok(config.resolve()?)
}

async fn open_store(db_path: &str) -> Result<SqliteStorage> {
    SqliteStorage::open(db_path)
        .await
        .with_context(|| format!("Failed to open candle store at {}", Path::new(db_path).display()))
}

fn binance_adapters() -> Result<(Arc<dyn CandleSource>, BinanceCatalog)> {
    let limiter = GlobalRateLimiter::new(BINANCE.limits.weight_limit_minute);
    let source: Arc<dyn CandleSource> = Arc::new(BinanceProvider::new(limiter.clone())?);
    let catalog = BinanceCatalog::new(limiter)?;
    Ok((source, catalog))
}

async fn ingest(settings: FeederSettings, shutdown: Shutdown) -> Result<()> {
    let (source, catalog) = binance_adapters()?;
    let store: Arc<dyn SeriesStore> = Arc::new(open_store(&settings.db_path).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let feeder = Feeder::bootstrap(settings, &catalog, source, store, clock).await?;
    log::info!("Ingesting {:?}", feeder.symbols());
    feeder.run(shutdown).await?;
    Ok(())
}

async fn print_symbols(settings: &FeederSettings) -> Result<()> {
    let (source, catalog) = binance_adapters()?;
    let symbols = resolve_symbols(settings, &catalog, source.as_ref(), SystemClock.now()).await?;

    let rows: Vec<SymbolRow> = symbols
        .iter()
        .map(|s| {
            let pair = Pair::new(s.as_str(), settings.base_currency.as_str());
            SymbolRow {
                symbol: s.clone(),
                market: pair.bn_name(),
                bucket: BucketKey::ohlcv(&settings.exchange, &pair, &settings.timeframe)
                    .to_string(),
            }
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

async fn print_tail(settings: &FeederSettings, symbol: &str, limit: u32) -> Result<()> {
    let store = open_store(&settings.db_path).await?;
    let pair = Pair::new(symbol.trim().to_uppercase(), settings.base_currency.as_str());
    let key = BucketKey::ohlcv(&settings.exchange, &pair, &settings.timeframe);
    let candles = store.load_recent(&key, limit).await?;

    if candles.is_empty() {
        println!("No candles stored for {}", key);
        return Ok(());
    }
    let rows: Vec<CandleRow> = candles.iter().map(CandleRow::from).collect();
    println!("{}", key);
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
