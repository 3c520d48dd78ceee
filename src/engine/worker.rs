use {
    crate::{
        config::FeederSettings,
        data::{CandleSource, SeriesStore, SymbolCatalog, resolve_symbols},
        domain::FeedError,
        engine::{
            Scheduler, Shutdown,
            checkpoint::{CheckpointReader, resume_point},
        },
        utils::{Clock, format_instant},
    },
    std::sync::Arc,
};

/// One ingestion worker: a resolved symbol set bound to its source, store and clock.
pub struct Feeder {
    settings: FeederSettings,
    symbols: Vec<String>,
    source: Arc<dyn CandleSource>,
    store: Arc<dyn SeriesStore>,
    clock: Arc<dyn Clock>,
}

impl Feeder {
    pub fn new(
        settings: FeederSettings,
        symbols: Vec<String>,
        source: Arc<dyn CandleSource>,
        store: Arc<dyn SeriesStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FeedError> {
        if symbols.is_empty() {
            return Err(FeedError::Config("no symbols to ingest".to_string()));
        }
        let token = settings.timeframe.interval_token();
        if !source.supports_interval(&token) {
            return Err(FeedError::Config(format!(
                "timeframe {} ({}) is not offered by the exchange",
                settings.timeframe, token
            )));
        }
        Ok(Self {
            settings,
            symbols,
            source,
            store,
            clock,
        })
    }

    /// Resolves the symbol set through `catalog` and builds the worker.
    pub async fn bootstrap(
        settings: FeederSettings,
        catalog: &dyn SymbolCatalog,
        source: Arc<dyn CandleSource>,
        store: Arc<dyn SeriesStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FeedError> {
        let symbols = resolve_symbols(&settings, catalog, source.as_ref(), clock.now()).await?;
        Self::new(settings, symbols, source, store, clock)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Reads checkpoints and builds a scheduler positioned at the resume point.
    pub async fn prepare(&self) -> Result<Scheduler, FeedError> {
        let reader = CheckpointReader::new(
            self.store.clone(),
            &self.settings.exchange,
            &self.settings.base_currency,
            &self.settings.timeframe,
        );
        let checkpoints = reader.collect(&self.symbols).await;
        let resume = resume_point(
            self.settings.query_start,
            &checkpoints,
            self.clock.now(),
            &self.settings.timeframe,
        );
        log::info!("Resuming ingestion at {}", format_instant(resume));

        Scheduler::new(
            &self.settings,
            &self.symbols,
            self.source.clone(),
            self.store.clone(),
            self.clock.clone(),
            resume,
        )
    }

    pub async fn run(&self, mut shutdown: Shutdown) -> Result<(), FeedError> {
        let mut scheduler = self.prepare().await?;
        scheduler.run(&mut shutdown).await
    }
}
