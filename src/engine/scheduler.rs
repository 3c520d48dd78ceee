//! Drives ingestion: fixed-size backfill windows until caught up, then one
//! cycle per closed interval.

use {
    crate::{
        config::{BACKFILL_WINDOW_CANDLES, FeederSettings, ParsePolicy},
        data::{CandleSource, RawKline, SeriesStore},
        domain::{FeedError, Pair, TimeWindow, Timeframe},
        engine::{
            BatchWriter, Shutdown,
            normalizer::normalize,
            state::{Phase, SchedulerState},
        },
        utils::{
            Clock, duration_until, epoch_ms_to_utc, format_duration, format_instant, to_epoch_ms,
        },
    },
    chrono::{DateTime, TimeDelta, Utc},
    futures::{StreamExt, stream},
    std::{sync::Arc, time::Duration},
};

/// What a single [`Scheduler::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Backfilled {
        window: TimeWindow,
        written: u64,
    },
    /// Final backfill window, clipped to the last closed boundary.
    EnteredRealtime {
        window: TimeWindow,
        boundary: DateTime<Utc>,
        written: u64,
    },
    Realtime {
        window: TimeWindow,
        boundary: DateTime<Utc>,
        written: u64,
    },
    /// No new interval had closed; slept until the next one.
    Waited { until: DateTime<Utc> },
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
enum Completeness {
    /// Every row in the window belongs to a closed interval.
    Closed,
    /// Rows at or after the boundary may still be forming.
    TrimAt(DateTime<Utc>),
}

#[derive(Debug)]
struct SymbolRequest {
    symbol: String,
    market: String,
    window: TimeWindow,
    /// The request was shortened to one page and does not reach the window end.
    capped: bool,
}

pub struct Scheduler {
    pairs: Vec<Pair>,
    timeframe: Timeframe,
    interval: String,
    source: Arc<dyn CandleSource>,
    writer: BatchWriter,
    clock: Arc<dyn Clock>,
    parse_policy: ParsePolicy,
    fetch_concurrency: usize,
    error_backoff: Duration,
    poll_interval: Duration,
    page_limit: u32,
    window_span: TimeDelta,
    /// `None` when a full page outspans anything chrono can represent.
    page_span: Option<TimeDelta>,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(
        settings: &FeederSettings,
        symbols: &[String],
        source: Arc<dyn CandleSource>,
        store: Arc<dyn SeriesStore>,
        clock: Arc<dyn Clock>,
        resume: DateTime<Utc>,
    ) -> Result<Self, FeedError> {
        if symbols.is_empty() {
            return Err(FeedError::Config("no symbols to ingest".to_string()));
        }
        let pairs = symbols
            .iter()
            .map(|s| Pair::new(s.as_str(), settings.base_currency.as_str()))
            .collect();
        let page_limit = source.page_limit().max(1);
        let window_span = settings
            .timeframe
            .span_of(BACKFILL_WINDOW_CANDLES)
            .ok_or_else(|| {
                FeedError::Config(format!("timeframe {} is too wide", settings.timeframe))
            })?;

        Ok(Self {
            pairs,
            timeframe: settings.timeframe.clone(),
            interval: settings.timeframe.interval_token(),
            writer: BatchWriter::new(
                store,
                &settings.exchange,
                &settings.base_currency,
                &settings.timeframe,
            ),
            source,
            clock,
            parse_policy: settings.parse_policy,
            fetch_concurrency: settings.fetch_concurrency.max(1),
            error_backoff: settings.error_backoff,
            poll_interval: settings.poll_interval,
            page_limit,
            window_span,
            page_span: settings.timeframe.span_of(i64::from(page_limit)),
            state: SchedulerState::new(resume),
        })
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Steps until cancelled. Only a fatal parse failure ends it with an error.
    pub async fn run(&mut self, shutdown: &mut Shutdown) -> Result<(), FeedError> {
        log::info!(
            "Starting ingestion of {} symbols at {} ({})",
            self.pairs.len(),
            format_instant(self.state.cursor),
            self.timeframe
        );
        loop {
            if shutdown.poll() {
                break;
            }
            if self.step(shutdown).await? == StepOutcome::Cancelled {
                break;
            }
        }
        log::info!("Ingestion stopped at {}", format_instant(self.state.cursor));
        Ok(())
    }

    pub async fn step(&mut self, shutdown: &mut Shutdown) -> Result<StepOutcome, FeedError> {
        match self.state.phase {
            Phase::Backfilling => self.backfill_step(shutdown).await,
            Phase::Realtime => self.realtime_step(shutdown).await,
        }
    }

    async fn backfill_step(&mut self, shutdown: &mut Shutdown) -> Result<StepOutcome, FeedError> {
        let now = self.clock.now();
        let start = self.state.cursor;
        let nominal_end = start.checked_add_signed(self.window_span);

        if let Some(nominal_end) = nominal_end.filter(|end| *end < now) {
            let window = TimeWindow::new(start, nominal_end);
            log::info!("Backfilling {} ({})", window, format_duration(window.span()));
            let Some(written) = self
                .run_cycle(window, Completeness::Closed, nominal_end, shutdown)
                .await?
            else {
                return Ok(StepOutcome::Cancelled);
            };
            self.state.cursor = nominal_end;
            return Ok(StepOutcome::Backfilled { window, written });
        }

        // The open interval is left to the realtime loop.
        let boundary = self.timeframe.truncate(now).max(start);
        let window = TimeWindow::new(start, boundary);
        log::info!("Backfilling final window {}", window);
        let Some(written) = self
            .run_cycle(window, Completeness::Closed, boundary, shutdown)
            .await?
        else {
            return Ok(StepOutcome::Cancelled);
        };
        self.state.enter_realtime(boundary);
        log::info!("Caught up. Switching to realtime at {}", format_instant(boundary));
        Ok(StepOutcome::EnteredRealtime {
            window,
            boundary,
            written,
        })
    }

    async fn realtime_step(&mut self, shutdown: &mut Shutdown) -> Result<StepOutcome, FeedError> {
        let d = self.timeframe.duration();
        let boundary = self.timeframe.truncate(self.clock.now());

        if boundary <= self.state.cursor {
            let until = self.state.cursor + d;
            if !self.sleep_until(until, shutdown).await {
                return Ok(StepOutcome::Cancelled);
            }
            return Ok(StepOutcome::Waited { until });
        }

        if !self.wait_for_close(boundary, shutdown).await {
            return Ok(StepOutcome::Cancelled);
        }

        let window = TimeWindow::new(self.state.cursor, self.clock.now());
        log::info!("Realtime cycle {} (boundary {})", window, format_instant(boundary));
        let Some(written) = self
            .run_cycle(window, Completeness::TrimAt(boundary), boundary, shutdown)
            .await?
        else {
            return Ok(StepOutcome::Cancelled);
        };
        self.state.cursor = boundary;
        self.state.last_realtime_boundary = Some(boundary);

        if !self.sleep_until(boundary + d, shutdown).await {
            return Ok(StepOutcome::Cancelled);
        }
        Ok(StepOutcome::Realtime {
            window,
            boundary,
            written,
        })
    }

    /// Polls the first symbol until the exchange shows a candle opening at or
    /// after `boundary`. Returns `false` when cancelled.
    async fn wait_for_close(&self, boundary: DateTime<Utc>, shutdown: &mut Shutdown) -> bool {
        let Some(pair) = self.pairs.first() else {
            return true;
        };
        let market = pair.bn_name();
        let boundary_ms = to_epoch_ms(boundary);
        let mut from = self.state.cursor;

        loop {
            if shutdown.poll() {
                return false;
            }
            let fetched = self
                .source
                .fetch_candles(&market, &self.interval, to_epoch_ms(from), None, self.page_limit)
                .await;

            match fetched {
                Ok(rows) => {
                    match rows.last() {
                        Some(last) if last.open_time_ms >= boundary_ms => {
                            log::debug!("{} shows {}: interval closed", market, format_instant(boundary));
                            return true;
                        }
                        Some(last) if rows.len() >= self.page_limit as usize => {
                            if let Some(t) = epoch_ms_to_utc(last.open_time_ms) {
                                from = t + self.timeframe.duration();
                                continue;
                            }
                        }
                        _ => {}
                    }
                    if !self.pause(shutdown, self.poll_interval).await {
                        return false;
                    }
                }
                Err(e) => {
                    let err = FeedError::Fetch {
                        symbol: pair.base().to_string(),
                        message: format!("{:#}", e),
                    };
                    log::error!("Close check failed: {}", err);
                    if !self.pause(shutdown, self.error_backoff).await {
                        return false;
                    }
                }
            }
        }
    }

    fn plan_requests(&self, window: TimeWindow) -> Vec<SymbolRequest> {
        self.pairs
            .iter()
            .map(|pair| {
                let from = self.state.symbol_cursor(pair.base(), window.start);
                let end = self
                    .page_span
                    .and_then(|span| from.checked_add_signed(span))
                    .map_or(window.end, |cap| cap.min(window.end));
                SymbolRequest {
                    symbol: pair.base().to_string(),
                    market: pair.bn_name(),
                    window: TimeWindow::new(from, end),
                    capped: end < window.end,
                }
            })
            .collect()
    }

    /// Fetches, normalises and writes every symbol for one window.
    ///
    /// A symbol whose fetch or write fails keeps its own cursor and is retried
    /// from there next cycle; the others move on. `None` means cancelled.
    async fn run_cycle(
        &mut self,
        window: TimeWindow,
        completeness: Completeness,
        advance_to: DateTime<Utc>,
        shutdown: &mut Shutdown,
    ) -> Result<Option<u64>, FeedError> {
        let requests = self.plan_requests(window);

        let source = self.source.as_ref();
        let interval = self.interval.as_str();
        let limit = self.page_limit;
        let fetch_all = stream::iter(requests.iter().map(|req| async move {
            if req.window.is_empty() {
                return Ok(Vec::<RawKline>::new());
            }
            source
                .fetch_candles(
                    &req.market,
                    interval,
                    req.window.start_ms(),
                    Some(req.window.inclusive_end_ms()),
                    limit,
                )
                .await
        }))
        .buffered(self.fetch_concurrency)
        .collect::<Vec<_>>();

        let results = tokio::select! {
            results = fetch_all => results,
            _ = shutdown.recv() => return Ok(None),
        };

        let mut written = 0;
        for (request, fetched) in requests.into_iter().zip(results) {
            let symbol = request.symbol.as_str();
            let rows = match fetched {
                Ok(rows) => rows,
                Err(e) => {
                    let err = FeedError::Fetch {
                        symbol: symbol.to_string(),
                        message: format!("{:#}", e),
                    };
                    log::error!("{}", err);
                    self.state
                        .set_symbol_cursor(symbol, request.window.start, advance_to);
                    if !self.pause(shutdown, self.error_backoff).await {
                        return Ok(None);
                    }
                    continue;
                }
            };

            let report = normalize(symbol, &rows, self.parse_policy)?;
            if !report.parse_failures.is_empty() {
                log::warn!(
                    "{}: discarded {} malformed rows in {}",
                    symbol,
                    report.parse_failures.len(),
                    request.window
                );
            }

            let mut batch = report.batch;
            let next = match completeness {
                Completeness::Closed => request.window.end,
                Completeness::TrimAt(boundary) => match batch.trim_unconfirmed(boundary) {
                    Some(dropped) => dropped,
                    None if request.capped => request.window.end,
                    None => advance_to,
                },
            };

            match self.writer.write(symbol, &batch).await {
                Ok(n) => {
                    log::debug!("{}: wrote {} rows for {}", symbol, n, request.window);
                    written += n;
                    self.state.set_symbol_cursor(symbol, next, advance_to);
                }
                Err(e) => {
                    log::error!("{}", e);
                    self.state
                        .set_symbol_cursor(symbol, request.window.start, advance_to);
                }
            }
        }

        if !self.state.lagging.is_empty() {
            log::warn!("Symbols behind schedule: {:?}", self.state.lagging);
        }
        Ok(Some(written))
    }

    async fn sleep_until(&self, target: DateTime<Utc>, shutdown: &mut Shutdown) -> bool {
        let wait = duration_until(self.clock.now(), target);
        self.pause(shutdown, wait).await
    }

    /// Sleeps unless shutdown arrives first. Returns `false` when cancelled.
    async fn pause(&self, shutdown: &mut Shutdown, duration: Duration) -> bool {
        if shutdown.poll() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.clock.sleep(duration) => !shutdown.poll(),
            _ = shutdown.recv() => false,
        }
    }
}
