use {
    crate::domain::{BucketKey, Candle, CandleBatch},
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    chrono::DateTime,
    sqlx::{
        ConnectOptions, Pool, QueryBuilder, Row, Sqlite,
        sqlite::{
            SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
            SqliteSynchronous,
        },
    },
    std::{str::FromStr, time::Duration},
};

/// Rows per INSERT statement; 11 binds each keeps us under SQLite's 32k parameter limit.
const INSERT_CHUNK_ROWS: usize = 2900;

/// Column-oriented OHLCV payload for one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnBatch {
    pub epoch: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl ColumnBatch {
    pub fn len(&self) -> usize {
        self.epoch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epoch.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.epoch.len();
        let lengths = [
            self.open.len(),
            self.high.len(),
            self.low.len(),
            self.close.len(),
            self.volume.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            bail!("column length mismatch: Epoch has {} rows, others {:?}", n, lengths);
        }
        Ok(())
    }
}

impl From<&CandleBatch> for ColumnBatch {
    fn from(batch: &CandleBatch) -> Self {
        let mut columns = ColumnBatch::default();
        for c in batch.candles() {
            columns.epoch.push(c.open_time.timestamp());
            columns.open.push(c.open_price);
            columns.high.push(c.high_price);
            columns.low.push(c.low_price);
            columns.close.push(c.close_price);
            columns.volume.push(c.volume);
        }
        columns
    }
}

/// Time-series store the feeder writes into.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Most recent row of the bucket, if any.
    async fn last_row(&self, key: &BucketKey) -> Result<Option<Candle>>;

    /// Writes all rows of `columns`; with `overwrite` an existing epoch is replaced.
    async fn write_batch(&self, key: &BucketKey, columns: &ColumnBatch, overwrite: bool)
    -> Result<u64>;
}

pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

impl SqliteStorage {
    pub async fn new(db_path: &str) -> Result<Self> {
        let connection_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(60))
            .synchronous(SqliteSynchronous::Normal)
            .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connection_options)
            .await?;

        Ok(Self { pool })
    }

    /// Opens (creating if needed) the database and its schema.
    pub async fn open(db_path: &str) -> Result<Self> {
        let storage = Self::new(db_path)
            .await
            .with_context(|| format!("Failed to open SQLite database {}", db_path))?;
        storage.initialize().await?;
        Ok(storage)
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ohlcv (
                exchange TEXT NOT NULL,
                quote TEXT NOT NULL,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                schema TEXT NOT NULL,
                epoch INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (exchange, quote, symbol, timeframe, schema, epoch)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The `limit` most recent candles of a bucket, oldest first.
    pub async fn load_recent(&self, key: &BucketKey, limit: u32) -> Result<Vec<Candle>> {
        let rows = sqlx::query(
            r#"
            SELECT epoch, open, high, low, close, volume
            FROM ohlcv
            WHERE exchange = ? AND quote = ? AND symbol = ? AND timeframe = ? AND schema = ?
            ORDER BY epoch DESC
            LIMIT ?
            "#,
        )
        .bind(&key.exchange)
        .bind(&key.quote)
        .bind(&key.symbol)
        .bind(&key.timeframe)
        .bind(&key.schema)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut candles = rows.iter().map(candle_from_row).collect::<Result<Vec<_>>>()?;
        candles.reverse();
        Ok(candles)
    }
}

fn candle_from_row(row: &SqliteRow) -> Result<Candle> {
    let epoch: i64 = row.try_get("epoch")?;
    let open_time = DateTime::from_timestamp(epoch, 0)
        .with_context(|| format!("stored epoch {} is out of range", epoch))?;
    Ok(Candle::new(
        open_time,
        row.try_get("open")?,
        row.try_get("high")?,
        row.try_get("low")?,
        row.try_get("close")?,
        row.try_get("volume")?,
    ))
}

#[async_trait]
impl SeriesStore for SqliteStorage {
    async fn last_row(&self, key: &BucketKey) -> Result<Option<Candle>> {
        let row = sqlx::query(
            r#"
            SELECT epoch, open, high, low, close, volume
            FROM ohlcv
            WHERE exchange = ? AND quote = ? AND symbol = ? AND timeframe = ? AND schema = ?
            ORDER BY epoch DESC
            LIMIT 1
            "#,
        )
        .bind(&key.exchange)
        .bind(&key.quote)
        .bind(&key.symbol)
        .bind(&key.timeframe)
        .bind(&key.schema)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(candle_from_row).transpose()
    }

    async fn write_batch(
        &self,
        key: &BucketKey,
        columns: &ColumnBatch,
        overwrite: bool,
    ) -> Result<u64> {
        columns.validate()?;
        if columns.is_empty() {
            return Ok(0);
        }

        let verb = if overwrite {
            "INSERT OR REPLACE"
        } else {
            "INSERT OR IGNORE"
        };

        let mut tx = self.pool.begin().await?;
        for chunk_start in (0..columns.len()).step_by(INSERT_CHUNK_ROWS) {
            let chunk_end = (chunk_start + INSERT_CHUNK_ROWS).min(columns.len());
            let mut query_builder = QueryBuilder::new(format!(
                "{} INTO ohlcv (exchange, quote, symbol, timeframe, schema, epoch, open, high, low, close, volume) ",
                verb
            ));

            query_builder.push_values(chunk_start..chunk_end, |mut b, i| {
                b.push_bind(&key.exchange)
                    .push_bind(&key.quote)
                    .push_bind(&key.symbol)
                    .push_bind(&key.timeframe)
                    .push_bind(&key.schema)
                    .push_bind(columns.epoch[i])
                    .push_bind(columns.open[i])
                    .push_bind(columns.high[i])
                    .push_bind(columns.low[i])
                    .push_bind(columns.close[i])
                    .push_bind(columns.volume[i]);
            });

            query_builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(columns.len() as u64)
    }
}
