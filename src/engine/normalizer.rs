//! Raw exchange rows -> typed candles.

use crate::{
    config::ParsePolicy,
    data::RawKline,
    domain::{Candle, CandleBatch, FeedError},
    utils::epoch_ms_to_utc,
};

/// A row rejected because one of its fields would not parse.
#[derive(Debug, Clone, PartialEq)]
pub struct RowParseError {
    pub open_time_ms: i64,
    pub field: &'static str,
    pub value: String,
}

/// Outcome of normalising one response.
#[derive(Debug, Default)]
pub struct NormalizeReport {
    pub batch: CandleBatch,
    /// Rows skipped for an empty field or a zero open time.
    pub skipped_empty: usize,
    pub parse_failures: Vec<RowParseError>,
}

fn parse_field(field: &'static str, text: &str, open_time_ms: i64) -> Result<f64, RowParseError> {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RowParseError {
            open_time_ms,
            field,
            value: text.to_string(),
        }),
    }
}

fn is_incomplete(row: &RawKline) -> bool {
    row.open_time_ms == 0
        || [&row.open, &row.high, &row.low, &row.close, &row.volume]
            .iter()
            .any(|v| v.is_empty())
}

fn parse_row(row: &RawKline) -> Result<Candle, RowParseError> {
    let t = row.open_time_ms;
    let open_time = epoch_ms_to_utc(t).ok_or_else(|| RowParseError {
        open_time_ms: t,
        field: "open_time",
        value: t.to_string(),
    })?;
    Ok(Candle::new(
        open_time,
        parse_field("open", &row.open, t)?,
        parse_field("high", &row.high, t)?,
        parse_field("low", &row.low, t)?,
        parse_field("close", &row.close, t)?,
        parse_field("volume", &row.volume, t)?,
    ))
}

/// Converts rows in response order.
///
/// Under [`ParsePolicy::AbortWorker`] the first unparseable row is returned as a
/// fatal [`FeedError::Parse`]; otherwise the row is dropped and reported.
pub fn normalize(
    symbol: &str,
    rows: &[RawKline],
    policy: ParsePolicy,
) -> Result<NormalizeReport, FeedError> {
    let mut report = NormalizeReport::default();

    for row in rows {
        if is_incomplete(row) {
            log::info!("{}: no value in row {:?}", symbol, row);
            report.skipped_empty += 1;
            continue;
        }

        match parse_row(row) {
            Ok(candle) => report.batch.push(candle),
            Err(e) => {
                log::error!(
                    "{}: cannot parse {} '{}' (open time {})",
                    symbol,
                    e.field,
                    e.value,
                    e.open_time_ms
                );
                if policy == ParsePolicy::AbortWorker {
                    return Err(FeedError::Parse {
                        symbol: symbol.to_string(),
                        field: e.field,
                        value: e.value,
                    });
                }
                report.parse_failures.push(e);
            }
        }
    }

    Ok(report)
}
