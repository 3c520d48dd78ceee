use {
    anyhow::Result,
    binance_sdk::{
        config::ConfigurationRestApi,
        errors::{self, ConnectorError as connection_error},
        spot::{
            SpotRestApi,
            rest_api::{
                ExchangeInfoParams, KlinesIntervalEnum, KlinesItemInner, KlinesParams, RestApi,
            },
        },
    },
    std::{convert::TryFrom, error::Error, fmt},
};

use crate::{
    config::{BINANCE, BinanceApiConfig},
    data::catalog::InstrumentInfo,
};

/// Maps an exchange interval token (`1m`, `4h`, `1d`...) onto the SDK enum.
pub fn try_interval_from_token(token: &str) -> Result<KlinesIntervalEnum, String> {
    match token {
        "1s" => Ok(KlinesIntervalEnum::Interval1s),
        "1m" => Ok(KlinesIntervalEnum::Interval1m),
        "3m" => Ok(KlinesIntervalEnum::Interval3m),
        "5m" => Ok(KlinesIntervalEnum::Interval5m),
        "15m" => Ok(KlinesIntervalEnum::Interval15m),
        "30m" => Ok(KlinesIntervalEnum::Interval30m),
        "1h" => Ok(KlinesIntervalEnum::Interval1h),
        "2h" => Ok(KlinesIntervalEnum::Interval2h),
        "4h" => Ok(KlinesIntervalEnum::Interval4h),
        "6h" => Ok(KlinesIntervalEnum::Interval6h),
        "8h" => Ok(KlinesIntervalEnum::Interval8h),
        "12h" => Ok(KlinesIntervalEnum::Interval12h),
        "1d" => Ok(KlinesIntervalEnum::Interval1d),
        "3d" => Ok(KlinesIntervalEnum::Interval3d),
        "1w" => Ok(KlinesIntervalEnum::Interval1w),
        "1M" => Ok(KlinesIntervalEnum::Interval1M),
        _ => Err(format!("Unsupported interval: {}", token)),
    }
}

/// One kline row as the exchange sends it: millisecond open time and decimal text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawKline {
    pub open_time_ms: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

#[derive(Debug)]
pub enum BNKlineError {
    InvalidLength,
    InvalidType(String),
    ConnectionFailed(String),
}

impl fmt::Display for BNKlineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            BNKlineError::InvalidLength => write!(f, "Invalid length"),
            BNKlineError::InvalidType(string) => write!(f, "Invalid type: {}", string),
            BNKlineError::ConnectionFailed(msg) => {
                write!(f, "Binance API connection failed: {}.", msg)
            }
        }
    }
}

impl Error for BNKlineError {}

// Missing or non-text values become "", which the normalizer treats as an empty field.
fn kline_item_as_text(item: Option<KlinesItemInner>) -> String {
    match item {
        Some(KlinesItemInner::String(s)) => s,
        Some(KlinesItemInner::Integer(i)) => i.to_string(),
        _ => String::new(),
    }
}

impl TryFrom<Vec<KlinesItemInner>> for RawKline {
    type Error = BNKlineError;

    fn try_from(vec_inner_klines: Vec<KlinesItemInner>) -> Result<Self, Self::Error> {
        let mut items = vec_inner_klines.into_iter();
        let open_time_ms = match items.next().ok_or(BNKlineError::InvalidLength)? {
            KlinesItemInner::Integer(a) => a,
            _ => return Err(BNKlineError::InvalidType("open_time".to_string())),
        };

        Ok(RawKline {
            open_time_ms,
            open: kline_item_as_text(items.next()),
            high: kline_item_as_text(items.next()),
            low: kline_item_as_text(items.next()),
            close: kline_item_as_text(items.next()),
            volume: kline_item_as_text(items.next()),
        })
    }
}

pub(crate) fn convert_klines(data: Vec<Vec<KlinesItemInner>>) -> Result<Vec<RawKline>, BNKlineError> {
    data.into_iter().map(RawKline::try_from).collect()
}

pub(crate) fn configure_binance_client() -> Result<RestApi> {
    let config = BinanceApiConfig::default();
    let rest_conf = ConfigurationRestApi::builder()
        .timeout(config.timeout_ms)
        .retries(config.retries)
        .backoff(config.backoff_ms)
        .build()?;
    // Create the Spot REST API client
    let rest_client = SpotRestApi::production(rest_conf);
    Ok(rest_client)
}

pub(crate) fn klines_params(
    market: &str,
    interval: &str,
    start_ms: i64,
    end_ms: Option<i64>,
    limit: u32,
) -> Result<KlinesParams> {
    let interval = try_interval_from_token(interval).map_err(anyhow::Error::msg)?;
    let limit = i32::try_from(limit)
        .unwrap_or(BINANCE.limits.klines_limit)
        .min(BINANCE.limits.klines_limit);

    let params = KlinesParams::builder(market.to_string(), interval)
        .limit(limit)
        .start_time(Some(start_ms))
        .end_time(end_ms)
        .build()?;
    Ok(params)
}

// Logs the connector failure in detail and turns it into a ConnectionFailed error.
fn describe_connector_error(e: anyhow::Error, market: &str) -> anyhow::Error {
    if let Some(conn_err) = e.downcast_ref::<errors::ConnectorError>() {
        match conn_err {
            connection_error::ConnectorClientError(msg) => {
                log::error!(
                    "{} Client error: Check your request parameters. {}",
                    market,
                    msg
                );
            }
            connection_error::TooManyRequestsError(msg) => {
                log::warn!("{} Rate limit exceeded. {}", market, msg);
            }
            connection_error::RateLimitBanError(msg) => {
                log::error!(
                    "{} IP address banned due to excessive rate limits. {}",
                    market,
                    msg
                );
            }
            errors::ConnectorError::ServerError { msg, status_code } => {
                log::error!(
                    "{} Server error: {} (status code: {:?})",
                    market,
                    msg,
                    status_code
                );
            }
            errors::ConnectorError::NetworkError(msg) => {
                log::error!("{} Network error: {}", market, msg);
            }
            connection_error::BadRequestError(msg) => {
                log::warn!("{} Bad request: {}", market, msg);
            }
            other => {
                log::error!("{} Unexpected ConnectorError variant: {:?}", market, other);
            }
        }
        anyhow::Error::new(BNKlineError::ConnectionFailed(conn_err.to_string()))
            .context(format!("Binance API call failed for {}", market))
    } else {
        log::error!("An unexpected error occurred for {}: {:#}", market, e);
        anyhow::Error::new(BNKlineError::ConnectionFailed(e.to_string()))
            .context(format!("Unexpected error during API call for {}", market))
    }
}

pub(crate) async fn fetch_raw_klines(
    rest_client: &RestApi,
    params: KlinesParams,
    market: &str,
) -> Result<Vec<RawKline>> {
    let response = rest_client
        .klines(params)
        .await
        .map_err(|e| describe_connector_error(e, market))?;
    let data = response.data().await?;
    let klines = convert_klines(data).map_err(|e| {
        anyhow::Error::new(e).context(format!("{} convert_klines failed", market))
    })?;
    Ok(klines)
}

pub(crate) async fn fetch_exchange_instruments(rest_client: &RestApi) -> Result<Vec<InstrumentInfo>> {
    let params = ExchangeInfoParams::builder().build()?;
    let response = rest_client
        .exchange_info(params)
        .await
        .map_err(|e| describe_connector_error(e, "exchangeInfo"))?;
    let info = response.data().await?;

    let instruments = info
        .symbols
        .unwrap_or_default()
        .into_iter()
        .map(|s| InstrumentInfo {
            symbol: s.symbol.unwrap_or_default(),
            base_asset: s.base_asset.unwrap_or_default(),
            quote_asset: s.quote_asset.unwrap_or_default(),
            status: s.status.unwrap_or_default(),
        })
        .collect();
    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> KlinesItemInner {
        KlinesItemInner::String(s.to_string())
    }

    #[test]
    fn kline_row_keeps_decimal_text() {
        let row = vec![
            KlinesItemInner::Integer(1_672_531_200_000),
            text("0.0101"),
            text("0.0110"),
            text("0.0099"),
            text("0.0105"),
            text("1234.5"),
            KlinesItemInner::Integer(1_672_531_259_999),
        ];
        let kline = RawKline::try_from(row).unwrap();
        assert_eq!(kline.open_time_ms, 1_672_531_200_000);
        assert_eq!(kline.open, "0.0101");
        assert_eq!(kline.volume, "1234.5");
    }

    #[test]
    fn short_row_leaves_missing_fields_empty() {
        let kline = RawKline::try_from(vec![KlinesItemInner::Integer(60_000), text("1")]).unwrap();
        assert_eq!(kline.open, "1");
        assert!(kline.close.is_empty());
    }

    #[test]
    fn open_time_must_be_an_integer() {
        assert!(matches!(
            RawKline::try_from(vec![text("soon")]),
            Err(BNKlineError::InvalidType(_))
        ));
        assert!(matches!(
            RawKline::try_from(Vec::new()),
            Err(BNKlineError::InvalidLength)
        ));
    }

    #[test]
    fn timeframe_tokens_map_to_sdk_intervals() {
        for token in ["1m", "5m", "1h", "1d", "1w"] {
            assert!(try_interval_from_token(token).is_ok(), "{}", token);
        }
        assert!(try_interval_from_token("7m").is_err());
    }
}
