use {
    crate::domain::Timeframe,
    serde::{Deserialize, Serialize},
};

/// Storage schema name of every bucket written by the feeder.
pub const OHLCV_SCHEMA: &str = "OHLCV";

/// A tradable market: base asset quoted in `quote` (e.g. EOS / BNB).
#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq)]
pub struct Pair {
    pub base: String,
    pub quote: String,
}

impl Pair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    // The name we pass into the Binance API (not the bucket name)
    pub fn bn_name(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Identifies one stored series: `(exchange, quote, symbol, timeframe, schema)`.
///
/// The quote is part of the key so the same base asset traded against two
/// currencies never shares a series.
#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq)]
pub struct BucketKey {
    pub exchange: String,
    pub quote: String,
    pub symbol: String,
    pub timeframe: String,
    pub schema: String,
}

impl BucketKey {
    pub fn ohlcv(exchange: &str, pair: &Pair, timeframe: &Timeframe) -> Self {
        Self {
            exchange: exchange.to_string(),
            quote: pair.quote.clone(),
            symbol: pair.base.clone(),
            timeframe: timeframe.label(),
            schema: OHLCV_SCHEMA.to_string(),
        }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}/{}/{}",
            self.exchange, self.quote, self.symbol, self.timeframe, self.schema
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_concatenates_for_the_exchange() {
        let pair = Pair::new("EOS", "BNB");
        assert_eq!(pair.bn_name(), "EOSBNB");
        assert_eq!(pair.to_string(), "EOS/BNB");
    }

    #[test]
    fn bucket_key_renders_like_a_path() {
        let key = BucketKey::ohlcv("BINANCE", &Pair::new("EOS", "BNB"), &Timeframe::parse("1H"));
        assert_eq!(key.to_string(), "BINANCE_BNB_EOS/1H/OHLCV");
    }

    #[test]
    fn same_base_in_two_quotes_gets_two_buckets() {
        let tf = Timeframe::default();
        let bnb = BucketKey::ohlcv("BINANCE", &Pair::new("EOS", "BNB"), &tf);
        let usdt = BucketKey::ohlcv("BINANCE", &Pair::new("EOS", "USDT"), &tf);
        assert_ne!(bnb, usdt);
        assert_ne!(bnb.to_string(), usdt.to_string());
        assert_eq!(usdt.to_string(), "BINANCE_USDT_EOS/1Min/OHLCV");
    }
}
