use std::{error::Error, fmt};

#[derive(Debug)]
pub enum FeedError {
    /// Exchange metadata could not be listed.
    CatalogUnavailable(String),
    /// Transport failure talking to the candle source.
    Fetch { symbol: String, message: String },
    /// A numeric candle field could not be parsed.
    Parse {
        symbol: String,
        field: &'static str,
        value: String,
    },
    /// The series store rejected a read or a write.
    Store(String),
    /// Settings that cannot be turned into a running worker.
    Config(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            FeedError::CatalogUnavailable(msg) => {
                write!(f, "Exchange metadata unavailable: {}", msg)
            }
            FeedError::Fetch { symbol, message } => {
                write!(f, "Candle fetch failed for {}: {}", symbol, message)
            }
            FeedError::Parse {
                symbol,
                field,
                value,
            } => write!(
                f,
                "Could not parse {} value '{}' for {}",
                field, value, symbol
            ),
            FeedError::Store(msg) => write!(f, "Series store error: {}", msg),
            FeedError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl Error for FeedError {}
