// Domain types and value objects
mod candle;
mod error;
mod pair;
mod timeframe;
mod window;

pub use candle::{Candle, CandleBatch};
pub use error::FeedError;
pub use pair::{BucketKey, OHLCV_SCHEMA, Pair};
pub use timeframe::{DEFAULT_TIMEFRAME, TimeUnit, Timeframe};
pub use window::TimeWindow;
