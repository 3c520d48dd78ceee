pub mod time_utils;

pub use time_utils::{
    Clock, SystemClock, TimeUtils, duration_until, epoch_ms_to_utc, format_duration,
    format_instant, to_epoch_ms,
};
