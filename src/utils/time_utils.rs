use {
    async_trait::async_trait,
    chrono::{DateTime, TimeDelta, Utc},
    std::time::Duration,
};

pub struct TimeUtils;

impl TimeUtils {
    pub const MS_IN_S: i64 = 1000;
    pub const MS_IN_MIN: i64 = Self::MS_IN_S * 60;
    pub const MS_IN_H: i64 = Self::MS_IN_MIN * 60;
    pub const MS_IN_D: i64 = Self::MS_IN_H * 24;
    pub const MS_IN_W: i64 = Self::MS_IN_D * 7;
    pub const STANDARD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

/// Source of "now" plus the only way the feeder suspends itself.
///
/// Production code uses [`SystemClock`]; tests drive the scheduler with a clock
/// whose `sleep` simply moves time forward.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// Time helper functions

pub fn to_epoch_ms(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// Exchange open times arrive in milliseconds; stored candles keep second resolution.
pub fn epoch_ms_to_utc(epoch_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(epoch_ms.div_euclid(TimeUtils::MS_IN_S), 0)
}

/// Time left until `target`, zero if it has already passed.
pub fn duration_until(now: DateTime<Utc>, target: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format(TimeUtils::STANDARD_TIME_FORMAT).to_string()
}

pub fn format_duration(delta: TimeDelta) -> String {
    let secs = delta.num_seconds();
    if secs < 60 {
        return format!("{}s", secs);
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m", mins);
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }
    format!("{}d", hours / 24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn millis_are_reduced_to_seconds() {
        let t = epoch_ms_to_utc(1_672_531_200_999).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn duration_until_past_target_is_zero() {
        let now = Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap();
        let earlier = now - TimeDelta::minutes(5);
        assert_eq!(duration_until(now, earlier), Duration::ZERO);
        assert_eq!(
            duration_until(earlier, now),
            Duration::from_secs(5 * 60)
        );
    }

    #[test]
    fn durations_format_with_largest_unit() {
        assert_eq!(format_duration(TimeDelta::seconds(42)), "42s");
        assert_eq!(format_duration(TimeDelta::minutes(300)), "5h");
        assert_eq!(format_duration(TimeDelta::days(3)), "3d");
    }
}
