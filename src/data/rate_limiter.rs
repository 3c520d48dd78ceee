use {
    chrono::Utc,
    std::{sync::Arc, time::Duration},
    tokio::sync::Mutex,
};

/// Client side request-weight budget shared by every Binance adapter.
///
/// Binance counts weight per wall-clock minute, so the budget resets at :00.
#[derive(Clone)]
pub struct GlobalRateLimiter {
    inner: Arc<Mutex<WeightWindow>>,
}

struct WeightWindow {
    used_weight: u32,
    // Minutes since epoch of the minute being counted
    minute_idx: i64,
    limit: u32,
}

impl WeightWindow {
    /// Books `cost` if it fits, otherwise returns how long to wait for the next minute.
    fn try_book(&mut self, cost: u32, now_ms: i64) -> Result<(), Duration> {
        let now_idx = now_ms.div_euclid(60_000);
        if now_idx > self.minute_idx {
            self.used_weight = 0;
            self.minute_idx = now_idx;
        }

        // A single call larger than the whole budget is let through on a fresh minute.
        if self.used_weight + cost <= self.limit || self.used_weight == 0 {
            self.used_weight += cost;
            return Ok(());
        }

        let ms_into_minute = now_ms.rem_euclid(60_000);
        // Small buffer so we land inside the next minute
        let wait_ms = (60_000 - ms_into_minute) as u64 + 100;
        Err(Duration::from_millis(wait_ms))
    }
}

impl GlobalRateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WeightWindow {
                used_weight: 0,
                minute_idx: Utc::now().timestamp_millis().div_euclid(60_000),
                limit,
            })),
        }
    }

    /// Waits until `cost` weight can be spent in the current minute.
    pub async fn acquire(&self, cost: u32, context: &str) {
        loop {
            let wait = {
                let mut guard = self.inner.lock().await;
                match guard.try_book(cost, Utc::now().timestamp_millis()) {
                    Ok(()) => return,
                    Err(wait) => {
                        log::warn!(
                            "🛑 Request weight saturated for [{}]. Used: {}/{}. Waiting {:.1}s...",
                            context,
                            guard.used_weight,
                            guard.limit,
                            wait.as_secs_f64()
                        );
                        wait
                    }
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}
