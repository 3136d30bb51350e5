use crate::{Error, Result};
use certhound_config::constants;
use certhound_config::AccountTier;
use chrono::{Local, NaiveDate};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Provider-side courtesy limits: one request per second per identity,
/// and a daily ceiling by account tier. The interval is satisfied by
/// sleeping; the ceiling is a hard denial until local midnight.
pub struct RequestLimiter {
    user: String,
    daily_limit: Option<u32>,
    interval: Duration,
    state: Mutex<LimiterState>,
}

#[derive(Debug)]
struct LimiterState {
    last_request: Option<Instant>,
    count: u32,
    window: NaiveDate,
}

fn daily_limit(tier: AccountTier) -> Option<u32> {
    match tier {
        AccountTier::Normal => Some(constants::DAILY_QUOTA_NORMAL),
        AccountTier::Vip => Some(constants::DAILY_QUOTA_VIP),
        AccountTier::Svip => None,
    }
}

impl RequestLimiter {
    pub fn new(user: &str, tier: AccountTier) -> Self {
        Self {
            user: user.to_string(),
            daily_limit: daily_limit(tier),
            interval: constants::REQUEST_INTERVAL,
            state: Mutex::new(LimiterState {
                last_request: None,
                count: 0,
                window: Local::now().date_naive(),
            }),
        }
    }

    /// Blocks until the interval limit allows another request, or fails
    /// outright when the daily ceiling is reached.
    pub async fn acquire(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.admit(&mut state, Local::now().date_naive())?;

        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                debug!("rate limit for {}: waiting {:?}", self.user, wait);
                tokio::time::sleep(wait).await;
            }
        }

        state.last_request = Some(Instant::now());
        Ok(())
    }

    fn admit(&self, state: &mut LimiterState, today: NaiveDate) -> Result<()> {
        if state.window != today {
            state.count = 0;
            state.window = today;
        }

        if let Some(limit) = self.daily_limit
            && state.count >= limit
        {
            return Err(Error::DailyQuotaExceeded {
                user: self.user.clone(),
                limit,
            });
        }

        state.count += 1;
        Ok(())
    }
}
