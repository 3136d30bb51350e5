use crate::orchestrator::{RenewalOrchestrator, Trigger};
use certhound_config::constants;
use chrono::{NaiveDateTime, NaiveTime};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// A delayed follow-up pass. At most one is ever pending: a new request
/// replaces the old deadline instead of piling up alongside it.
#[derive(Debug, Clone, Copy)]
pub struct RecheckRequest {
    pub delay: Duration,
}

#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<RecheckRequest>,
}

impl SchedulerHandle {
    pub async fn request_recheck(&self, delay: Duration) {
        if self.tx.send(RecheckRequest { delay }).await.is_err() {
            warn!("scheduler is gone, dropping re-check request");
        }
    }
}

pub fn scheduler_channel() -> (SchedulerHandle, mpsc::Receiver<RecheckRequest>) {
    let (tx, rx) = mpsc::channel(constants::RECHECK_CHANNEL_CAPACITY);
    (SchedulerHandle { tx }, rx)
}

/// Runs renewal passes serially: one shortly after startup, one daily at
/// a fixed local time, and coalesced delayed re-checks requested by the
/// orchestrator mid-pass. A pass runs to completion before the next
/// trigger is considered.
pub async fn run_scheduler(
    orchestrator: RenewalOrchestrator,
    mut recheck_rx: mpsc::Receiver<RecheckRequest>,
) {
    info!("starting renewal scheduler");

    tokio::time::sleep(constants::STARTUP_DELAY).await;
    orchestrator.run_pass(Trigger::Startup).await;

    let mut pending: Option<Instant> = None;

    loop {
        // Pick up re-checks requested during the pass; the latest wins.
        while let Ok(request) = recheck_rx.try_recv() {
            pending = Some(Instant::now() + request.delay);
        }

        let daily_wait = duration_until_daily_run(chrono::Local::now().naive_local());
        let recheck_at = pending.unwrap_or_else(Instant::now);

        tokio::select! {
            _ = tokio::time::sleep_until(recheck_at), if pending.is_some() => {
                pending = None;
                orchestrator
                    .run_pass(Trigger::RecheckAfterVerification)
                    .await;
            }
            _ = tokio::time::sleep(daily_wait) => {
                orchestrator.run_pass(Trigger::Daily).await;
            }
            Some(request) = recheck_rx.recv() => {
                pending = Some(Instant::now() + request.delay);
            }
        }
    }
}

/// Time left until the next daily run (local time-of-day).
fn duration_until_daily_run(now: NaiveDateTime) -> Duration {
    let Some(run_time) =
        NaiveTime::from_hms_opt(constants::DAILY_RUN_HOUR, constants::DAILY_RUN_MINUTE, 0)
    else {
        return Duration::from_secs(86_400);
    };

    let today = now.date().and_time(run_time);
    let next = if now < today {
        today
    } else {
        today + chrono::Duration::days(1)
    };

    (next - now).to_std().unwrap_or(Duration::from_secs(86_400))
}
