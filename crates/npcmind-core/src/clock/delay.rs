//! Waiting in simulated time
//!
//! Resolution is one game minute. Every wait takes a `CancellationToken` and
//! reports whether it ran to completion.

use tokio_util::sync::CancellationToken;

use super::service::TimeService;

/// Outcome of a simulated-time wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimWait {
    Elapsed,
    Cancelled,
}

/// Wait until `minutes` game minutes have passed
pub async fn delay_sim_minutes(
    clock: &TimeService,
    minutes: u64,
    cancel: &CancellationToken,
) -> SimWait {
    if cancel.is_cancelled() {
        return SimWait::Cancelled;
    }
    if minutes == 0 {
        tokio::task::yield_now().await;
        return SimWait::Elapsed;
    }

    let mut rx = clock.watch();
    let target = clock.current_time().advance_minutes(minutes);
    loop {
        if *rx.borrow_and_update() >= target {
            return SimWait::Elapsed;
        }
        tokio::select! {
            _ = cancel.cancelled() => return SimWait::Cancelled,
            changed = rx.changed() => {
                if changed.is_err() {
                    return SimWait::Cancelled;
                }
            }
        }
    }
}

/// Seconds round up to whole minutes, minimum one
pub async fn delay_sim_seconds(
    clock: &TimeService,
    seconds: u64,
    cancel: &CancellationToken,
) -> SimWait {
    let minutes = seconds.div_ceil(60).max(1);
    delay_sim_minutes(clock, minutes, cancel).await
}

pub async fn delay_sim_hours(
    clock: &TimeService,
    hours: u64,
    cancel: &CancellationToken,
) -> SimWait {
    delay_sim_minutes(clock, hours.saturating_mul(60), cancel).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::GameTime;

    fn flowing_clock() -> Arc<TimeService> {
        let clock = TimeService::with_settings(GameTime::new(2024, 1, 1, 23, 50), 60.0, 4.0);
        clock.start_time_flow();
        clock
    }

    #[tokio::test]
    async fn test_minutes_elapse_with_updates() {
        let clock = flowing_clock();
        let cancel = CancellationToken::new();
        let waiter = {
            let clock = clock.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { delay_sim_minutes(&clock, 15, &cancel).await })
        };

        for _ in 0..14 {
            tokio::task::yield_now().await;
            clock.update(1.0);
        }
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        clock.update(1.0);
        assert_eq!(waiter.await.unwrap(), SimWait::Elapsed);
        assert_eq!(clock.current_time(), GameTime::new(2024, 1, 2, 0, 5));
    }

    #[tokio::test]
    async fn test_cancel_stops_wait() {
        let clock = flowing_clock();
        let cancel = CancellationToken::new();
        let waiter = {
            let clock = clock.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { delay_sim_hours(&clock, 2, &cancel).await })
        };
        tokio::task::yield_now().await;
        cancel.cancel();
        assert_eq!(waiter.await.unwrap(), SimWait::Cancelled);
    }

    #[tokio::test]
    async fn test_set_time_jump_completes_wait() {
        let clock = flowing_clock();
        let cancel = CancellationToken::new();
        let waiter = {
            let clock = clock.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { delay_sim_seconds(&clock, 61, &cancel).await })
        };
        tokio::task::yield_now().await;
        clock.set_time(GameTime::new(2024, 1, 2, 8, 0));
        assert_eq!(waiter.await.unwrap(), SimWait::Elapsed);
    }
}
