//! Hard-pause and slowdown gates
//!
//! Both gates are reentrant counters under the clock lock. The first acquire
//! snapshots the value it changes (flow state or time scale) and the last
//! release restores it. Prefer the RAII guards: a guard dropped during
//! unwinding or cancellation still releases.

use std::sync::Arc;

use tracing::{debug, warn};

use super::service::TimeService;

impl TimeService {
    /// Stop time until the returned guard drops
    pub fn acquire_hard_pause(self: &Arc<Self>) -> HardPauseGuard {
        self.enter_hard_pause();
        HardPauseGuard {
            clock: Arc::clone(self),
        }
    }

    /// Slow time until the returned guard drops
    pub fn acquire_slowdown(self: &Arc<Self>) -> SlowdownGuard {
        self.enter_slowdown();
        SlowdownGuard {
            clock: Arc::clone(self),
        }
    }

    /// Unguarded acquire; pair with `release_hard_pause`
    pub fn enter_hard_pause(&self) {
        let mut state = self.state.lock();
        state.hard_pause_count += 1;
        if state.hard_pause_count == 1 {
            state.was_flowing = state.flowing;
            state.flowing = false;
        }
        debug!(count = state.hard_pause_count, "Hard pause acquired");
    }

    /// Release one hard pause; extra releases clamp at zero
    pub fn release_hard_pause(&self) {
        let mut state = self.state.lock();
        if state.hard_pause_count == 0 {
            warn!("Hard pause released more times than acquired, ignoring");
            return;
        }
        state.hard_pause_count -= 1;
        if state.hard_pause_count == 0 {
            state.flowing = state.was_flowing;
            debug!(flowing = state.flowing, "Last hard pause released");
        } else {
            debug!(count = state.hard_pause_count, "Hard pause released");
        }
    }

    /// Unguarded acquire; pair with `release_slowdown`
    pub fn enter_slowdown(&self) {
        let mut state = self.state.lock();
        state.slowdown_count += 1;
        if state.slowdown_count == 1 {
            state.pre_slow_scale = state.time_scale;
            state.time_scale /= self.slowdown_factor;
        }
        debug!(
            count = state.slowdown_count,
            scale = state.time_scale,
            "Slowdown acquired"
        );
    }

    /// Release one slowdown; extra releases clamp at zero
    pub fn release_slowdown(&self) {
        let mut state = self.state.lock();
        if state.slowdown_count == 0 {
            warn!("Slowdown released more times than acquired, ignoring");
            return;
        }
        state.slowdown_count -= 1;
        if state.slowdown_count == 0 {
            state.time_scale = state.pre_slow_scale;
            debug!(scale = state.time_scale, "Last slowdown released");
        }
    }

    pub fn hard_pause_count(&self) -> u32 {
        self.state.lock().hard_pause_count
    }

    pub fn slowdown_count(&self) -> u32 {
        self.state.lock().slowdown_count
    }

    pub fn is_hard_paused(&self) -> bool {
        self.hard_pause_count() > 0
    }
}

/// Holds one hard pause
#[must_use = "the pause is released as soon as the guard drops"]
pub struct HardPauseGuard {
    clock: Arc<TimeService>,
}

impl Drop for HardPauseGuard {
    fn drop(&mut self) {
        self.clock.release_hard_pause();
    }
}

/// Holds one slowdown
#[must_use = "the slowdown is released as soon as the guard drops"]
pub struct SlowdownGuard {
    clock: Arc<TimeService>,
}

impl Drop for SlowdownGuard {
    fn drop(&mut self) {
        self.clock.release_slowdown();
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::clock::GameTime;

    fn clock(flowing: bool) -> Arc<TimeService> {
        let clock = TimeService::with_settings(GameTime::default(), 60.0, 4.0);
        if flowing {
            clock.start_time_flow();
        }
        clock
    }

    /// Random sequence of acquires and releases where every release follows its acquire
    fn paired_sequence(rng: &mut StdRng, pairs: usize) -> Vec<bool> {
        let mut ops = Vec::with_capacity(pairs * 2);
        let mut open = 0;
        let mut remaining = pairs;
        while remaining > 0 || open > 0 {
            let acquire = remaining > 0 && (open == 0 || rng.gen_bool(0.5));
            if acquire {
                remaining -= 1;
                open += 1;
            } else {
                open -= 1;
            }
            ops.push(acquire);
        }
        ops
    }

    #[test]
    fn test_hard_pause_stack_restores_flow() {
        let mut rng = StdRng::seed_from_u64(7);
        for flowing in [true, false] {
            for pairs in 1..12 {
                let clock = clock(flowing);
                for acquire in paired_sequence(&mut rng, pairs) {
                    if acquire {
                        clock.enter_hard_pause();
                        assert!(!clock.is_flowing());
                    } else {
                        clock.release_hard_pause();
                    }
                }
                assert_eq!(clock.is_flowing(), flowing);
                assert_eq!(clock.hard_pause_count(), 0);
            }
        }
    }

    #[test]
    fn test_slowdown_stack_restores_scale() {
        let mut rng = StdRng::seed_from_u64(11);
        for pairs in 1..12 {
            let clock = clock(true);
            for acquire in paired_sequence(&mut rng, pairs) {
                if acquire {
                    clock.enter_slowdown();
                    assert!((clock.time_scale() - 15.0).abs() < 1e-6);
                } else {
                    clock.release_slowdown();
                }
            }
            assert!((clock.time_scale() - 60.0).abs() < 1e-6);
            assert_eq!(clock.slowdown_count(), 0);
        }
    }

    #[test]
    fn test_guards_release_in_any_drop_order() {
        let clock = clock(true);
        let mut guards: Vec<HardPauseGuard> = (0..6).map(|_| clock.acquire_hard_pause()).collect();
        let slow: Vec<SlowdownGuard> = (0..3).map(|_| clock.acquire_slowdown()).collect();
        guards.shuffle(&mut StdRng::seed_from_u64(3));

        while let Some(guard) = guards.pop() {
            assert!(!clock.is_flowing());
            drop(guard);
        }
        assert!(clock.is_flowing());
        assert!((clock.time_scale() - 15.0).abs() < 1e-6);

        drop(slow);
        assert!((clock.time_scale() - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let clock = clock(true);
        let inner = clock.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _pause = inner.acquire_hard_pause();
            let _slow = inner.acquire_slowdown();
            panic!("tool loop failed");
        }));
        assert!(result.is_err());
        assert!(clock.is_flowing());
        assert_eq!(clock.hard_pause_count(), 0);
        assert_eq!(clock.slowdown_count(), 0);
    }

    #[test]
    fn test_mismatched_release_clamps() {
        let clock = clock(true);
        clock.release_hard_pause();
        clock.release_slowdown();
        assert_eq!(clock.hard_pause_count(), 0);
        assert_eq!(clock.slowdown_count(), 0);
        assert!(clock.is_flowing());

        // a later pair still behaves normally
        let guard = clock.acquire_hard_pause();
        assert!(!clock.is_flowing());
        drop(guard);
        assert!(clock.is_flowing());
    }

    #[test]
    fn test_flow_change_during_pause_is_deferred() {
        let clock = clock(false);
        let guard = clock.acquire_hard_pause();
        clock.start_time_flow();
        assert!(!clock.is_flowing());
        drop(guard);
        assert!(clock.is_flowing());

        let guard = clock.acquire_hard_pause();
        clock.stop_time_flow();
        drop(guard);
        assert!(!clock.is_flowing());
    }

    #[test]
    fn test_scale_change_during_slowdown() {
        let clock = clock(true);
        let guard = clock.acquire_slowdown();
        clock.set_time_scale(8.0);
        assert!((clock.time_scale() - 2.0).abs() < 1e-6);
        drop(guard);
        assert!((clock.time_scale() - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_paused_clock_does_not_advance() {
        let clock = clock(true);
        let start = clock.current_time();
        let guard = clock.acquire_hard_pause();
        clock.update(120.0);
        assert_eq!(clock.current_time(), start);
        drop(guard);
        clock.update(1.0);
        assert_eq!(clock.current_time(), start.advance_minutes(1));
    }

    #[tokio::test]
    async fn test_concurrent_guards_across_tasks() {
        let clock = clock(true);
        let mut handles = Vec::new();
        for i in 0..16u64 {
            let clock = clock.clone();
            handles.push(tokio::spawn(async move {
                let _pause = clock.acquire_hard_pause();
                let _slow = (i % 2 == 0).then(|| clock.acquire_slowdown());
                for _ in 0..=(i % 4) {
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(clock.is_flowing());
        assert!((clock.time_scale() - 60.0).abs() < 1e-6);
    }
}
